//! Manifest and fetch types for the bulk data service.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Errors returned while talking to the bulk data service.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Base URL or document link failed to parse.
    #[error("Invalid bulk data URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("Unexpected bulk data response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body returned with the failing response.
        body: String,
    },
    /// The manifest body did not have the expected shape.
    #[error("Malformed manifest: {0}")]
    InvalidManifest(String),
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::InvalidUrl(_))
    }
}

/// Manifest listing for one congress/session/bill-type folder.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Entries in the folder.
    #[serde(default)]
    pub files: Vec<ManifestFile>,
}

/// One file descriptor from a manifest listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    /// Absolute URL of the file.
    pub link: String,
    /// Last modification time as printed by the service.
    #[serde(default)]
    pub formatted_last_modified_time: Option<String>,
    /// File extension without the dot (`xml`, `zip`, ...).
    #[serde(default)]
    pub file_extension: Option<String>,
    /// Bare file name, e.g. `BILLS-119hr1ih.xml`.
    #[serde(default)]
    pub just_file_name: Option<String>,
    /// Set for sub-folder entries.
    #[serde(default)]
    pub folder: bool,
}

impl ManifestFile {
    /// Parsed modification time, if the service supplied a recognizable one.
    pub fn modified_at(&self) -> Option<OffsetDateTime> {
        self.formatted_last_modified_time
            .as_deref()
            .and_then(parse_manifest_time)
    }

    /// XML files modified strictly after `watermark` (every XML file when no watermark exists).
    pub fn is_candidate(&self, watermark: Option<OffsetDateTime>) -> bool {
        let is_xml = self
            .file_extension
            .as_deref()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if self.folder || !is_xml {
            return false;
        }
        match (watermark, self.modified_at()) {
            (None, _) => true,
            (Some(watermark), Some(modified)) => modified > watermark,
            // Unknown modification time cannot be proven older than the watermark.
            (Some(_), None) => true,
        }
    }
}

/// Watermark to store for a pass that started at `pass_started`.
///
/// Manifests print modification times to the minute, so the pass start is floored to its minute
/// and then moved back by `margin`. A file modified later in the same minute as the pass start
/// still compares newer than the stored value.
pub fn manifest_watermark(pass_started: OffsetDateTime, margin: Duration) -> OffsetDateTime {
    let floored = pass_started
        - time::Duration::seconds(i64::from(pass_started.second()))
        - time::Duration::nanoseconds(i64::from(pass_started.nanosecond()));
    floored - margin
}

/// Parse the timestamp formats observed in manifests: RFC 3339 or `03-Jan-2025 14:05[:09]` (UTC).
pub fn parse_manifest_time(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(parsed);
    }
    let with_seconds =
        format_description!("[day]-[month repr:short]-[year] [hour]:[minute]:[second]");
    let without_seconds = format_description!("[day]-[month repr:short]-[year] [hour]:[minute]");
    PrimitiveDateTime::parse(value, with_seconds)
        .or_else(|_| PrimitiveDateTime::parse(value, without_seconds))
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn file(ext: &str, modified: &str) -> ManifestFile {
        ManifestFile {
            link: "https://example.test/BILLS-119hr1ih.xml".into(),
            formatted_last_modified_time: Some(modified.into()),
            file_extension: Some(ext.into()),
            just_file_name: None,
            folder: false,
        }
    }

    #[test]
    fn parses_both_timestamp_styles() {
        assert_eq!(
            parse_manifest_time("2025-01-03T14:05:00Z"),
            Some(datetime!(2025-01-03 14:05 UTC))
        );
        assert_eq!(
            parse_manifest_time("03-Jan-2025 14:05"),
            Some(datetime!(2025-01-03 14:05 UTC))
        );
        assert_eq!(
            parse_manifest_time("03-Jan-2025 14:05:09"),
            Some(datetime!(2025-01-03 14:05:09 UTC))
        );
        assert_eq!(parse_manifest_time("yesterday"), None);
    }

    #[test]
    fn watermark_is_floored_to_the_minute_and_moved_back() {
        let started = datetime!(2025-01-03 14:05:10.250 UTC);
        assert_eq!(
            manifest_watermark(started, Duration::from_secs(60)),
            datetime!(2025-01-03 14:04 UTC)
        );
        assert_eq!(
            manifest_watermark(started, Duration::ZERO),
            datetime!(2025-01-03 14:05 UTC)
        );
    }

    #[test]
    fn file_modified_in_the_pass_start_minute_is_rediscovered() {
        // Modified at 14:05:40 during a pass started at 14:05:10; the manifest prints 14:05.
        let watermark = manifest_watermark(
            datetime!(2025-01-03 14:05:10 UTC),
            Duration::from_secs(60),
        );
        assert!(file("xml", "03-Jan-2025 14:05").is_candidate(Some(watermark)));
        assert!(!file("xml", "03-Jan-2025 14:03").is_candidate(Some(watermark)));
    }

    #[test]
    fn candidates_are_xml_newer_than_watermark() {
        let watermark = Some(datetime!(2025-01-03 00:00 UTC));
        assert!(file("xml", "04-Jan-2025 09:00").is_candidate(watermark));
        assert!(!file("xml", "02-Jan-2025 09:00").is_candidate(watermark));
        assert!(!file("xml", "03-Jan-2025 00:00").is_candidate(watermark));
        assert!(!file("zip", "04-Jan-2025 09:00").is_candidate(watermark));
        assert!(file("xml", "02-Jan-2025 09:00").is_candidate(None));
    }
}
