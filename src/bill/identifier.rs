//! Bill identity parsing from bulk-data filenames and declarative document fields.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Bill type tokens published by the bulk data service.
pub const KNOWN_BILL_TYPES: &[&str] = &[
    "hr", "s", "hjres", "sjres", "hconres", "sconres", "hres", "sres",
];

static LEGIS_NUM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([HS])\.?\s*(J\.?\s*RES|CON\.?\s*RES|RES|R)?\.?\s*(\d+)\s*$")
        .expect("legislative number pattern is valid")
});

static BULK_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^BILLS-(\d+)([a-z]+?)(\d+)([a-z]{2,3})\.xml$")
        .expect("bulk filename pattern is valid")
});

static VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d([a-z]{2,3})\.xml$").expect("version pattern is valid"));

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));

/// Errors raised while deriving a bill identity. All of them are fatal for the file involved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// The declarative legislative number did not match a recognized pattern.
    #[error("Unrecognized legislative number: {0:?}")]
    UnrecognizedLegislativeNumber(String),
    /// The source filename does not follow the bulk data naming convention.
    #[error("Unrecognized bill filename: {0}")]
    UnrecognizedFilename(String),
    /// The congress field carried no digits.
    #[error("Congress number missing from {0:?}")]
    MissingCongress(String),
}

/// Natural key of a bill concept: `(congress, bill type, bill number)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillKey {
    /// Congress number, e.g. `119`.
    pub congress: u32,
    /// Canonical bill type token, e.g. `hr` or `hconres`.
    pub bill_type: String,
    /// Bill number without leading zeros, as a string.
    pub bill_number: String,
}

impl BillKey {
    /// Build a key, normalizing the type token to lowercase.
    pub fn new(congress: u32, bill_type: impl Into<String>, bill_number: impl Into<String>) -> Self {
        Self {
            congress,
            bill_type: bill_type.into().to_ascii_lowercase(),
            bill_number: bill_number.into(),
        }
    }

    /// Identifier used as the semantic index key and filter value, e.g. `119-hr-1`.
    pub fn index_key(&self) -> String {
        format!("{}-{}-{}", self.congress, self.bill_type, self.bill_number)
    }

    /// Inverse of [`BillKey::index_key`]. Returns `None` for malformed identifiers.
    pub fn parse_index_key(value: &str) -> Option<Self> {
        let mut parts = value.trim().splitn(3, '-');
        let congress = parts.next()?.parse().ok()?;
        let bill_type = parts.next()?;
        let bill_number = parts.next()?;
        if bill_type.is_empty()
            || bill_number.is_empty()
            || !bill_number.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        Some(Self::new(congress, bill_type, bill_number))
    }

    /// Citation-style label such as `H.R. 1` or `S.Con.Res. 4`.
    pub fn label(&self) -> String {
        let prefix = match self.bill_type.as_str() {
            "hr" => "H.R.",
            "s" => "S.",
            "hjres" => "H.J.Res.",
            "sjres" => "S.J.Res.",
            "hconres" => "H.Con.Res.",
            "sconres" => "S.Con.Res.",
            "hres" => "H.Res.",
            "sres" => "S.Res.",
            other => return format!("{} {}", other.to_ascii_uppercase(), self.bill_number),
        };
        format!("{prefix} {}", self.bill_number)
    }
}

impl fmt::Display for BillKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.index_key())
    }
}

/// Full identity of one published document: the bill plus its version code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillIdentifier {
    /// Owning bill.
    pub key: BillKey,
    /// Version code of the draft, e.g. `ih` or `enr`.
    pub version_code: String,
}

impl fmt::Display for BillIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.key, self.version_code)
    }
}

/// Parse `H. CON. RES. 10` style numbers into `(bill type, bill number)`.
pub fn parse_legislative_number(value: &str) -> Result<(String, String), IdentifierError> {
    let captures = LEGIS_NUM
        .captures(value)
        .ok_or_else(|| IdentifierError::UnrecognizedLegislativeNumber(value.to_string()))?;

    let chamber = captures[1].to_ascii_lowercase();
    let qualifier: String = captures
        .get(2)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect::<String>()
        .to_ascii_lowercase();
    let number = trim_leading_zeros(&captures[3]);

    Ok((format!("{chamber}{qualifier}"), number))
}

/// Take the first run of digits in a field such as `119th CONGRESS`.
pub fn parse_congress(value: &str) -> Result<u32, IdentifierError> {
    DIGITS
        .find(value)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| IdentifierError::MissingCongress(value.to_string()))
}

/// Extract the version code (two or three lowercase letters before `.xml`) from a URL.
pub fn version_code_from_url(url: &str) -> Result<String, IdentifierError> {
    let name = file_name(url);
    VERSION_SUFFIX
        .captures(name)
        .map(|captures| captures[1].to_string())
        .ok_or_else(|| IdentifierError::UnrecognizedFilename(name.to_string()))
}

/// Derive the full identity from a bulk data URL alone, e.g. `.../BILLS-119hr1ih.xml`.
pub fn parse_source_url(url: &str) -> Result<BillIdentifier, IdentifierError> {
    let name = file_name(url);
    let captures = BULK_FILENAME
        .captures(name)
        .ok_or_else(|| IdentifierError::UnrecognizedFilename(name.to_string()))?;

    let bill_type = &captures[2];
    if !KNOWN_BILL_TYPES.contains(&bill_type) {
        return Err(IdentifierError::UnrecognizedFilename(name.to_string()));
    }
    let congress = captures[1]
        .parse()
        .map_err(|_| IdentifierError::MissingCongress(name.to_string()))?;

    Ok(BillIdentifier {
        key: BillKey::new(congress, bill_type, trim_leading_zeros(&captures[3])),
        version_code: captures[4].to_string(),
    })
}

/// Derive the identity from a parsed document's declarative fields plus its source URL.
pub fn parse_document_fields(
    legislative_number: &str,
    congress: &str,
    source_url: &str,
) -> Result<BillIdentifier, IdentifierError> {
    let (bill_type, bill_number) = parse_legislative_number(legislative_number)?;
    let congress = parse_congress(congress)?;
    let version_code = version_code_from_url(source_url)?;
    Ok(BillIdentifier {
        key: BillKey::new(congress, bill_type, bill_number),
        version_code,
    })
}

fn file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

fn trim_leading_zeros(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
