//! Bulk data service access: manifest listings and document bytes.

pub mod client;
pub mod types;

pub use client::GovInfoClient;
pub use types::{FetchError, Manifest, ManifestFile, manifest_watermark, parse_manifest_time};
