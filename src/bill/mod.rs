//! Bill identity and version lifecycle.

pub mod identifier;
pub mod version;

pub use identifier::{
    BillIdentifier, BillKey, IdentifierError, parse_document_fields, parse_source_url,
};
pub use version::{UNKNOWN_PRIORITY, VersionChange, VersionStage, compare, priority, stage};
