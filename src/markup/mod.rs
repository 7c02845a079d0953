//! Bill XML handling: ordered markup tree, prose extraction, and declarative field reading.

pub mod document;
pub mod extract;
pub mod node;

use thiserror::Error;

pub use document::{BillDocument, Committee, Sponsor};
pub use extract::{TextExtractor, extract_text};
pub use node::{Node, parse_xml};

/// Failures while reading a bill document.
#[derive(Debug, Error)]
pub enum MarkupError {
    /// The payload is not well-formed XML.
    #[error("Malformed XML: {0}")]
    Xml(String),
    /// None of the recognized root elements was present.
    #[error("Document has no bill, resolution, or amendment root element")]
    MissingRoot,
    /// A required declarative field was absent or empty.
    #[error("Required field `{0}` missing from document")]
    MissingField(&'static str),
}
