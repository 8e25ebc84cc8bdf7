//! Error types for the signing pass.
//!
//! Every failure aborts the current pass. Callers must discard a partially
//! written output file rather than try to resume it.

use crate::object::ObjectRef;

/// Result type alias for signing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reading the source PDF or writing the update.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// The source uses an xref layout this pass cannot rewrite
    #[error("Unsupported xref type: {0}")]
    UnsupportedXrefType(String),

    /// The original xref header does not match the reader's metadata
    #[error("Xref header mismatch: expected '{expected}', found '{found}'")]
    XrefHeaderMismatch {
        /// Header derived from the xref information
        expected: String,
        /// Header found in the source bytes
        found: String,
    },

    /// A required trailer key is absent
    #[error("Trailer field not found: /{0}")]
    TrailerFieldNotFound(String),

    /// Requested page does not exist in the page tree
    #[error("Page {requested} not found (document has {count} pages)")]
    PageNotFound {
        /// 1-based page number that was requested
        requested: u32,
        /// Number of pages in the document
        count: usize,
    },

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// The appender handed out an ID other than the one the layout reserved
    #[error("Object ID mismatch: layout reserved {expected}, appender allocated {allocated}")]
    ObjectIdMismatch {
        /// ID reserved by the layout plan
        expected: u32,
        /// ID actually allocated
        allocated: u32,
    },

    /// A byte offset does not fit the 10-digit xref row field
    #[error("Offset {0} does not fit a 10-digit xref entry")]
    OffsetOverflow(u64),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error
    #[error("UTF-8 decoding error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}
