//! Error types for description document access

use thiserror::Error;

/// Errors that can occur while resolving, fetching or querying a description document
#[derive(Debug, Error)]
pub enum DocError {
    /// The URL could not be turned into a numeric socket address
    #[error("Address error: {0}")]
    Address(String),

    /// The document transfer failed or the response was malformed
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cached document is not well-formed XML
    #[error("XML parsing error: {0}")]
    Parse(String),

    /// An expected element or attribute is absent
    #[error("Element not found: {0}")]
    NotFound(String),

    /// Fewer items were extracted than elements were iterated
    #[error("Inconsistent document: iterated {expected} elements but extracted {extracted}")]
    Inconsistent { expected: usize, extracted: usize },
}

/// Convenience Result type alias for document operations.
pub type Result<T> = std::result::Result<T, DocError>;
