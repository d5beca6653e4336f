//! Error types for the transport layer

use thiserror::Error;

use crate::handle::FindHandle;

/// Errors that can occur in discovery, eventing or value conversion
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network or HTTP communication error
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// XML or protocol message parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// The find handle is unknown or no longer registered
    #[error("Invalid find handle {0}")]
    InvalidHandle(FindHandle),

    /// The operation is not available on this transport
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Event subscription could not be established
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// A text value cannot be represented as the declared data type
    #[error("Cannot convert '{value}' to {data_type}")]
    InvalidValue { value: String, data_type: String },
}

/// Convenience Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
