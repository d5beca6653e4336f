//! Error types for the control point

use description_client::DocError;
use thiserror::Error;
use upnp_transport::TransportError;

/// Errors that can occur while building device trees or managing discovery
#[derive(Debug, Error)]
pub enum CpError {
    /// A required handle, identifier or document piece is missing or empty
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A document URL could not be resolved to a numeric address
    #[error("Address error: {0}")]
    Address(String),

    /// A description document could not be transferred
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Index or name lookup miss
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation requires an internally managed device collection
    #[error("State error: {0}")]
    State(String),

    /// Failure reported by the discovery/RPC transport
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<DocError> for CpError {
    fn from(error: DocError) -> Self {
        match error {
            DocError::Address(msg) => CpError::Address(msg),
            DocError::Transfer(msg) => CpError::Transfer(msg),
            DocError::Io(e) => CpError::Transfer(e.to_string()),
            DocError::NotFound(msg) => CpError::NotFound(msg),
            other @ (DocError::Parse(_) | DocError::Inconsistent { .. }) => {
                CpError::Configuration(other.to_string())
            }
        }
    }
}

/// Convenience Result type alias for control point operations.
pub type Result<T> = std::result::Result<T, CpError>;
