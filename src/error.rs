//! Error types for the background removal pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RemovalError>;

/// Error taxonomy for the ingestion and comparison pipeline
///
/// Every failure in the pipeline collapses into one of these variants at the
/// session boundary; callers never observe a partial result.
#[derive(Error, Debug)]
pub enum RemovalError {
    /// Source image could not be rendered (corrupt file, unsupported codec)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Re-encoding a decoded surface to the normalized format failed
    #[error("Encode error: {0}")]
    Encode(String),

    /// The removal engine rejected or threw (model fetch, internal decode, unknown)
    #[error("Processing failed: {0}")]
    Processing(String),

    /// Media type outside the accepted upload set
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network errors while fetching remote resources
    #[error("Network error: {0}")]
    Network(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemovalError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a network error with operation context
    pub fn network_error<E: std::fmt::Display>(operation: &str, error: E) -> Self {
        Self::Network(format!("{operation}: {error}"))
    }

    /// Whether this error came from the removal engine boundary
    #[must_use]
    pub fn is_engine_error(&self) -> bool {
        matches!(self, Self::Processing(_))
    }
}
