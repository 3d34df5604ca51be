//! Error types for Tagline.

use thiserror::Error;

/// Main error type for Tagline operations.
///
/// Malformed time input has no variant: timecode conversions normalise
/// bad input to frame zero.
#[derive(Error, Debug)]
pub enum TaglineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A flush to the content platform failed. Local state is untouched.
    #[error("Flush failed: {message}")]
    Flush { message: String, retryable: bool },

    #[error("Flush cancelled")]
    FlushCancelled,

    #[error("Flush superseded by a newer request")]
    FlushSuperseded,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TaglineError {
    /// Whether the caller may retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Flush { retryable, .. } => *retryable,
            Self::Io(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for Tagline operations.
pub type Result<T> = std::result::Result<T, TaglineError>;
