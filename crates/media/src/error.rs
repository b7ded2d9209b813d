//! Media store error types.

use thiserror::Error;

/// Media store operation errors.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for media operations.
pub type MediaResult<T> = std::result::Result<T, MediaError>;
