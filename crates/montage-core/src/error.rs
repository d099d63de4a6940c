//! Error types for Montage.

use thiserror::Error;

/// Main error type for Montage operations.
#[derive(Error, Debug)]
pub enum MontageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A serialized item is missing required fields or carries bad values.
    #[error("Malformed item: {0}")]
    MalformedItem(String),

    /// A journal entry addressed a child slot that does not exist.
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Clip source error: {0}")]
    ClipSource(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Montage operations.
pub type Result<T> = std::result::Result<T, MontageError>;
