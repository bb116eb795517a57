//! Error types for strata-core.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Errors that can occur in core infrastructure operations.
#[derive(Error, Debug)]
pub enum StrataError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// Decompression error
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// Invalid data format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}
