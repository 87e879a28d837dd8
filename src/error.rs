//! Error types for tilemark.

use thiserror::Error;

/// Errors produced by indexing, tile operations, and serialization.
#[derive(Error, Debug)]
pub enum TilemarkError {
    /// A tile or bin record did not match the expected structure.
    #[error("invalid record format: {0}")]
    InvalidFormat(String),

    /// A caller-supplied value was out of range or otherwise unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenient result type used throughout the crate.
pub type Result<T> = std::result::Result<T, TilemarkError>;

impl TilemarkError {
    pub(crate) fn invalid_format(msg: impl Into<String>) -> Self {
        TilemarkError::InvalidFormat(msg.into())
    }

    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        TilemarkError::InvalidInput(msg.into())
    }
}
