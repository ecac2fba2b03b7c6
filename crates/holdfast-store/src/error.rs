//! Error types for the store crate.

use thiserror::Error;

/// Errors that can occur in the store crate.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection or statement failed. Storage failures propagate
    /// unchanged; the store does not interpret error codes or retry.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Attribute serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A non-default attribute codec failed.
    #[error("Codec error: {0}")]
    Codec(String),

    /// The caller supplied a textual session id that does not parse.
    #[error(transparent)]
    MalformedId(#[from] holdfast_session::SessionError),

    /// Rejected configuration, caught before any statement text is built.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Persisted data that cannot be mapped back to an entity.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
