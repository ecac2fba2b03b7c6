//! Error types for session operations.

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The textual identifier could not be parsed.
    #[error("Malformed session id: {0}")]
    MalformedId(#[from] uuid::Error),
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
