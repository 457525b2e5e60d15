use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Non-positive chunk number or duration, or an identifier that sanitizes to nothing.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Neither the canonical nor the legacy session document exists.
    #[error("session metadata not found for {0}")]
    NotFound(String),

    /// The processing status document is missing or unreadable.
    ///
    /// Never surfaced by the public stores; they synthesize defaults instead.
    #[error("inconsistent session state: {0}")]
    InconsistentState(String),

    #[error("malformed document at {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
