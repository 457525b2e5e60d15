use std::fmt;

/// Errors that can occur during blob storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// No object is stored under the requested key.
    NotFound(String),
    /// An I/O error occurred.
    Io(std::io::Error),
    /// The key is empty, absolute, or escapes the store root.
    InvalidKey(String),
    /// A listing continuation token could not be honoured.
    InvalidContinuationToken(String),
    /// The object exceeds the configured size limit.
    SizeLimitExceeded { actual: u64, limit: u64 },
    /// The remote backend rejected the request or could not be reached.
    Backend(String),
    /// The store could not be built from its configuration.
    Config(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(key) => write!(f, "object not found: {key}"),
            Self::Io(err) => write!(f, "storage IO error: {err}"),
            Self::InvalidKey(msg) => write!(f, "invalid object key: {msg}"),
            Self::InvalidContinuationToken(msg) => {
                write!(f, "invalid continuation token: {msg}")
            }
            Self::SizeLimitExceeded { actual, limit } => {
                write!(f, "object exceeds size limit ({actual} > {limit} bytes)")
            }
            Self::Backend(msg) => write!(f, "storage backend error: {msg}"),
            Self::Config(msg) => write!(f, "storage configuration error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
