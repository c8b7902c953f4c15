//! Common error types for the offline pipeline.

use thiserror::Error;

/// Top-level error type for queue, cache and sync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The persistent store cannot be opened or written.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A storage operation failed after the store was opened.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered outside the success range.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Cache-first miss with no network and no substitute.
    #[error("Cache miss: {0}")]
    CacheMiss(String),

    /// Push message body could not be decoded.
    #[error("Malformed push payload: {0}")]
    MalformedPushPayload(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Operation not permitted in the current context.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether another attempt at the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Http { .. } | Error::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Network("reset".to_string()).is_transient());
        assert!(Error::Http {
            status: 500,
            url: "/api/leads".to_string()
        }
        .is_transient());
        assert!(!Error::StorageUnavailable("quota".to_string()).is_transient());
        assert!(!Error::MalformedPushPayload("eof".to_string()).is_transient());
    }

    #[test]
    fn test_http_error_display() {
        let err = Error::Http {
            status: 503,
            url: "https://example.com/api".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503 from https://example.com/api");
    }
}
