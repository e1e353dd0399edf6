//! Common error types for gembasync.

use thiserror::Error;

/// Top-level error type for gembasync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport failed (connect, timeout, unexpected status).
    #[error("Network error: {0}")]
    Network(String),

    /// The remote system rejected our credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The remote system refused the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The remote catalog could not be retrieved; nothing was reconciled.
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// A single version could not be fetched or written to the cache.
    #[error("Failed to fetch {version_id}: {reason}")]
    ContentFetch { version_id: String, reason: String },

    /// The manifest could not be persisted.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The background scheduler is not running.
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl Error {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Io(_))
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
        assert!(Error::Io(std::io::Error::other("disk")).is_transient());
        assert!(!Error::NotFound("x".to_string()).is_transient());
        assert!(!Error::Authentication("bad key".to_string()).is_transient());
    }

    #[test]
    fn test_content_fetch_message() {
        let err = Error::ContentFetch {
            version_id: "abc".to_string(),
            reason: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to fetch abc: not found");
    }
}
