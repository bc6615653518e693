//! Error types for repo-state

use thiserror::Error;

/// Errors raised by the store data manager and the store model.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A textual store key could not be parsed
    #[error("invalid store key '{value}': {reason}")]
    InvalidKey { value: String, reason: String },

    /// A referenced store does not exist
    #[error("store not found: {key}")]
    NotFound { key: String },

    /// The backend refused to persist a definition
    #[error("store {key} rejected: {reason}")]
    Rejected { key: String, reason: String },

    /// Backend-specific failure (connection, query, serialization)
    #[error("store backend failed: {0}")]
    Backend(String),

    /// Failure raised by a layer wrapping the data manager
    #[error(transparent)]
    Provider(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_error_names_key_and_reason() {
        let err = StoreError::Rejected {
            key: "maven:remote:central".to_string(),
            reason: "read-only backend".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("maven:remote:central"));
        assert!(msg.contains("read-only backend"));
    }

    #[test]
    fn provider_error_is_transparent() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "rule blew up");
        let err = StoreError::Provider(Box::new(inner));
        assert_eq!(err.to_string(), "rule blew up");
    }
}
