//! Error types for remote-transfer

use thiserror::Error;

/// Errors that can occur while probing a remote
#[derive(Error, Debug)]
pub enum TransferError {
    /// The resource URL could not be built
    #[error("invalid remote URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    /// Connection, TLS or protocol failure
    #[error("HTTP error for {url}: {reason}")]
    Http { url: String, reason: String },

    /// The remote did not answer in time
    #[error("timed out after {seconds}s probing {url}")]
    Timeout { url: String, seconds: u64 },

    /// The remote answered with neither success nor not-found
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },
}

impl TransferError {
    pub(crate) fn from_reqwest(url: &str, timeout_seconds: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return TransferError::Timeout {
                url: url.to_string(),
                seconds: timeout_seconds,
            };
        }
        TransferError::Http {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
