//! Remote-Transfer: existence checks against remote repositories
//!
//! AutoProx trusts a synthesized remote only after asking the network
//! whether a path exists under it. This crate owns that question.
//!
//! ## Layer 1 - Network
//!
//! Focus: bounded, side-effect free probes. Callers decide how to treat
//! failures; nothing here retries.

mod error;
pub mod fakes;
pub mod http;

use async_trait::async_trait;
use repo_state::RemoteRepository;

pub use error::TransferError;
pub use http::{HttpTransferManager, TransferConfig};
pub use reqwest::Url;

/// Result type for transfer operations
pub type Result<T> = std::result::Result<T, TransferError>;

/// Network transfer layer as seen by AutoProx.
#[async_trait]
pub trait TransferManager: Send + Sync {
    /// Whether `path` exists under `remote`'s base URL.
    ///
    /// `Ok(false)` means the remote answered and the path is absent; transport
    /// failures and unexpected answers are errors.
    async fn exists(&self, remote: &RemoteRepository, path: &str) -> Result<bool>;
}

/// Join a remote base URL and a repository path with exactly one `/` between.
///
/// An empty path or `/` addresses the root of the remote.
pub fn resource_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}
