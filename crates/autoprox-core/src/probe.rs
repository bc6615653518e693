//! Existence checks that gate persistence of synthesized stores.

use std::sync::Arc;
use std::time::Duration;

use remote_transfer::{resource_url, TransferManager};
use repo_state::RemoteRepository;
use tracing::debug;

use crate::obs;

/// Asks the transfer layer whether a path exists, never failing.
///
/// Errors and timeouts count as "does not exist".
#[derive(Clone)]
pub struct ValidationProbe {
    transfer: Arc<dyn TransferManager>,
    timeout: Duration,
}

impl ValidationProbe {
    pub fn new(transfer: Arc<dyn TransferManager>, timeout: Duration) -> Self {
        Self { transfer, timeout }
    }

    pub async fn exists(&self, remote: &RemoteRepository, path: &str) -> bool {
        let url = resource_url(&remote.url, path);
        match tokio::time::timeout(self.timeout, self.transfer.exists(remote, path)).await {
            Ok(Ok(found)) => {
                debug!(url = %url, found, "validation probe answered");
                found
            }
            Ok(Err(e)) => {
                obs::emit_probe_failed(&url, &e);
                false
            }
            Err(_) => {
                obs::emit_probe_failed(
                    &url,
                    &format!("no answer within {}s", self.timeout.as_secs()),
                );
                false
            }
        }
    }
}
