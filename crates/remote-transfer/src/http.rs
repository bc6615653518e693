//! HTTP existence checks
//!
//! Probes are `HEAD` requests. A success status means the path exists,
//! 404/410 mean it does not; everything else is reported as an error so the
//! caller can log it and decide.

use std::time::Duration;

use async_trait::async_trait;
use repo_state::RemoteRepository;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TransferError;
use crate::{resource_url, Result, TransferManager};

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Request timeout used when the remote does not carry its own
    pub timeout_seconds: u64,
    /// `User-Agent` sent with every probe
    pub user_agent: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            timeout_seconds: 30,
            user_agent: format!("autoprox-remote-transfer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransferConfig {
    pub fn new(timeout_seconds: u64) -> Self {
        TransferConfig {
            timeout_seconds,
            ..Self::default()
        }
    }
}

/// reqwest-backed transfer manager
pub struct HttpTransferManager {
    config: TransferConfig,
    client: reqwest::Client,
}

impl HttpTransferManager {
    pub fn new(config: TransferConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransferError::Client(e.to_string()))?;

        Ok(HttpTransferManager { config, client })
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Per-remote timeout wins over the client default.
    fn timeout_for(&self, remote: &RemoteRepository) -> Duration {
        if remote.timeout_seconds > 0 {
            Duration::from_secs(u64::from(remote.timeout_seconds))
        } else {
            Duration::from_secs(self.config.timeout_seconds)
        }
    }
}

#[async_trait]
impl TransferManager for HttpTransferManager {
    async fn exists(&self, remote: &RemoteRepository, path: &str) -> Result<bool> {
        let url = resource_url(&remote.url, path);
        let target = reqwest::Url::parse(&url).map_err(|e| TransferError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let timeout = self.timeout_for(remote);
        let mut request = self.client.head(target).timeout(timeout);
        if let Some(user) = &remote.user {
            request = request.basic_auth(user, remote.password.as_ref());
        }

        debug!(url = %url, timeout_secs = timeout.as_secs(), "probing remote");
        let response = request
            .send()
            .await
            .map_err(|e| TransferError::from_reqwest(&url, timeout.as_secs(), e))?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "probe answered");
        if status.is_success() {
            Ok(true)
        } else if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            Ok(false)
        } else {
            Err(TransferError::UnexpectedStatus {
                url,
                status: status.as_u16(),
            })
        }
    }
}
