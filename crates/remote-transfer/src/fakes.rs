//! Scripted transfer manager (testing only)
//!
//! `StaticTransferManager` answers existence checks from a table keyed by
//! the full resource URL, records every probe, and can simulate slow or
//! hung remotes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use repo_state::RemoteRepository;

use crate::error::TransferError;
use crate::{resource_url, Result, TransferManager};

/// How the fake answers a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Exists,
    Missing,
    /// Transport failure with the given reason
    Fail(String),
    /// Never answers
    Hang,
}

#[derive(Debug)]
pub struct StaticTransferManager {
    outcomes: Mutex<HashMap<String, ProbeOutcome>>,
    fallback: ProbeOutcome,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl Default for StaticTransferManager {
    fn default() -> Self {
        Self::new(ProbeOutcome::Missing)
    }
}

impl StaticTransferManager {
    /// Answer `fallback` for every URL without an explicit outcome.
    pub fn new(fallback: ProbeOutcome) -> Self {
        StaticTransferManager {
            outcomes: Mutex::new(HashMap::new()),
            fallback,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering each probe.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_outcome(self, url: &str, outcome: ProbeOutcome) -> Self {
        self.set(url, outcome);
        self
    }

    pub fn set(&self, url: &str, outcome: ProbeOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(url.to_string(), outcome);
    }

    /// Probed URLs, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TransferManager for StaticTransferManager {
    async fn exists(&self, remote: &RemoteRepository, path: &str) -> Result<bool> {
        let url = resource_url(&remote.url, path);
        self.calls.lock().unwrap().push(url.clone());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            ProbeOutcome::Exists => Ok(true),
            ProbeOutcome::Missing => Ok(false),
            ProbeOutcome::Fail(reason) => Err(TransferError::Http { url, reason }),
            ProbeOutcome::Hang => std::future::pending::<Result<bool>>().await,
        }
    }
}
