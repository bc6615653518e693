//! AutoProx configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutoProxError, Result};

pub const ENV_ENABLED: &str = "AUTOPROX_ENABLED";
pub const ENV_BASEDIR: &str = "AUTOPROX_BASEDIR";
pub const ENV_VALIDATION_TIMEOUT: &str = "AUTOPROX_VALIDATION_TIMEOUT";

/// Catalog and provisioning settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoProxConfig {
    /// Master switch; a disabled catalog never provisions anything.
    pub enabled: bool,
    /// Directory holding one rule source file per rule.
    pub basedir: PathBuf,
    /// Upper bound on a single validation probe.
    pub validation_timeout_seconds: u64,
}

impl Default for AutoProxConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            basedir: PathBuf::from("autoprox"),
            validation_timeout_seconds: 30,
        }
    }
}

impl AutoProxConfig {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            basedir: basedir.into(),
            ..Self::default()
        }
    }

    pub fn with_validation_timeout_seconds(mut self, seconds: u64) -> Self {
        self.validation_timeout_seconds = seconds;
        self
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_seconds)
    }

    /// Read a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AutoProxError::io(path, e))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| AutoProxError::Config(format!("{}: {}", path.display(), e)))?;
        config.checked()
    }

    /// Defaults overlaid with the process environment.
    ///
    /// Reads:
    /// - AUTOPROX_ENABLED (`true`/`false`)
    /// - AUTOPROX_BASEDIR
    /// - AUTOPROX_VALIDATION_TIMEOUT (seconds)
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_ENABLED) {
            self.enabled = match value.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                other => {
                    return Err(AutoProxError::Config(format!(
                        "{} must be a boolean, got '{}'",
                        ENV_ENABLED, other
                    )))
                }
            };
        }
        if let Some(value) = lookup(ENV_BASEDIR) {
            self.basedir = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_VALIDATION_TIMEOUT) {
            self.validation_timeout_seconds = value.trim().parse().map_err(|_| {
                AutoProxError::Config(format!(
                    "{} must be a number of seconds, got '{}'",
                    ENV_VALIDATION_TIMEOUT, value
                ))
            })?;
        }
        self.checked()
    }

    /// A zero timeout would fail every probe, so it is refused.
    fn checked(self) -> Result<Self> {
        if self.validation_timeout_seconds == 0 {
            return Err(AutoProxError::Config(
                "validation_timeout_seconds must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}
