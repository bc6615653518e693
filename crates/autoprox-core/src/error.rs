//! Error taxonomy for AutoProx.

use std::path::PathBuf;

use repo_state::{StoreError, StoreKey};

use crate::parser::RuleParseError;
use crate::rule::RuleError;

/// AutoProx errors.
#[derive(Debug, thiserror::Error)]
pub enum AutoProxError {
    /// A catalog operation that needs an explicit answer ran while disabled.
    #[error("autoprox is disabled")]
    Disabled,

    #[error("invalid rule name '{name}': {reason}")]
    InvalidRuleName { name: String, reason: String },

    #[error(transparent)]
    Parse(#[from] RuleParseError),

    /// A rule's create method failed for a key.
    #[error("rule '{rule}' failed to synthesize {key}: {source}")]
    RuleSynthesis {
        rule: String,
        key: StoreKey,
        #[source]
        source: RuleError,
    },

    #[error("rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    /// Passed through unchanged from the underlying data manager.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AutoProxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AutoProxError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Lets the decorator stand in for a plain `StoreDataManager`: data manager
/// errors come back unchanged, everything else is boxed.
impl From<AutoProxError> for StoreError {
    fn from(err: AutoProxError) -> Self {
        match err {
            AutoProxError::Store(inner) => inner,
            other => StoreError::Provider(Box::new(other)),
        }
    }
}

/// Result type for AutoProx operations.
pub type Result<T> = std::result::Result<T, AutoProxError>;
