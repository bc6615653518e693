//! Rule-source parsing seam.

use std::sync::Arc;

use thiserror::Error;

use crate::mapping::RuleMapping;
use crate::rule::AutoProxRule;

/// A rule source could not be turned into a rule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot parse rule '{name}': {reason}")]
pub struct RuleParseError {
    pub name: String,
    pub reason: String,
}

impl RuleParseError {
    pub fn new(name: &str, reason: impl Into<String>) -> Self {
        RuleParseError {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Turns rule source text into an executable rule.
pub trait RuleParser: Send + Sync {
    /// File extension (without the dot) of rule sources this parser reads.
    fn extension(&self) -> &str;

    fn parse(&self, name: &str, spec: &str) -> Result<Arc<dyn AutoProxRule>, RuleParseError>;

    /// Parse and bind the result to its name and source text.
    fn parse_mapping(&self, name: &str, spec: &str) -> Result<RuleMapping, RuleParseError> {
        let rule = self.parse(name, spec)?;
        Ok(RuleMapping::new(name, spec, rule))
    }
}
