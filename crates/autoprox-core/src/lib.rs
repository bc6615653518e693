//! AutoProx Core Library
//!
//! Rule catalog and on-demand repository provisioning. A request for a
//! missing store is matched against an ordered catalog of rules; the first
//! matching rule synthesizes a definition, which is validated against its
//! remote and persisted once through the wrapped store data manager.

pub mod calculator;
pub mod catalog;
pub mod config;
pub mod decorator;
mod error;
pub mod keyed_lock;
pub mod mapping;
pub mod obs;
pub mod parser;
pub mod probe;
pub mod provenance;
pub mod rule;
pub mod telemetry;
pub mod template_rule;

pub use calculator::{AutoProxCalculator, CalculationResult};
pub use catalog::AutoProxCatalog;
pub use config::AutoProxConfig;
pub use decorator::{AutoProxDataManager, MAX_GROUP_DEPTH};
pub use error::{AutoProxError, Result};
pub use mapping::{CatalogDto, RuleDto, RuleMapping, DEFAULT_RULE_NAME};
pub use parser::{RuleParseError, RuleParser};
pub use probe::ValidationProbe;
pub use provenance::{AUTOPROX_ORIGIN, IMPLIED_BY};
pub use rule::{AutoProxRule, RuleError};
pub use telemetry::{init_tracing, LogFormat};
pub use template_rule::{TemplateRule, TomlRuleParser};
