//! AutoProx daemon
//!
//! Composition root for on-demand repository provisioning: loads the
//! configuration, boots the rule catalog and wires the provisioning decorator
//! over an in-memory store data manager.
//!
//! ## Modes
//!
//! - default: load the catalog, report what was loaded, exit
//! - `--list`: print the catalog as JSON
//! - `--eval <KEY>`: dry-run what provisioning `KEY` would create
//! - `--resolve <KEY>`: provision `KEY`, probing remotes over HTTP

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use autoprox_core::{
    init_tracing, AutoProxCalculator, AutoProxCatalog, AutoProxConfig, AutoProxDataManager,
    LogFormat, TomlRuleParser,
};
use clap::Parser;
use remote_transfer::{HttpTransferManager, TransferConfig};
use repo_state::fakes::MemoryStoreDataManager;
use repo_state::{StoreDataManager, StoreKey};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "autoproxd")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "On-demand repository provisioning (AutoProx)", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// TOML configuration file; environment variables override its values
    #[arg(short, long, env = "AUTOPROX_CONFIG")]
    config: Option<PathBuf>,

    /// Rule directory, overriding the configuration
    #[arg(long)]
    basedir: Option<PathBuf>,

    /// Print the loaded catalog as JSON
    #[arg(long)]
    list: bool,

    /// Report what provisioning KEY would create, without writing anything
    #[arg(long = "eval", value_name = "KEY")]
    eval: Vec<StoreKey>,

    /// Provision KEY, validating remotes over HTTP
    #[arg(long = "resolve", value_name = "KEY")]
    resolve: Vec<StoreKey>,
}

impl Cli {
    fn load_config(&self) -> Result<AutoProxConfig> {
        let mut config = match &self.config {
            Some(path) => AutoProxConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
                .with_env_overrides(),
            None => AutoProxConfig::from_env(),
        }
        .context("Invalid AutoProx environment")?;
        if let Some(basedir) = &self.basedir {
            config.basedir = basedir.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(format, level);

    let config = cli.load_config()?;
    let catalog = Arc::new(AutoProxCatalog::new(
        config.clone(),
        Arc::new(TomlRuleParser),
    ));
    catalog
        .init()
        .with_context(|| format!("Failed to load rules from {}", config.basedir.display()))?;
    info!(
        enabled = catalog.is_enabled(),
        rules = catalog.rule_mappings().len(),
        basedir = %config.basedir.display(),
        "autoproxd started"
    );

    let store: Arc<dyn StoreDataManager> = Arc::new(MemoryStoreDataManager::new());

    if cli.list {
        println!("{}", serde_json::to_string_pretty(&catalog.to_dto())?);
    }

    if !cli.eval.is_empty() {
        let calculator = AutoProxCalculator::new(store.clone(), catalog.clone());
        for key in &cli.eval {
            let result = calculator
                .evaluate(key)
                .await
                .with_context(|| format!("Failed to evaluate {}", key))?;
            let report = serde_json::json!({ "key": key, "result": result });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if !cli.resolve.is_empty() {
        let transfer = HttpTransferManager::new(TransferConfig::new(
            config.validation_timeout_seconds,
        ))
        .context("Failed to build HTTP client")?;
        let manager = AutoProxDataManager::new(store.clone(), catalog.clone(), Arc::new(transfer));
        for key in &cli.resolve {
            let resolved = manager
                .resolve(key)
                .await
                .with_context(|| format!("Failed to resolve {}", key))?;
            let report = serde_json::json!({ "key": key, "store": resolved });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    catalog.close();
    Ok(())
}
