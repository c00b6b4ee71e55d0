use std::fs;

use anyhow::{Context, Result};
use tracing::{Instrument, info_span};

use edr_cli::config::{AppConfig, PartialConfig};
use edr_cli::pipeline::{RunSummary, run};
use edr_normalize::normalize;

use crate::cli::{FetchArgs, NormalizeArgs};

/// Resolves the run configuration from the config file and CLI overrides.
pub fn load_config(args: &FetchArgs) -> Result<AppConfig> {
    let (path, required) = args.config_file();
    let file = PartialConfig::load(&path, required)?;
    let config = file
        .overlay(args.overrides())
        .resolve()
        .with_context(|| format!("incomplete configuration (config file: {})", path.display()))?;
    Ok(config)
}

pub async fn run_fetch(config: &AppConfig) -> Result<RunSummary> {
    let span = info_span!("fetch", host = %config.host);
    let summary = run(config).instrument(span).await?;
    Ok(summary)
}

pub fn run_normalize(args: &NormalizeArgs) -> Result<()> {
    let xml = fs::read_to_string(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;
    let rule = normalize(&xml)
        .with_context(|| format!("failed to normalize {}", args.path.display()))?;
    println!("{}", serde_json::to_string_pretty(&rule)?);
    Ok(())
}
