//! CLI argument definitions for the EDR rules exporter.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use colorchoice_clap::Color;

use edr_cli::config::{DEFAULT_CONFIG_FILE, PartialConfig};

#[derive(Parser)]
#[command(
    name = "edr-rules-db",
    version,
    about = "Build a local JSON database of EDR rules",
    long_about = "Download every EDR rule from the provider API, normalize each rule's\n\
                  XML definition, and write the result to <db_path>/edr_rules_db.json."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags and the config `debug` switch).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch all rules from the provider and write the rules database.
    Fetch(FetchArgs),

    /// Normalize a single XML rule file and print the result as JSON.
    Normalize(NormalizeArgs),
}

#[derive(Args)]
pub struct FetchArgs {
    /// Path to the TOML config file.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory receiving edr_rules_db.json.
    #[arg(long = "db-path", value_name = "DIR")]
    pub db_path: Option<PathBuf>,

    /// Base URL of the rules API.
    #[arg(long = "host", value_name = "URL")]
    pub host: Option<String>,

    /// Base URL of the OAuth token service.
    #[arg(long = "token-host", value_name = "URL")]
    pub token_host: Option<String>,

    /// API username.
    #[arg(long = "username")]
    pub username: Option<String>,

    /// API password.
    #[arg(long = "password", env = "EDR_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Skip rules without actions instead of aborting the run.
    #[arg(long = "lenient-actions")]
    pub lenient_actions: bool,
}

impl FetchArgs {
    /// Config file to read, and whether it must exist.
    pub fn config_file(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        }
    }

    /// Settings given on the command line.
    pub fn overrides(&self) -> PartialConfig {
        PartialConfig {
            db_path: self.db_path.clone(),
            host: self.host.clone(),
            token_host: self.token_host.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            debug: None,
            lenient_actions: self.lenient_actions.then_some(true),
        }
    }
}

#[derive(Args)]
pub struct NormalizeArgs {
    /// XML file holding one rule definition.
    #[arg(value_name = "FILE")]
    pub path: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
