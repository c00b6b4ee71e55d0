//! EDR rules database exporter.

use clap::{ColorChoice, Parser};
use edr_cli::logging::{LogConfig, LogFormat, init_logging};
use std::io::{self, IsTerminal};
use tracing::level_filters::LevelFilter;

mod cli;
mod commands;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use crate::commands::{load_config, run_fetch, run_normalize};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli.color.write_global();

    let exit_code = match &cli.command {
        Command::Fetch(args) => {
            let config = match load_config(args) {
                Ok(config) => config,
                Err(error) => {
                    eprintln!("error: {error:#}");
                    std::process::exit(1);
                }
            };
            start_logging(&cli, config.debug);
            tracing::debug!(?config, "Loaded configuration");

            match run_fetch(&config).await {
                Ok(summary) => {
                    tracing::debug!(
                        pages = summary.pages,
                        rules = summary.metrics.parsed(),
                        output = %summary.output_path.display(),
                        "Run finished"
                    );
                    0
                }
                Err(error) => {
                    tracing::error!("Get EDR rules DB was not successful: {error:#}");
                    1
                }
            }
        }
        Command::Normalize(args) => {
            start_logging(&cli, false);
            match run_normalize(args) {
                Ok(()) => 0,
                Err(error) => {
                    eprintln!("error: {error:#}");
                    1
                }
            }
        }
    };
    std::process::exit(exit_code);
}

fn start_logging(cli: &Cli, debug: bool) {
    let log_config = log_config_from_cli(cli, debug);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
}

/// Build logging configuration from CLI flags with consistent precedence:
/// `--log-level`, then `-v/-q`, then the config `debug` switch.
fn log_config_from_cli(cli: &Cli, debug: bool) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if debug && !cli.verbosity.is_present() {
        config.level_filter = LevelFilter::DEBUG;
        config.use_env_filter = false;
    }
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_config_debug_is_not_replaced_by_rust_log() {
        let config = log_config_from_cli(&parse(&["edr-rules-db", "fetch"]), true);

        assert_eq!(config.level_filter, LevelFilter::DEBUG);
        assert!(!config.use_env_filter);
    }

    #[test]
    fn test_rust_log_applies_without_level_settings() {
        let config = log_config_from_cli(&parse(&["edr-rules-db", "fetch"]), false);

        assert_eq!(config.level_filter, LevelFilter::INFO);
        assert!(config.use_env_filter);
    }

    #[test]
    fn test_command_line_level_wins_over_config_debug() {
        let cli = parse(&["edr-rules-db", "--log-level", "warn", "fetch"]);
        let config = log_config_from_cli(&cli, true);

        assert_eq!(config.level_filter, LevelFilter::WARN);
        assert!(!config.use_env_filter);

        let config = log_config_from_cli(&parse(&["edr-rules-db", "-q", "fetch"]), true);
        assert_eq!(config.level_filter, LevelFilter::WARN);
    }
}
