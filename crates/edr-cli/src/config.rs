//! Run configuration.
//!
//! Values come from a TOML file and may be overridden on the command line.
//! Both layers are read into a [`PartialConfig`]; [`PartialConfig::resolve`]
//! checks that every required value is present.
//!
//! ```toml
//! db_path = "/var/lib/edr"
//! host = "https://api.example.com"
//! token_host = "https://auth.example.com"
//! username = "svc-edr"
//! password = "..."
//! debug = false
//! lenient_actions = false
//! ```

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use edr_client::Credentials;
use serde::Deserialize;

use crate::output::rules_db_path;
use crate::pipeline::NormalizeOptions;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required setting '{field}'")]
    MissingField { field: &'static str },
}

/// One layer of settings, every value optional.
#[derive(Default, Clone, Deserialize)]
pub struct PartialConfig {
    pub db_path: Option<PathBuf>,
    pub host: Option<String>,
    pub token_host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub debug: Option<bool>,
    pub lenient_actions: Option<bool>,
}

impl fmt::Debug for PartialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialConfig")
            .field("db_path", &self.db_path)
            .field("host", &self.host)
            .field("token_host", &self.token_host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("debug", &self.debug)
            .field("lenient_actions", &self.lenient_actions)
            .finish()
    }
}

impl PartialConfig {
    /// Reads a TOML config file.
    ///
    /// A missing file yields an empty layer unless `required` is set.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::Toml {
                path: path.to_path_buf(),
                source: e,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Layers `overrides` on top of `self`; values set in `overrides` win.
    #[must_use]
    pub fn overlay(self, overrides: PartialConfig) -> Self {
        Self {
            db_path: overrides.db_path.or(self.db_path),
            host: overrides.host.or(self.host),
            token_host: overrides.token_host.or(self.token_host),
            username: overrides.username.or(self.username),
            password: overrides.password.or(self.password),
            debug: overrides.debug.or(self.debug),
            lenient_actions: overrides.lenient_actions.or(self.lenient_actions),
        }
    }

    /// Checks that every required setting is present.
    pub fn resolve(self) -> Result<AppConfig, ConfigError> {
        Ok(AppConfig {
            db_path: required(self.db_path, "db_path")?,
            host: required(self.host, "host")?,
            token_host: required(self.token_host, "token_host")?,
            username: required(self.username, "username")?,
            password: required(self.password, "password")?,
            debug: self.debug.unwrap_or(false),
            lenient_actions: self.lenient_actions.unwrap_or(false),
        })
    }
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::MissingField { field })
}

/// Fully resolved settings for a run.
#[derive(Clone)]
pub struct AppConfig {
    /// Directory receiving the rules database file.
    pub db_path: PathBuf,
    /// Base URL of the rules API.
    pub host: String,
    /// Base URL of the token service.
    pub token_host: String,
    pub username: String,
    password: String,
    /// Log at debug level unless the command line says otherwise.
    pub debug: bool,
    /// Count rules without actions as parse failures instead of aborting.
    pub lenient_actions: bool,
}

impl AppConfig {
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    /// Path of the rules database file.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        rules_db_path(&self.db_path)
    }

    #[must_use]
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            lenient_actions: self.lenient_actions,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("db_path", &self.db_path)
            .field("host", &self.host)
            .field("token_host", &self.token_host)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("debug", &self.debug)
            .field("lenient_actions", &self.lenient_actions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
db_path = "/var/lib/edr"
host = "https://api.example.com"
token_host = "https://auth.example.com"
username = "svc-edr"
password = "s3cret"
debug = true
"#;

    #[test]
    fn test_parse_and_resolve() {
        let partial: PartialConfig = toml::from_str(SAMPLE).unwrap();
        let config = partial.resolve().unwrap();

        assert_eq!(config.host, "https://api.example.com");
        assert!(config.debug);
        assert!(!config.lenient_actions);
        assert_eq!(
            config.output_path(),
            PathBuf::from("/var/lib/edr/edr_rules_db.json")
        );
        assert_eq!(config.credentials().password(), "s3cret");
    }

    #[test]
    fn test_overrides_win() {
        let file: PartialConfig = toml::from_str(SAMPLE).unwrap();
        let overrides = PartialConfig {
            host: Some("https://staging.example.com".to_string()),
            debug: Some(false),
            ..PartialConfig::default()
        };

        let config = file.overlay(overrides).resolve().unwrap();

        assert_eq!(config.host, "https://staging.example.com");
        assert_eq!(config.token_host, "https://auth.example.com");
        assert!(!config.debug);
    }

    #[test]
    fn test_missing_field() {
        let partial: PartialConfig = toml::from_str(r#"db_path = "/tmp""#).unwrap();
        let err = partial.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "host" }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, SAMPLE).unwrap();

        let partial = PartialConfig::load(&path, true).unwrap();
        assert_eq!(partial.username.as_deref(), Some("svc-edr"));
    }

    #[test]
    fn test_missing_file_only_fails_when_required() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(PartialConfig::load(&path, false).unwrap().host.is_none());
        assert!(matches!(
            PartialConfig::load(&path, true),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "host = [unterminated").unwrap();

        assert!(matches!(
            PartialConfig::load(&path, true),
            Err(ConfigError::Toml { .. })
        ));
    }

    #[test]
    fn test_password_is_redacted() {
        let config = toml::from_str::<PartialConfig>(SAMPLE)
            .unwrap()
            .resolve()
            .unwrap();
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}
