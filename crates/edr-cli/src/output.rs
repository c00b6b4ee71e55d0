//! Writing the rules database file.

use std::fs;
use std::path::{Path, PathBuf};

use edr_normalize::NormalizedRule;
use serde::Serialize;

/// File name of the database inside the configured `db_path`.
pub const RULES_DB_FILE: &str = "edr_rules_db.json";

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize rules database: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl OutputError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Serialize)]
struct RulesDb<'a> {
    edr_rules: &'a [NormalizedRule],
}

/// Location of the database file under `db_path`.
#[must_use]
pub fn rules_db_path(db_path: &Path) -> PathBuf {
    db_path.join(RULES_DB_FILE)
}

/// Writes `{"edr_rules": [...]}` to `path`, replacing any existing file.
pub fn write_rules_db(path: &Path, rules: &[NormalizedRule]) -> Result<(), OutputError> {
    let content = serde_json::to_vec(&RulesDb { edr_rules: rules })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| OutputError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| OutputError::io(path, e))?;

    tracing::info!("Wrote {} rules to {}", rules.len(), path.display());
    Ok(())
}
