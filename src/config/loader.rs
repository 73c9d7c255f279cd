//! YAML config loading. Validation failure is fatal at load time and does
//! not trigger the supervisor's automatic restart — the process exits with
//! code 78 (`EX_CONFIG` in BSD `sysexits.h`), per §6.

use std::path::Path;

use super::types::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: serde_yaml::Error },
    #[error(transparent)]
    Invalid(#[from] super::types::ConfigError),
}

pub fn load(path: &Path) -> Result<AppConfig, LoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: AppConfig = serde_yaml::from_str(&raw).map_err(|source| LoadError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// `sysexits.h`'s `EX_CONFIG`: configuration error.
pub const EXIT_CONFIG_ERROR: i32 = 78;

pub fn load_or_exit(path: &Path) -> AppConfig {
    match load(path) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(error = %error, path = %path.display(), "invalid configuration");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    }
}
