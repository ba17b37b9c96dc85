//! Config file discovery and loading.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::env_overrides::{apply_env_overrides, SystemEnv};
use crate::RuntimeConfig;

const CONFIG_PATH_ENV: &str = "TRIPDATA_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "tripdata.toml";

/// Load config from the default locations: a file named by
/// `TRIPDATA_CONFIG`, then `./tripdata.toml` if present, then built-in
/// defaults. Environment overrides apply last.
pub fn load_config() -> Result<RuntimeConfig> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.is_empty() => parse_file(Path::new(&path))?,
        _ => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                parse_file(default)?
            } else {
                debug!("no config file found, using defaults");
                RuntimeConfig::default()
            }
        }
    };
    apply_env_overrides(&mut config, &SystemEnv)?;
    Ok(config)
}

/// Load from an explicit path, then apply environment overrides.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let mut config = parse_file(path.as_ref())?;
    apply_env_overrides(&mut config, &SystemEnv)?;
    Ok(config)
}

fn parse_file(path: &Path) -> Result<RuntimeConfig> {
    debug!(path = %path.display(), "loading config file");
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse config file {}", path.display()))
}
