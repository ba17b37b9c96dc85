// tripdata-config - runtime configuration for the trip data service
//
// Sources in priority order:
// 1. Environment variables (TRIPDATA_* prefix)
// 2. Config file path from TRIPDATA_CONFIG or the --config flag
// 3. Default config file location (./tripdata.toml)
// 4. Built-in defaults

use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::EnvSource;

/// Main runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

/// Partition cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Local directory holding one parquet file per (year, month).
    pub dir: String,
    /// Maximum number of loaded partitions kept in memory.
    pub max_partitions: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: "/tmp/taxi-data-api/".to_string(),
            max_partitions: 10,
        }
    }
}

/// Remote archive configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// URL prefix for monthly partition files.
    pub base_url: String,
    pub fetch_timeout_secs: u64,
}

impl SourceConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://d37ci6vzurychx.cloudfront.net/trip-data".to_string(),
            fetch_timeout_secs: 30,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Best-effort audit sink configuration. Disabled by default; a down sink
/// never affects the query path.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    /// Elasticsearch-style endpoint, e.g. http://localhost:9200.
    pub host: String,
    pub index: String,
    /// Bounded queue between request handlers and the sink worker.
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "http://localhost:9200".to_string(),
            index: "taxi_data_api".to_string(),
            queue_capacity: 1024,
        }
    }
}

impl RuntimeConfig {
    /// Load from default file locations and the environment.
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load from an explicit file path (CLI --config), then apply
    /// environment overrides.
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
