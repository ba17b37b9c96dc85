//! Environment variable overrides, applied on top of file or default config.

use anyhow::{Context, Result};

use crate::{LogFormat, RuntimeConfig};

pub const ENV_PREFIX: &str = "TRIPDATA_";

/// Abstraction over environment lookup so override logic is testable
/// without mutating the process environment.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the real process environment.
pub struct SystemEnv;

impl EnvSource for SystemEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

fn lookup(env: &dyn EnvSource, name: &str) -> Option<String> {
    env.get(&format!("{ENV_PREFIX}{name}"))
        .filter(|v| !v.is_empty())
}

/// Apply `TRIPDATA_*` overrides to a loaded config. Unset or empty
/// variables leave the existing value in place; set-but-unparseable
/// values are a hard error rather than a silent fallback.
pub fn apply_env_overrides(config: &mut RuntimeConfig, env: &dyn EnvSource) -> Result<()> {
    if let Some(dir) = lookup(env, "CACHE_DIR") {
        config.cache.dir = dir;
    }
    if let Some(raw) = lookup(env, "MAX_CACHED_PARTITIONS") {
        config.cache.max_partitions = raw
            .parse()
            .with_context(|| format!("invalid TRIPDATA_MAX_CACHED_PARTITIONS: {raw:?}"))?;
    }
    if let Some(url) = lookup(env, "SOURCE_BASE_URL") {
        config.source.base_url = url;
    }
    if let Some(raw) = lookup(env, "FETCH_TIMEOUT_SECS") {
        config.source.fetch_timeout_secs = raw
            .parse()
            .with_context(|| format!("invalid TRIPDATA_FETCH_TIMEOUT_SECS: {raw:?}"))?;
    }
    if let Some(addr) = lookup(env, "LISTEN_ADDR") {
        config.server.listen_addr = addr;
    }
    if let Some(level) = lookup(env, "LOG_LEVEL") {
        config.server.log_level = level;
    }
    if let Some(raw) = lookup(env, "LOG_FORMAT") {
        config.server.log_format = match raw.to_ascii_lowercase().as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => anyhow::bail!("invalid TRIPDATA_LOG_FORMAT: {other:?} (expected text or json)"),
        };
    }
    if let Some(raw) = lookup(env, "AUDIT_ENABLED") {
        config.audit.enabled = match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => anyhow::bail!("invalid TRIPDATA_AUDIT_ENABLED: {other:?}"),
        };
    }
    if let Some(host) = lookup(env, "AUDIT_HOST") {
        config.audit.host = host;
    }
    if let Some(index) = lookup(env, "AUDIT_INDEX") {
        config.audit.index = index;
    }
    if let Some(raw) = lookup(env, "AUDIT_QUEUE_CAPACITY") {
        config.audit.queue_capacity = raw
            .parse()
            .with_context(|| format!("invalid TRIPDATA_AUDIT_QUEUE_CAPACITY: {raw:?}"))?;
    }
    Ok(())
}
