//! Config validation, run once at startup before anything binds or spawns.

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};

use crate::RuntimeConfig;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    if config.cache.dir.trim().is_empty() {
        bail!("cache.dir must not be empty");
    }
    if config.cache.max_partitions == 0 {
        bail!("cache.max_partitions must be at least 1");
    }
    if config.source.base_url.trim().is_empty() {
        bail!("source.base_url must not be empty");
    }
    if config.source.fetch_timeout_secs == 0 {
        bail!("source.fetch_timeout_secs must be at least 1");
    }
    config
        .server
        .listen_addr
        .parse::<SocketAddr>()
        .with_context(|| {
            format!(
                "server.listen_addr {:?} is not a valid socket address",
                config.server.listen_addr
            )
        })?;
    if config.audit.enabled {
        if config.audit.host.trim().is_empty() {
            bail!("audit.host must not be empty when audit is enabled");
        }
        if config.audit.index.trim().is_empty() {
            bail!("audit.index must not be empty when audit is enabled");
        }
        if config.audit.queue_capacity == 0 {
            bail!("audit.queue_capacity must be at least 1 when audit is enabled");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&RuntimeConfig::default()).is_ok());
    }

    #[test]
    fn zero_partitions_rejected() {
        let mut config = RuntimeConfig::default();
        config.cache.max_partitions = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_partitions"));
    }

    #[test]
    fn bad_listen_addr_rejected() {
        let mut config = RuntimeConfig::default();
        config.server.listen_addr = "not-an-addr".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn audit_checks_only_apply_when_enabled() {
        let mut config = RuntimeConfig::default();
        config.audit.queue_capacity = 0;
        assert!(validate_config(&config).is_ok());

        config.audit.enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
