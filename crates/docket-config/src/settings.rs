//! Cache settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the two-tier configuration cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigCacheSettings {
    /// Prefix for distributed store keys
    pub key_prefix: String,
    /// Whether the process-local tier is used
    pub local_cache_enabled: bool,
    /// Maximum registers held locally
    pub local_cache_capacity: usize,
    /// Lifetime of a local entry
    pub local_cache_ttl: Duration,
    /// Lifetime of a distributed store entry
    pub distributed_cache_ttl: Duration,
    /// Interval after which a register's configuration is considered stale
    pub stale_check_interval: Duration,
    /// Redis URL; in-memory store when absent
    pub redis_url: Option<String>,
}

impl Default for ConfigCacheSettings {
    fn default() -> Self {
        Self {
            key_prefix: "register:genesis:".to_string(),
            local_cache_enabled: true,
            local_cache_capacity: 1000,
            local_cache_ttl: Duration::from_secs(300),
            distributed_cache_ttl: Duration::from_secs(1800),
            stale_check_interval: Duration::from_secs(300),
            redis_url: None,
        }
    }
}

impl ConfigCacheSettings {
    /// Load settings from `DOCKET_CONFIG_*` environment variables
    pub fn from_env() -> Self {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Ok(prefix) = std::env::var("DOCKET_CONFIG_KEY_PREFIX") {
            cfg.key_prefix = prefix;
        }
        if let Ok(val) = std::env::var("DOCKET_CONFIG_LOCAL_CACHE_ENABLED") {
            if let Ok(v) = val.parse() {
                cfg.local_cache_enabled = v;
            }
        }
        if let Ok(val) = std::env::var("DOCKET_CONFIG_LOCAL_CACHE_CAPACITY") {
            if let Ok(v) = val.parse() {
                cfg.local_cache_capacity = v;
            }
        }
        if let Some(v) = env_secs("DOCKET_CONFIG_LOCAL_CACHE_TTL_SECS") {
            cfg.local_cache_ttl = v;
        }
        if let Some(v) = env_secs("DOCKET_CONFIG_DISTRIBUTED_CACHE_TTL_SECS") {
            cfg.distributed_cache_ttl = v;
        }
        if let Some(v) = env_secs("DOCKET_CONFIG_STALE_CHECK_INTERVAL_SECS") {
            cfg.stale_check_interval = v;
        }
        if let Ok(url) = std::env::var("DOCKET_CONFIG_REDIS_URL") {
            cfg.redis_url = Some(url);
        }

        cfg
    }

    /// Distributed key holding a register's configuration
    pub fn config_key(&self, register_id: &str) -> String {
        format!("{}{}:config", self.key_prefix, register_id)
    }

    /// Distributed key holding the last governed crypto policy; never expires
    pub fn policy_key(&self, register_id: &str) -> String {
        format!("{}{}:policy", self.key_prefix, register_id)
    }

    /// Distributed key holding a register's last staleness check
    pub fn last_check_key(&self, register_id: &str) -> String {
        format!("{}{}:lastcheck", self.key_prefix, register_id)
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let settings = ConfigCacheSettings::default();
        assert_eq!(settings.config_key("reg-1"), "register:genesis:reg-1:config");
        assert_eq!(settings.last_check_key("reg-1"), "register:genesis:reg-1:lastcheck");
        assert_eq!(settings.policy_key("reg-1"), "register:genesis:reg-1:policy");
    }
}
