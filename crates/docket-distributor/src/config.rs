//! Distributor configuration

use std::time::Duration;

use docket_common::{DocketError, Result};
use serde::{Deserialize, Serialize};

/// Timeouts and retry policy for broadcasts and ledger submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributorConfig {
    /// Deadline for a whole broadcast, and for each ledger attempt
    pub broadcast_timeout: Duration,
    /// Additional attempts after a transient failure
    pub max_retries: u32,
    /// Base delay between attempts; doubles on each retry
    pub retry_backoff: Duration,
    /// Submit confirmed dockets to the register service after broadcasting
    pub auto_submit_to_register: bool,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            broadcast_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_backoff: Duration::from_millis(200),
            auto_submit_to_register: true,
        }
    }
}

impl DistributorConfig {
    /// Load configuration from `DOCKET_DISTRIBUTOR_*` environment variables
    pub fn from_env() -> Self {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Ok(val) = std::env::var("DOCKET_DISTRIBUTOR_BROADCAST_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                cfg.broadcast_timeout = Duration::from_millis(v);
            }
        }
        if let Ok(val) = std::env::var("DOCKET_DISTRIBUTOR_MAX_RETRIES") {
            if let Ok(v) = val.parse() {
                cfg.max_retries = v;
            }
        }
        if let Ok(val) = std::env::var("DOCKET_DISTRIBUTOR_RETRY_BACKOFF_MS") {
            if let Ok(v) = val.parse() {
                cfg.retry_backoff = Duration::from_millis(v);
            }
        }
        if let Ok(val) = std::env::var("DOCKET_DISTRIBUTOR_AUTO_SUBMIT") {
            if let Ok(v) = val.parse() {
                cfg.auto_submit_to_register = v;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.broadcast_timeout.is_zero() {
            return Err(DocketError::Config(
                "broadcast_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
