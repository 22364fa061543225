//! Genesis configuration records
//!
//! Persisted as JSON with camelCase field names; PascalCase spellings are
//! accepted on input so records written by other services still decode.
//! Durations are stored as whole milliseconds.

use std::time::Duration;

use chrono::{DateTime, Utc};
use docket_common::{CryptoPolicy, DocketError, Result, VoteThresholds};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::DEFAULT_BLUEPRINT_VERSION;

/// Serde helper for Duration as milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Full per-register configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisConfiguration {
    #[serde(alias = "RegisterId")]
    pub register_id: String,

    #[serde(alias = "GenesisTransactionId", default)]
    pub genesis_transaction_id: String,

    /// Bumped whenever a control-driven update is applied
    #[serde(alias = "ControlBlueprintVersionId", default)]
    pub control_blueprint_version_id: String,

    #[serde(alias = "Consensus")]
    pub consensus: ConsensusConfig,

    #[serde(alias = "Validators")]
    pub validators: ValidatorConfig,

    #[serde(alias = "LeaderElection")]
    pub leader_election: LeaderElectionConfig,

    /// Policy from the most recent crypto policy control transaction
    #[serde(alias = "CryptoPolicy", default, skip_serializing_if = "Option::is_none")]
    pub crypto_policy: Option<CryptoPolicy>,

    #[serde(alias = "LoadedAt")]
    pub loaded_at: DateTime<Utc>,

    #[serde(alias = "CacheTtl", with = "duration_ms")]
    pub cache_ttl: Duration,
}

impl GenesisConfiguration {
    /// Defaults used when no configuration exists for a register
    pub fn synthesize_default(register_id: &str) -> Self {
        Self {
            register_id: register_id.to_string(),
            genesis_transaction_id: String::new(),
            control_blueprint_version_id: DEFAULT_BLUEPRINT_VERSION.to_string(),
            consensus: ConsensusConfig::default(),
            validators: ValidatorConfig::default(),
            leader_election: LeaderElectionConfig::default(),
            crypto_policy: None,
            loaded_at: Utc::now(),
            cache_ttl: Duration::from_secs(300),
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.register_id.is_empty() {
            return Err(DocketError::Config("register_id is empty".to_string()));
        }
        self.consensus.validate()?;
        self.validators.validate()?;
        if let Some(policy) = &self.crypto_policy {
            policy.validate()?;
        }
        Ok(())
    }
}

/// Consensus parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusConfig {
    #[serde(alias = "SignatureThresholdMin")]
    pub signature_threshold_min: u32,

    #[serde(alias = "SignatureThresholdMax")]
    pub signature_threshold_max: u32,

    #[serde(alias = "DocketTimeout", with = "duration_ms")]
    pub docket_timeout: Duration,

    #[serde(alias = "MaxSignaturesPerDocket")]
    pub max_signatures_per_docket: u32,

    #[serde(alias = "MaxTransactionsPerDocket")]
    pub max_transactions_per_docket: u32,

    #[serde(alias = "DocketBuildInterval", with = "duration_ms")]
    pub docket_build_interval: Duration,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            signature_threshold_min: docket_common::DEFAULT_SIGNATURE_THRESHOLD_MIN,
            signature_threshold_max: docket_common::DEFAULT_SIGNATURE_THRESHOLD_MAX,
            docket_timeout: Duration::from_secs(30),
            max_signatures_per_docket: 10,
            max_transactions_per_docket: 100,
            docket_build_interval: Duration::from_millis(100),
        }
    }
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.signature_threshold_max < self.signature_threshold_min {
            return Err(DocketError::Config(format!(
                "signatureThresholdMax {} < signatureThresholdMin {}",
                self.signature_threshold_max, self.signature_threshold_min
            )));
        }
        if self.max_transactions_per_docket == 0 {
            return Err(DocketError::Config(
                "maxTransactionsPerDocket must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Vote thresholds for docket confirmation
    pub fn thresholds(&self) -> VoteThresholds {
        VoteThresholds::new(self.signature_threshold_min, self.signature_threshold_max)
    }
}

/// How validators join a register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationMode {
    #[serde(alias = "Public")]
    Public,
    #[serde(alias = "Consent")]
    Consent,
    #[serde(alias = "Invite")]
    Invite,
    /// A mode this build does not know, e.g. written by a newer service
    #[serde(other)]
    Other,
}

/// Validator set parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorConfig {
    #[serde(alias = "RegistrationMode")]
    pub registration_mode: RegistrationMode,

    #[serde(alias = "MinValidators")]
    pub min_validators: u32,

    #[serde(alias = "MaxValidators")]
    pub max_validators: u32,

    #[serde(alias = "RequireStake")]
    pub require_stake: bool,

    #[serde(alias = "StakeAmount", default)]
    pub stake_amount: Decimal,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            registration_mode: RegistrationMode::Public,
            min_validators: 1,
            max_validators: 100,
            require_stake: false,
            stake_amount: Decimal::ZERO,
        }
    }
}

impl ValidatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_validators < self.min_validators {
            return Err(DocketError::Config(format!(
                "maxValidators {} < minValidators {}",
                self.max_validators, self.min_validators
            )));
        }
        if self.require_stake && self.stake_amount <= Decimal::ZERO {
            return Err(DocketError::Config(
                "stakeAmount must be positive when stake is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Leader election parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderElectionConfig {
    #[serde(alias = "Mechanism")]
    pub mechanism: String,

    #[serde(alias = "HeartbeatInterval", with = "duration_ms")]
    pub heartbeat_interval: Duration,

    #[serde(alias = "LeaderTimeout", with = "duration_ms")]
    pub leader_timeout: Duration,

    #[serde(alias = "TermDuration", with = "duration_ms")]
    pub term_duration: Duration,
}

impl Default for LeaderElectionConfig {
    fn default() -> Self {
        Self {
            mechanism: "rotating".to_string(),
            heartbeat_interval: Duration::from_secs(1),
            leader_timeout: Duration::from_secs(5),
            term_duration: Duration::from_secs(60),
        }
    }
}
