//! Crypto policy enforcement
//!
//! Defines which signature algorithms a register accepts and enforces them:
//! - Accepted set: at least one signature must use an accepted algorithm
//! - Required set: in Strict mode at least one signature must use one of these
//! - Versioned updates: only strictly newer policies replace the current one
//!
//! The engine holds one policy cell read by many validators concurrently and
//! written only through [`CryptoPolicyEngine::apply_policy_update`]. Writers swap
//! in a whole new `Arc`, so readers see either the old or the new policy.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::algorithms::{canonical_name, is_recognized_algorithm, SignatureAlgorithm};
use crate::error::{PolicyError, Result};
use crate::types::docket::Docket;
use crate::types::signature::Signature;
use crate::types::transaction::Transaction;
use crate::types::vote::ConsensusVote;

/// Outcome of validating a transaction or vote against a policy
pub type ValidationResult = std::result::Result<(), PolicyError>;

/// How strictly required algorithms are enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnforcementMode {
    /// Required algorithms must be present
    #[serde(alias = "strict", alias = "STRICT")]
    Strict,
    /// Only the accepted set is enforced
    #[serde(alias = "permissive", alias = "PERMISSIVE")]
    Permissive,
}

/// Versioned signature-algorithm policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoPolicy {
    /// Monotonically increasing version
    #[serde(alias = "Version")]
    pub version: u64,

    /// Algorithms a signature may use
    #[serde(alias = "AcceptedSignatureAlgorithms")]
    pub accepted_signature_algorithms: BTreeSet<String>,

    /// Algorithms of which Strict mode demands at least one
    #[serde(alias = "RequiredSignatureAlgorithms", default)]
    pub required_signature_algorithms: BTreeSet<String>,

    #[serde(alias = "EnforcementMode")]
    pub enforcement_mode: EnforcementMode,

    #[serde(alias = "EffectiveFrom")]
    pub effective_from: DateTime<Utc>,

    /// Identity that authored the policy
    #[serde(alias = "UpdatedBy", default)]
    pub updated_by: String,
}

impl Default for CryptoPolicy {
    fn default() -> Self {
        Self {
            version: 1,
            accepted_signature_algorithms: SignatureAlgorithm::ALL
                .iter()
                .map(|alg| alg.canonical_name().to_string())
                .collect(),
            required_signature_algorithms: BTreeSet::new(),
            enforcement_mode: EnforcementMode::Permissive,
            effective_from: Utc::now(),
            updated_by: "system".to_string(),
        }
    }
}

impl CryptoPolicy {
    /// Check required ⊆ accepted
    pub fn validate(&self) -> std::result::Result<(), PolicyError> {
        let accepted = canonical_set(&self.accepted_signature_algorithms);
        let missing: Vec<String> = canonical_set(&self.required_signature_algorithms)
            .into_iter()
            .filter(|name| !accepted.contains(name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PolicyError::InvalidSubset { missing })
        }
    }

    /// Whether an algorithm name is in the accepted set
    pub fn accepts(&self, algorithm: &str) -> bool {
        contains_canonical(&self.accepted_signature_algorithms, algorithm)
    }

    /// Whether an algorithm name is in the required set
    pub fn requires(&self, algorithm: &str) -> bool {
        contains_canonical(&self.required_signature_algorithms, algorithm)
    }

    /// Accepted algorithms that are not in the registry
    pub fn unrecognized_algorithms(&self) -> Vec<&str> {
        self.accepted_signature_algorithms
            .iter()
            .chain(self.required_signature_algorithms.iter())
            .map(String::as_str)
            .filter(|name| !is_recognized_algorithm(name))
            .collect()
    }
}

fn canonical_set(names: &BTreeSet<String>) -> BTreeSet<String> {
    names.iter().map(|n| canonical_name(n)).collect()
}

fn contains_canonical(names: &BTreeSet<String>, algorithm: &str) -> bool {
    let wanted = canonical_name(algorithm);
    names.iter().any(|n| canonical_name(n) == wanted)
}

/// Validate a transaction's signatures against a policy.
///
/// Control and Genesis transactions pass without their signatures being
/// inspected.
pub fn validate_transaction(tx: &Transaction, policy: &CryptoPolicy) -> ValidationResult {
    if tx.tx_type.is_policy_exempt() {
        return Ok(());
    }
    validate_signatures(&tx.signatures, policy)
}

fn validate_signatures(signatures: &[Signature], policy: &CryptoPolicy) -> ValidationResult {
    if signatures.is_empty() {
        return Err(PolicyError::NoSignatures);
    }

    if !signatures.iter().any(|s| policy.accepts(s.algorithm())) {
        return Err(PolicyError::UnacceptedAlgorithm {
            offered: signatures.iter().map(Signature::canonical_algorithm).collect(),
        });
    }

    if policy.enforcement_mode == EnforcementMode::Strict
        && !policy.required_signature_algorithms.is_empty()
        && !signatures.iter().any(|s| policy.requires(s.algorithm()))
    {
        return Err(PolicyError::RequiredAlgorithmMissing {
            required: canonical_set(&policy.required_signature_algorithms)
                .into_iter()
                .collect(),
        });
    }

    Ok(())
}

/// Result of offering a policy update to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyUpdateOutcome {
    /// The offered policy became current
    Applied { previous_version: u64, new_version: u64 },
    /// The offered policy was not newer than the current one
    Ignored { current_version: u64, offered_version: u64 },
}

impl PolicyUpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PolicyUpdateOutcome::Applied { .. })
    }
}

/// Holds the current crypto policy and validates against it
pub struct CryptoPolicyEngine {
    current: RwLock<Arc<CryptoPolicy>>,
}

impl CryptoPolicyEngine {
    /// Create an engine with an initial policy
    pub fn new(initial: CryptoPolicy) -> std::result::Result<Self, PolicyError> {
        initial.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(initial)),
        })
    }

    /// Snapshot of the current policy
    pub fn current(&self) -> Arc<CryptoPolicy> {
        self.current.read().clone()
    }

    pub fn current_version(&self) -> u64 {
        self.current.read().version
    }

    /// Case-insensitive registry lookup
    pub fn is_recognized_algorithm(&self, name: &str) -> bool {
        is_recognized_algorithm(name)
    }

    /// Validate a transaction against an explicit policy
    pub fn validate_transaction(&self, tx: &Transaction, policy: &CryptoPolicy) -> ValidationResult {
        validate_transaction(tx, policy)
    }

    /// Validate a transaction against the current policy
    pub fn validate(&self, tx: &Transaction) -> ValidationResult {
        let policy = self.current();
        let result = validate_transaction(tx, &policy);
        if let Err(ref e) = result {
            debug!(tx_id = %tx.id, policy_version = policy.version, error = %e, "Transaction failed crypto policy");
        }
        result
    }

    /// Validate every transaction in a docket against one policy snapshot.
    ///
    /// Returns the failing transaction ids with their errors; empty means valid.
    pub fn validate_docket(&self, docket: &Docket) -> Vec<(String, PolicyError)> {
        let policy = self.current();
        docket
            .transactions()
            .iter()
            .filter_map(|tx| {
                validate_transaction(tx, &policy)
                    .err()
                    .map(|e| (tx.id.clone(), e))
            })
            .collect()
    }

    /// Validate a vote's signature algorithm against the current policy.
    ///
    /// Independent of the vote-count threshold; a vote must pass both.
    pub fn validate_vote(&self, vote: &ConsensusVote) -> ValidationResult {
        let policy = self.current();
        validate_signatures(std::slice::from_ref(&vote.validator_signature), &policy)
    }

    /// Offer a new policy.
    ///
    /// Fails if required ⊄ accepted. Otherwise the policy replaces the current
    /// one only when its version is strictly greater; stale or repeated
    /// updates are ignored.
    pub fn apply_policy_update(
        &self,
        policy: CryptoPolicy,
    ) -> std::result::Result<PolicyUpdateOutcome, PolicyError> {
        if let Err(e) = policy.validate() {
            warn!(version = policy.version, error = %e, "Rejected crypto policy update");
            return Err(e);
        }

        let unrecognized = policy.unrecognized_algorithms();
        if !unrecognized.is_empty() {
            warn!(version = policy.version, ?unrecognized, "Policy names unrecognized algorithms");
        }

        let mut current = self.current.write();
        if policy.version <= current.version {
            debug!(
                current = current.version,
                offered = policy.version,
                "Ignoring non-increasing crypto policy version"
            );
            return Ok(PolicyUpdateOutcome::Ignored {
                current_version: current.version,
                offered_version: policy.version,
            });
        }

        let previous_version = current.version;
        let new_version = policy.version;
        *current = Arc::new(policy);
        drop(current);

        info!(previous_version, new_version, "Crypto policy updated");
        Ok(PolicyUpdateOutcome::Applied {
            previous_version,
            new_version,
        })
    }

    /// Apply the policy carried by a `CryptoPolicyUpdate` control transaction
    pub fn apply_control_transaction(&self, tx: &Transaction) -> Result<PolicyUpdateOutcome> {
        let policy = tx.crypto_policy_update()?;
        Ok(self.apply_policy_update(policy)?)
    }
}

impl Default for CryptoPolicyEngine {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(CryptoPolicy::default())),
        }
    }
}
