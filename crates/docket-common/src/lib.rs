//! # Docket Common
//!
//! Shared model, errors, and crypto policy enforcement for the validator
//! consensus-and-distribution core.
//!
//! ## Core Types
//!
//! - [`Docket`]: a proposed or confirmed batch of transactions for a register
//! - [`Transaction`]: Regular, Control, or Genesis payload with signatures
//! - [`ConsensusVote`]: a validator's Approve/Reject decision on a docket hash
//! - [`Signature`]: immutable signature record tagged with its algorithm
//!
//! ## Crypto
//!
//! - [`crypto::algorithms`]: registry of recognized signature algorithms
//! - [`crypto::policy`]: versioned crypto policy and the [`CryptoPolicyEngine`]
//! - [`crypto::merkle`]: BLAKE3 merkle root and inclusion proofs

pub mod crypto;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use crypto::{
    algorithms::{is_recognized_algorithm, SignatureAlgorithm},
    policy::{
        validate_transaction, CryptoPolicy, CryptoPolicyEngine, EnforcementMode,
        PolicyUpdateOutcome, ValidationResult,
    },
};
pub use error::{DocketError, ModelError, PolicyError, Result};
pub use types::{
    docket::{Docket, DocketDraft, DocketHash, DocketStatus, VoteTally, VoteThresholds},
    signature::Signature,
    transaction::{ControlAction, Transaction, TransactionType},
    vote::{ConsensusVote, VoteDecision},
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default minimum number of Approve votes to confirm a docket
pub const DEFAULT_SIGNATURE_THRESHOLD_MIN: u32 = 2;

/// Default number of votes that count towards confirmation
pub const DEFAULT_SIGNATURE_THRESHOLD_MAX: u32 = 10;
