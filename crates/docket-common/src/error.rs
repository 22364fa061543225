//! Error types for the validator core
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;

/// Result type alias using DocketError
pub type Result<T> = std::result::Result<T, DocketError>;

/// Unified error type for validator core operations
#[derive(Debug, Clone, Error)]
pub enum DocketError {
    // Missing collaborator or malformed settings, fatal at construction
    #[error("Configuration error: {0}")]
    Config(String),

    // Null/empty required input, rejected before any I/O
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Crypto policy errors
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    // Docket/vote model errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // Peer or ledger unreachable
    #[error("Transport failure: {0}")]
    Transport(String),

    // Distributed store errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocketError {
    /// Whether a retry may succeed where this attempt failed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DocketError::Transport(_) | DocketError::Timeout(_) | DocketError::Storage(_)
        )
    }
}

/// Crypto policy violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Transaction carries no signatures")]
    NoSignatures,

    #[error("No signature uses an accepted algorithm (offered: {offered:?})")]
    UnacceptedAlgorithm { offered: Vec<String> },

    #[error("Strict policy requires one of {required:?}")]
    RequiredAlgorithmMissing { required: Vec<String> },

    #[error("Required algorithms not in accepted set: {missing:?}")]
    InvalidSubset { missing: Vec<String> },

    #[error("Transaction {transaction_id} does not carry a crypto policy update")]
    NotAPolicyUpdate { transaction_id: String },
}

/// Docket and vote invariant violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Vote targets stale docket hash: expected {expected}, got {actual}")]
    StaleVoteTarget { expected: String, actual: String },

    #[error("Vote is for docket {actual}, not {expected}")]
    WrongDocket { expected: String, actual: String },

    #[error("Validator {validator_id} already voted on this docket")]
    DuplicateVote { validator_id: String },

    #[error("Docket is already {status}")]
    DocketFinalized { status: String },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Docket {docket_number} requires a previous hash")]
    MissingPreviousHash { docket_number: u64 },

    #[error("Docket 0 must not carry a previous hash")]
    UnexpectedPreviousHash,

    #[error("Docket hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Required field is empty: {0}")]
    MissingField(&'static str),

    #[error("Too many transactions: {count} > {max}")]
    TooManyTransactions { count: usize, max: usize },

    #[error("Transaction {tx_id} appears more than once")]
    DuplicateTransaction { tx_id: String },
}

// Implement From for common external error types
impl From<serde_json::Error> for DocketError {
    fn from(err: serde_json::Error) -> Self {
        DocketError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for DocketError {
    fn from(err: bincode::Error) -> Self {
        DocketError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for DocketError {
    fn from(err: std::io::Error) -> Self {
        DocketError::Transport(err.to_string())
    }
}

impl From<anyhow::Error> for DocketError {
    fn from(err: anyhow::Error) -> Self {
        DocketError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DocketError::Model(ModelError::DuplicateVote {
            validator_id: "validator-7".to_string(),
        });
        assert!(err.to_string().contains("validator-7"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(DocketError::Transport("reset".into()).is_transient());
        assert!(DocketError::Timeout("write".into()).is_transient());
        assert!(!DocketError::InvalidArgument("docket".into()).is_transient());
        assert!(!DocketError::Policy(PolicyError::NoSignatures).is_transient());
    }
}
