//! Crypto policy and hashing
//!
//! This module provides:
//! - The registry of recognized signature algorithms (classical and post-quantum)
//! - Versioned crypto policy enforcement for transactions and votes
//! - BLAKE3 merkle roots over docket transactions

pub mod algorithms;
pub mod merkle;
pub mod policy;

pub use algorithms::{canonical_name, is_recognized_algorithm, SignatureAlgorithm};
pub use merkle::{merkle_root, MerkleProof, HASH_SIZE};
pub use policy::{CryptoPolicy, CryptoPolicyEngine, EnforcementMode, PolicyUpdateOutcome};
