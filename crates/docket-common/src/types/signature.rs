//! Signature record
//!
//! The core never creates or checks signature bytes itself; wallets and HSMs
//! do. It only carries them and inspects the algorithm tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::algorithms::{canonical_name, SignatureAlgorithm};

/// Immutable signature over a transaction, docket, or vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    public_key: Vec<u8>,
    signature_value: Vec<u8>,
    algorithm: String,
    signed_at: DateTime<Utc>,
}

impl Signature {
    /// Create a signature stamped with the current time
    pub fn new(
        public_key: impl Into<Vec<u8>>,
        signature_value: impl Into<Vec<u8>>,
        algorithm: impl Into<String>,
    ) -> Self {
        Self::with_timestamp(public_key, signature_value, algorithm, Utc::now())
    }

    /// Create a signature with an explicit signing time
    pub fn with_timestamp(
        public_key: impl Into<Vec<u8>>,
        signature_value: impl Into<Vec<u8>>,
        algorithm: impl Into<String>,
        signed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            signature_value: signature_value.into(),
            algorithm: algorithm.into(),
            signed_at,
        }
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }

    /// Algorithm name as supplied by the signer
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Algorithm name normalized for policy comparisons
    pub fn canonical_algorithm(&self) -> String {
        canonical_name(&self.algorithm)
    }

    /// Registry entry for the algorithm, if recognized
    pub fn recognized_algorithm(&self) -> Option<SignatureAlgorithm> {
        SignatureAlgorithm::from_name(&self.algorithm)
    }

    pub fn signed_at(&self) -> DateTime<Utc> {
        self.signed_at
    }

    /// Feed the signature into a hasher
    pub(crate) fn hash_into(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&(self.public_key.len() as u64).to_le_bytes());
        hasher.update(&self.public_key);
        hasher.update(&(self.signature_value.len() as u64).to_le_bytes());
        hasher.update(&self.signature_value);
        hasher.update(self.canonical_algorithm().as_bytes());
        hasher.update(&self.signed_at.timestamp_millis().to_le_bytes());
    }
}
