//! Transactions carried inside dockets
//!
//! Regular transactions carry ordinary payload data and must satisfy the
//! crypto policy. Control and Genesis transactions are administrative and are
//! exempt from signature-policy checks; the exemption is decided on
//! [`TransactionType`] alone.

use serde::{Deserialize, Serialize};

use super::signature::Signature;
use crate::crypto::policy::CryptoPolicy;
use crate::error::{DocketError, PolicyError, Result};

/// Transaction discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Regular,
    Control,
    Genesis,
}

impl TransactionType {
    /// Whether crypto-policy signature validation is skipped
    pub fn is_policy_exempt(&self) -> bool {
        matches!(self, TransactionType::Control | TransactionType::Genesis)
    }
}

/// Administrative action encoded in a Control transaction's payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data")]
pub enum ControlAction {
    /// Replace the register's crypto policy
    CryptoPolicyUpdate(CryptoPolicy),
}

/// A transaction with its ordered signatures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction identifier
    pub id: String,
    /// Discriminator
    pub tx_type: TransactionType,
    /// Opaque payload bytes
    pub payload: Vec<u8>,
    /// Signatures in signing order
    pub signatures: Vec<Signature>,
}

impl Transaction {
    /// Create an unsigned transaction
    pub fn new(id: impl Into<String>, tx_type: TransactionType, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            tx_type,
            payload,
            signatures: Vec::new(),
        }
    }

    /// Create a Control transaction carrying an administrative action
    pub fn control(id: impl Into<String>, action: &ControlAction) -> Result<Self> {
        let payload = serde_json::to_vec(action)?;
        Ok(Self::new(id, TransactionType::Control, payload))
    }

    /// Append a signature
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    /// Decode the control action, if this is a Control transaction
    pub fn control_action(&self) -> Result<Option<ControlAction>> {
        if self.tx_type != TransactionType::Control {
            return Ok(None);
        }
        let action = serde_json::from_slice(&self.payload)?;
        Ok(Some(action))
    }

    /// Extract the crypto policy carried by a `CryptoPolicyUpdate` control action
    pub fn crypto_policy_update(&self) -> Result<CryptoPolicy> {
        match self.control_action()? {
            Some(ControlAction::CryptoPolicyUpdate(policy)) => Ok(policy),
            None => Err(DocketError::Policy(PolicyError::NotAPolicyUpdate {
                transaction_id: self.id.clone(),
            })),
        }
    }

    /// Content hash used as the transaction's merkle leaf
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[0x00]);
        hasher.update(&(self.id.len() as u64).to_le_bytes());
        hasher.update(self.id.as_bytes());
        hasher.update(&[self.tx_type as u8]);
        hasher.update(&(self.payload.len() as u64).to_le_bytes());
        hasher.update(&self.payload);
        for sig in &self.signatures {
            sig.hash_into(&mut hasher);
        }
        *hasher.finalize().as_bytes()
    }
}
