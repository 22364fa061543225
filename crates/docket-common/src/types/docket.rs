//! Docket - a batch of transactions proposed for a register
//!
//! Lifecycle:
//! - Created by the proposer in `Proposed` state with its hash and merkle root
//! - Accumulates at most one vote per validator while `Proposed`
//! - Moves once to `Confirmed` or `Rejected`; both are terminal
//!
//! Fields are private so the only mutations are vote accumulation and the
//! status transition, both of which enforce the invariants above.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use super::signature::Signature;
use super::transaction::Transaction;
use super::vote::ConsensusVote;
use crate::crypto::merkle::{self, MerkleProof};
use crate::error::ModelError;

/// BLAKE3 docket hash
pub type DocketHash = [u8; 32];

/// Docket lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocketStatus {
    Proposed,
    Confirmed,
    Rejected,
}

impl DocketStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DocketStatus::Proposed)
    }
}

impl fmt::Display for DocketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocketStatus::Proposed => write!(f, "Proposed"),
            DocketStatus::Confirmed => write!(f, "Confirmed"),
            DocketStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Vote-count thresholds taken from the register's consensus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteThresholds {
    /// Approvals needed to confirm
    pub min: u32,
    /// Votes that count towards the decision; later votes are audit-only
    pub max: u32,
}

impl VoteThresholds {
    /// Create thresholds, raising `max` to `min` if it is lower
    pub fn new(min: u32, max: u32) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }
}

impl Default for VoteThresholds {
    fn default() -> Self {
        Self::new(
            crate::DEFAULT_SIGNATURE_THRESHOLD_MIN,
            crate::DEFAULT_SIGNATURE_THRESHOLD_MAX,
        )
    }
}

/// Vote counts for a docket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    /// Votes that count towards the decision
    pub counted: u32,
    pub approvals: u32,
    pub rejections: u32,
    /// Votes received beyond the max threshold
    pub audit_only: u32,
}

impl VoteTally {
    /// A majority of counted votes rejected the docket
    pub fn has_reject_majority(&self) -> bool {
        self.rejections * 2 > self.counted
    }

    /// Enough approvals and no conflicting reject majority
    pub fn is_confirmable(&self, thresholds: &VoteThresholds) -> bool {
        self.approvals >= thresholds.min && !self.has_reject_majority()
    }

    /// Rejections reached the threshold and form a majority
    pub fn is_rejectable(&self, thresholds: &VoteThresholds) -> bool {
        self.rejections >= thresholds.min && self.has_reject_majority()
    }

    /// Terminal status these votes justify, if any
    pub fn decision(&self, thresholds: &VoteThresholds) -> Option<DocketStatus> {
        if self.is_confirmable(thresholds) {
            Some(DocketStatus::Confirmed)
        } else if self.is_rejectable(thresholds) {
            Some(DocketStatus::Rejected)
        } else {
            None
        }
    }
}

/// Proposer-supplied fields for a new docket
#[derive(Debug, Clone)]
pub struct DocketDraft {
    pub register_id: String,
    pub docket_number: u64,
    /// Hash of the previous docket; `None` only for docket 0
    pub previous_hash: Option<DocketHash>,
    pub proposer_validator_id: String,
    pub transactions: Vec<Transaction>,
}

/// A batch of transactions for one register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Docket {
    docket_id: String,
    register_id: String,
    docket_number: u64,
    docket_hash: DocketHash,
    previous_hash: Option<DocketHash>,
    merkle_root: DocketHash,
    created_at: DateTime<Utc>,
    proposer_validator_id: String,
    proposer_signature: Option<Signature>,
    status: DocketStatus,
    transactions: Vec<Transaction>,
    /// Votes in arrival order, unique by validator id
    votes: Vec<ConsensusVote>,
}

impl Docket {
    /// Build a proposed docket, computing its merkle root and hash
    pub fn propose(draft: DocketDraft) -> Result<Self, ModelError> {
        if draft.register_id.is_empty() {
            return Err(ModelError::MissingField("register_id"));
        }
        if draft.proposer_validator_id.is_empty() {
            return Err(ModelError::MissingField("proposer_validator_id"));
        }
        check_chain_link(draft.docket_number, draft.previous_hash.as_ref())?;
        check_unique_transactions(&draft.transactions)?;

        let leaves: Vec<_> = draft.transactions.iter().map(Transaction::hash).collect();
        let mut docket = Self {
            docket_id: Uuid::now_v7().to_string(),
            register_id: draft.register_id,
            docket_number: draft.docket_number,
            docket_hash: [0u8; 32],
            previous_hash: draft.previous_hash,
            merkle_root: merkle::merkle_root(&leaves),
            created_at: Utc::now(),
            proposer_validator_id: draft.proposer_validator_id,
            proposer_signature: None,
            status: DocketStatus::Proposed,
            transactions: draft.transactions,
            votes: Vec::new(),
        };
        docket.docket_hash = docket.compute_hash();
        Ok(docket)
    }

    /// Build a proposed docket, rejecting drafts over the transaction limit
    pub fn propose_bounded(draft: DocketDraft, max_transactions: usize) -> Result<Self, ModelError> {
        if draft.transactions.len() > max_transactions {
            return Err(ModelError::TooManyTransactions {
                count: draft.transactions.len(),
                max: max_transactions,
            });
        }
        Self::propose(draft)
    }

    /// Attach the proposer's signature over the docket hash
    pub fn with_proposer_signature(mut self, signature: Signature) -> Self {
        self.proposer_signature = Some(signature);
        self
    }

    /// Compute the docket hash from its header fields
    pub fn compute_hash(&self) -> DocketHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.docket_id.as_bytes());
        hasher.update(&[0xff]);
        hasher.update(self.register_id.as_bytes());
        hasher.update(&[0xff]);
        hasher.update(&self.docket_number.to_le_bytes());
        match &self.previous_hash {
            Some(prev) => {
                hasher.update(&[1]);
                hasher.update(prev);
            }
            None => {
                hasher.update(&[0]);
            }
        }
        // The merkle tree pairs an odd node with itself; committing to the
        // count keeps [a, b, c] and [a, b, c, c] apart
        hasher.update(&(self.transactions.len() as u64).to_le_bytes());
        hasher.update(&self.merkle_root);
        hasher.update(&self.created_at.timestamp_millis().to_le_bytes());
        hasher.update(self.proposer_validator_id.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Re-check structural invariants, e.g. after decoding from a peer
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.docket_id.is_empty() {
            return Err(ModelError::MissingField("docket_id"));
        }
        if self.register_id.is_empty() {
            return Err(ModelError::MissingField("register_id"));
        }
        check_chain_link(self.docket_number, self.previous_hash.as_ref())?;

        let leaves: Vec<_> = self.transactions.iter().map(Transaction::hash).collect();
        let root = merkle::merkle_root(&leaves);
        if root != self.merkle_root {
            return Err(ModelError::HashMismatch {
                expected: hex::encode(root),
                actual: hex::encode(self.merkle_root),
            });
        }

        let hash = self.compute_hash();
        if hash != self.docket_hash {
            return Err(ModelError::HashMismatch {
                expected: hex::encode(hash),
                actual: hex::encode(self.docket_hash),
            });
        }
        check_unique_transactions(&self.transactions)?;

        for (i, vote) in self.votes.iter().enumerate() {
            vote.verify_target(self)?;
            if self.votes[..i].iter().any(|v| v.validator_id == vote.validator_id) {
                return Err(ModelError::DuplicateVote {
                    validator_id: vote.validator_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Record a vote.
    ///
    /// Rejected votes leave the docket untouched.
    pub fn add_vote(&mut self, vote: ConsensusVote) -> Result<(), ModelError> {
        if self.status.is_terminal() {
            return Err(ModelError::DocketFinalized {
                status: self.status.to_string(),
            });
        }
        vote.verify_target(self)?;
        if self.votes.iter().any(|v| v.validator_id == vote.validator_id) {
            return Err(ModelError::DuplicateVote {
                validator_id: vote.validator_id,
            });
        }
        self.votes.push(vote);
        Ok(())
    }

    /// Count votes; only the first `thresholds.max` arrivals are decisive
    pub fn tally(&self, thresholds: &VoteThresholds) -> VoteTally {
        let mut tally = VoteTally::default();
        for (i, vote) in self.votes.iter().enumerate() {
            if i as u32 >= thresholds.max {
                tally.audit_only += 1;
                continue;
            }
            tally.counted += 1;
            if vote.is_approval() {
                tally.approvals += 1;
            } else {
                tally.rejections += 1;
            }
        }
        tally
    }

    /// Apply the decision justified by the current votes, if any
    pub fn finalize(&mut self, thresholds: &VoteThresholds) -> Result<DocketStatus, ModelError> {
        if self.status.is_terminal() {
            return Ok(self.status);
        }
        match self.tally(thresholds).decision(thresholds) {
            Some(DocketStatus::Confirmed) => self.confirm()?,
            Some(DocketStatus::Rejected) => self.reject()?,
            _ => {}
        }
        Ok(self.status)
    }

    /// Proposed -> Confirmed
    pub fn confirm(&mut self) -> Result<(), ModelError> {
        self.transition(DocketStatus::Confirmed)
    }

    /// Proposed -> Rejected
    pub fn reject(&mut self) -> Result<(), ModelError> {
        self.transition(DocketStatus::Rejected)
    }

    fn transition(&mut self, to: DocketStatus) -> Result<(), ModelError> {
        if self.status != DocketStatus::Proposed || !to.is_terminal() {
            return Err(ModelError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// Inclusion proof for the transaction at `index`
    pub fn transaction_proof(&self, index: usize) -> Option<MerkleProof> {
        let leaves: Vec<_> = self.transactions.iter().map(Transaction::hash).collect();
        merkle::generate_proof(&leaves, index)
    }

    pub fn docket_id(&self) -> &str {
        &self.docket_id
    }

    pub fn register_id(&self) -> &str {
        &self.register_id
    }

    pub fn docket_number(&self) -> u64 {
        self.docket_number
    }

    pub fn docket_hash(&self) -> &DocketHash {
        &self.docket_hash
    }

    pub fn previous_hash(&self) -> Option<&DocketHash> {
        self.previous_hash.as_ref()
    }

    pub fn merkle_root(&self) -> &DocketHash {
        &self.merkle_root
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn proposer_validator_id(&self) -> &str {
        &self.proposer_validator_id
    }

    pub fn proposer_signature(&self) -> Option<&Signature> {
        self.proposer_signature.as_ref()
    }

    pub fn status(&self) -> DocketStatus {
        self.status
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn votes(&self) -> &[ConsensusVote] {
        &self.votes
    }

    /// The vote cast by a validator, if any
    pub fn vote_for(&self, validator_id: &str) -> Option<&ConsensusVote> {
        self.votes.iter().find(|v| v.validator_id == validator_id)
    }
}

fn check_chain_link(docket_number: u64, previous_hash: Option<&DocketHash>) -> Result<(), ModelError> {
    match (docket_number, previous_hash) {
        (0, Some(_)) => Err(ModelError::UnexpectedPreviousHash),
        (n, None) if n > 0 => Err(ModelError::MissingPreviousHash { docket_number: n }),
        _ => Ok(()),
    }
}

fn check_unique_transactions(transactions: &[Transaction]) -> Result<(), ModelError> {
    let mut seen = HashSet::with_capacity(transactions.len());
    for tx in transactions {
        if !seen.insert(tx.id.as_str()) {
            return Err(ModelError::DuplicateTransaction {
                tx_id: tx.id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::TransactionType;
    use crate::types::vote::VoteDecision;

    fn draft(number: u64, previous_hash: Option<DocketHash>) -> DocketDraft {
        DocketDraft {
            register_id: "register-1".to_string(),
            docket_number: number,
            previous_hash,
            proposer_validator_id: "validator-0".to_string(),
            transactions: vec![
                Transaction::new("tx-1", TransactionType::Regular, b"a".to_vec()),
                Transaction::new("tx-2", TransactionType::Regular, b"b".to_vec()),
            ],
        }
    }

    fn sig() -> Signature {
        Signature::new(vec![1u8; 32], vec![2u8; 64], "ED25519")
    }

    fn vote(docket: &Docket, validator: &str, decision: VoteDecision) -> ConsensusVote {
        ConsensusVote::cast(docket, validator, decision, sig())
    }

    #[test]
    fn test_propose_genesis_docket() {
        let docket = Docket::propose(draft(0, None)).unwrap();
        assert_eq!(docket.status(), DocketStatus::Proposed);
        assert_eq!(docket.docket_hash(), &docket.compute_hash());
        assert!(docket.previous_hash().is_none());
        assert!(docket.validate().is_ok());
    }

    #[test]
    fn test_chain_link_rules() {
        assert_eq!(
            Docket::propose(draft(3, None)).unwrap_err(),
            ModelError::MissingPreviousHash { docket_number: 3 }
        );
        assert_eq!(
            Docket::propose(draft(0, Some([1u8; 32]))).unwrap_err(),
            ModelError::UnexpectedPreviousHash
        );
        assert!(Docket::propose(draft(3, Some([1u8; 32]))).is_ok());
    }

    #[test]
    fn test_transaction_limit() {
        assert!(matches!(
            Docket::propose_bounded(draft(0, None), 1),
            Err(ModelError::TooManyTransactions { count: 2, max: 1 })
        ));
        assert!(Docket::propose_bounded(draft(0, None), 2).is_ok());
    }

    #[test]
    fn test_stale_vote_rejected_without_mutation() {
        let mut docket = Docket::propose(draft(0, None)).unwrap();
        let mut stale = vote(&docket, "validator-1", VoteDecision::Approve);
        stale.docket_hash = [9u8; 32];

        let err = docket.add_vote(stale).unwrap_err();
        assert!(matches!(err, ModelError::StaleVoteTarget { .. }));
        assert!(docket.votes().is_empty());
    }

    #[test]
    fn test_one_vote_per_validator() {
        let mut docket = Docket::propose(draft(0, None)).unwrap();
        docket.add_vote(vote(&docket, "validator-1", VoteDecision::Approve)).unwrap();

        let err = docket
            .add_vote(vote(&docket, "validator-1", VoteDecision::Reject))
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateVote { .. }));
        assert_eq!(docket.votes().len(), 1);
        assert!(docket.vote_for("validator-1").unwrap().is_approval());
    }

    #[test]
    fn test_confirmation_threshold() {
        let thresholds = VoteThresholds::new(2, 4);
        let mut docket = Docket::propose(draft(0, None)).unwrap();

        docket.add_vote(vote(&docket, "v1", VoteDecision::Approve)).unwrap();
        assert_eq!(docket.finalize(&thresholds).unwrap(), DocketStatus::Proposed);

        docket.add_vote(vote(&docket, "v2", VoteDecision::Approve)).unwrap();
        assert_eq!(docket.finalize(&thresholds).unwrap(), DocketStatus::Confirmed);

        // Terminal: no further votes
        let err = docket.add_vote(vote(&docket, "v3", VoteDecision::Approve)).unwrap_err();
        assert!(matches!(err, ModelError::DocketFinalized { .. }));
    }

    #[test]
    fn test_reject_majority_blocks_confirmation() {
        let thresholds = VoteThresholds::new(2, 10);
        let mut docket = Docket::propose(draft(0, None)).unwrap();
        for (id, decision) in [
            ("v1", VoteDecision::Approve),
            ("v2", VoteDecision::Approve),
            ("v3", VoteDecision::Reject),
            ("v4", VoteDecision::Reject),
            ("v5", VoteDecision::Reject),
        ] {
            docket.add_vote(vote(&docket, id, decision)).unwrap();
        }

        let tally = docket.tally(&thresholds);
        assert_eq!(tally.approvals, 2);
        assert!(tally.has_reject_majority());
        assert!(!tally.is_confirmable(&thresholds));
        assert_eq!(docket.finalize(&thresholds).unwrap(), DocketStatus::Rejected);
    }

    #[test]
    fn test_votes_beyond_max_are_audit_only() {
        let thresholds = VoteThresholds::new(2, 3);
        let mut docket = Docket::propose(draft(0, None)).unwrap();
        for (id, decision) in [
            ("v1", VoteDecision::Reject),
            ("v2", VoteDecision::Approve),
            ("v3", VoteDecision::Reject),
            ("v4", VoteDecision::Approve),
            ("v5", VoteDecision::Approve),
        ] {
            docket.add_vote(vote(&docket, id, decision)).unwrap();
        }

        let tally = docket.tally(&thresholds);
        assert_eq!(tally.counted, 3);
        assert_eq!(tally.audit_only, 2);
        assert_eq!(tally.approvals, 1);
        assert_eq!(docket.votes().len(), 5);
        assert_eq!(tally.decision(&thresholds), Some(DocketStatus::Rejected));
    }

    #[test]
    fn test_transitions_are_one_directional() {
        let mut docket = Docket::propose(draft(0, None)).unwrap();
        docket.reject().unwrap();
        assert!(matches!(
            docket.confirm(),
            Err(ModelError::InvalidTransition { .. })
        ));
        assert_eq!(docket.status(), DocketStatus::Rejected);
    }

    #[test]
    fn test_validate_detects_tampering() {
        let docket = Docket::propose(draft(0, None)).unwrap();
        let mut tampered = docket.clone();
        tampered.transactions.pop();
        assert!(matches!(
            tampered.validate(),
            Err(ModelError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_repeated_last_transaction_detected() {
        let mut odd = draft(0, None);
        odd.transactions
            .push(Transaction::new("tx-3", TransactionType::Regular, b"c".to_vec()));
        let docket = Docket::propose(odd).unwrap();

        let mut tampered = docket.clone();
        let last = tampered.transactions[2].clone();
        tampered.transactions.push(last);

        // Same merkle root, different docket hash
        let leaves: Vec<_> = tampered.transactions.iter().map(Transaction::hash).collect();
        assert_eq!(&merkle::merkle_root(&leaves), docket.merkle_root());
        assert_ne!(tampered.compute_hash(), *docket.docket_hash());
        assert!(matches!(
            tampered.validate(),
            Err(ModelError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_duplicate_transactions_rejected() {
        let mut repeated = draft(0, None);
        let first = repeated.transactions[0].clone();
        repeated.transactions.push(first);
        assert!(matches!(
            Docket::propose(repeated),
            Err(ModelError::DuplicateTransaction { tx_id }) if tx_id == "tx-1"
        ));
    }

    #[test]
    fn test_transaction_inclusion_proof() {
        let docket = Docket::propose(draft(0, None)).unwrap();
        let proof = docket.transaction_proof(1).unwrap();
        assert_eq!(&proof.root, docket.merkle_root());
        assert!(proof.verify(&docket.transactions()[1].hash()));
    }
}
