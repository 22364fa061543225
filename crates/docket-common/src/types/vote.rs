//! Consensus votes
//!
//! A vote is bound to the docket hash it was cast against. Votes on a stale
//! hash are discarded by [`Docket::add_vote`](super::docket::Docket::add_vote).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::docket::{Docket, DocketHash};
use super::signature::Signature;
use crate::error::ModelError;

/// Validator decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteDecision {
    Approve,
    Reject,
}

/// A validator's signed decision on one docket hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusVote {
    pub vote_id: Uuid,
    pub docket_id: String,
    pub validator_id: String,
    pub decision: VoteDecision,
    pub voted_at: DateTime<Utc>,
    /// Hash of the docket the vote was cast against
    pub docket_hash: DocketHash,
    pub validator_signature: Signature,
}

impl ConsensusVote {
    /// Cast a vote against the docket's current hash
    pub fn cast(
        docket: &Docket,
        validator_id: impl Into<String>,
        decision: VoteDecision,
        validator_signature: Signature,
    ) -> Self {
        Self {
            vote_id: Uuid::now_v7(),
            docket_id: docket.docket_id().to_string(),
            validator_id: validator_id.into(),
            decision,
            voted_at: Utc::now(),
            docket_hash: *docket.docket_hash(),
            validator_signature,
        }
    }

    /// Check the vote targets this docket at its current hash
    pub fn verify_target(&self, docket: &Docket) -> Result<(), ModelError> {
        if self.docket_id != docket.docket_id() {
            return Err(ModelError::WrongDocket {
                expected: docket.docket_id().to_string(),
                actual: self.docket_id.clone(),
            });
        }
        if &self.docket_hash != docket.docket_hash() {
            return Err(ModelError::StaleVoteTarget {
                expected: hex::encode(docket.docket_hash()),
                actual: hex::encode(self.docket_hash),
            });
        }
        if self.validator_id.is_empty() {
            return Err(ModelError::MissingField("validator_id"));
        }
        Ok(())
    }

    pub fn is_approval(&self) -> bool {
        self.decision == VoteDecision::Approve
    }
}
