//! Collaborator ports
//!
//! The distributor never talks to the network directly. Implementations of
//! these traits own discovery, transport and persistence.

use async_trait::async_trait;
use bytes::Bytes;
use docket_common::{Docket, Result};
use serde::{Deserialize, Serialize};

/// A validator reachable for a register
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatorEndpoint {
    pub validator_id: String,
    pub address: String,
}

impl ValidatorEndpoint {
    pub fn new(validator_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            validator_id: validator_id.into(),
            address: address.into(),
        }
    }
}

/// A serialized docket with the identifiers needed for routing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocketPayload {
    pub docket_id: String,
    pub register_id: String,
    pub docket_number: u64,
    pub bytes: Bytes,
}

/// Outcome of one fan-out call, one entry per addressed peer
pub type PeerResults = Vec<(ValidatorEndpoint, Result<()>)>;

/// Peer discovery and fan-out transport
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Validators currently known for a register
    async fn query_validators(&self, register_id: &str) -> Result<Vec<ValidatorEndpoint>>;

    /// Send a proposed docket to every listed peer concurrently.
    ///
    /// Peers missing from the returned results count as not reached.
    async fn publish_proposed_docket(
        &self,
        peers: &[ValidatorEndpoint],
        payload: DocketPayload,
    ) -> PeerResults;

    /// Send a confirmed docket to every listed peer concurrently
    async fn broadcast_confirmed_docket(
        &self,
        peers: &[ValidatorEndpoint],
        payload: DocketPayload,
    ) -> PeerResults;
}

/// Ledger persistence
#[async_trait]
pub trait RegisterClient: Send + Sync {
    /// Write a confirmed docket; `Ok(false)` means the ledger rejected it
    async fn write_docket(&self, payload: DocketPayload) -> Result<bool>;
}

/// Binary encoding of dockets handed to peers and the ledger
pub trait DocketSerializer: Send + Sync {
    fn serialize(&self, docket: &Docket) -> Result<Bytes>;

    /// Decode and re-check structural invariants
    fn deserialize(&self, bytes: &[u8]) -> Result<Docket>;

    fn payload(&self, docket: &Docket) -> Result<DocketPayload> {
        Ok(DocketPayload {
            docket_id: docket.docket_id().to_string(),
            register_id: docket.register_id().to_string(),
            docket_number: docket.docket_number(),
            bytes: self.serialize(docket)?,
        })
    }
}

/// Default serializer using bincode
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeDocketSerializer;

impl DocketSerializer for BincodeDocketSerializer {
    fn serialize(&self, docket: &Docket) -> Result<Bytes> {
        Ok(Bytes::from(bincode::serialize(docket)?))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Docket> {
        let docket: Docket = bincode::deserialize(bytes)?;
        docket.validate()?;
        Ok(docket)
    }
}
