//! # Docket Distributor
//!
//! Moves dockets between validators and onto the ledger:
//! - Broadcasts proposed dockets to the register's validators
//! - Broadcasts confirmed dockets and submits them to the register service
//! - Keeps exact operational counters
//!
//! Peer discovery, the network transport and ledger persistence sit behind
//! the [`PeerClient`] and [`RegisterClient`] ports. Dockets are serialized once
//! per operation by a [`DocketSerializer`] and handed over as opaque bytes.

pub mod config;
pub mod distributor;
pub mod metrics;
pub mod ports;
pub mod stats;

pub use config::DistributorConfig;
pub use distributor::{ConfirmationOutcome, DocketDistributor, DocketDistributorBuilder};
pub use metrics::DistributorMetrics;
pub use ports::{
    BincodeDocketSerializer, DocketPayload, DocketSerializer, PeerClient, PeerResults,
    RegisterClient, ValidatorEndpoint,
};
pub use stats::DistributorStats;
