//! Docket, transaction, vote, and signature model

pub mod docket;
pub mod signature;
pub mod transaction;
pub mod vote;
