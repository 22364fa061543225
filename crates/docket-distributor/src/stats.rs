//! Operational counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of the distributor's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributorStats {
    pub total_proposed_broadcasts: u64,
    pub total_confirmed_broadcasts: u64,
    pub total_register_submissions: u64,
    pub failed_register_submissions: u64,
}

#[derive(Debug, Default)]
pub(crate) struct DistributorCounters {
    proposed_broadcasts: AtomicU64,
    confirmed_broadcasts: AtomicU64,
    register_submissions: AtomicU64,
    failed_register_submissions: AtomicU64,
}

impl DistributorCounters {
    pub fn record_proposed_broadcast(&self) {
        self.proposed_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_confirmed_broadcast(&self) {
        self.confirmed_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_submission(&self) {
        self.register_submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_submission(&self) {
        self.failed_register_submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DistributorStats {
        DistributorStats {
            total_proposed_broadcasts: self.proposed_broadcasts.load(Ordering::Relaxed),
            total_confirmed_broadcasts: self.confirmed_broadcasts.load(Ordering::Relaxed),
            total_register_submissions: self.register_submissions.load(Ordering::Relaxed),
            failed_register_submissions: self.failed_register_submissions.load(Ordering::Relaxed),
        }
    }
}
