//! Prometheus metrics for the distributor

use docket_common::{DocketError, Result};
use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

/// Prometheus collectors mirroring the distributor's counters
pub struct DistributorMetrics {
    pub proposed_broadcasts_total: IntCounter,
    pub confirmed_broadcasts_total: IntCounter,
    pub peers_reached_total: IntCounter,
    pub broadcast_retries_total: IntCounter,
    pub register_submissions_total: IntCounter,
    pub register_submissions_failed_total: IntCounter,
    pub broadcast_duration_seconds: Histogram,
}

impl DistributorMetrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            proposed_broadcasts_total: IntCounter::new(
                "docket_proposed_broadcasts_total",
                "Total proposed docket broadcasts",
            )
            .map_err(metric_error)?,
            confirmed_broadcasts_total: IntCounter::new(
                "docket_confirmed_broadcasts_total",
                "Total confirmed docket broadcasts",
            )
            .map_err(metric_error)?,
            peers_reached_total: IntCounter::new(
                "docket_broadcast_peers_reached_total",
                "Total peers addressed by successful broadcasts",
            )
            .map_err(metric_error)?,
            broadcast_retries_total: IntCounter::new(
                "docket_broadcast_retries_total",
                "Total retried publish and submission attempts",
            )
            .map_err(metric_error)?,
            register_submissions_total: IntCounter::new(
                "docket_register_submissions_total",
                "Total docket submissions to the register service",
            )
            .map_err(metric_error)?,
            register_submissions_failed_total: IntCounter::new(
                "docket_register_submissions_failed_total",
                "Total failed docket submissions",
            )
            .map_err(metric_error)?,
            broadcast_duration_seconds: Histogram::with_opts(
                HistogramOpts::new(
                    "docket_broadcast_duration_seconds",
                    "Broadcast duration including discovery and retries",
                )
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            )
            .map_err(metric_error)?,
        })
    }

    /// Register every collector on `registry`
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry
            .register(Box::new(self.proposed_broadcasts_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.confirmed_broadcasts_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.peers_reached_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.broadcast_retries_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.register_submissions_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.register_submissions_failed_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.broadcast_duration_seconds.clone()))
            .map_err(metric_error)?;
        Ok(())
    }
}

fn metric_error(e: prometheus::Error) -> DocketError {
    DocketError::Internal(format!("metrics: {}", e))
}
