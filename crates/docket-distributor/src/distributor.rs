//! Docket distribution
//!
//! Broadcasts are bounded by `broadcast_timeout` as a whole-operation
//! deadline and report how many peers acknowledged the docket. Transient
//! failures are retried for the failing peers only; a peer that exhausts its
//! retries or misses the deadline is left out of the count but never fails
//! the call. Ledger submissions collapse every failure to `false` after
//! logging the reason.

use std::sync::Arc;
use std::time::Duration;

use docket_common::{Docket, DocketError, DocketStatus, Result};
use rand::Rng;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::DistributorConfig;
use crate::metrics::DistributorMetrics;
use crate::ports::{
    BincodeDocketSerializer, DocketPayload, DocketSerializer, PeerClient, PeerResults,
    RegisterClient, ValidatorEndpoint,
};
use crate::stats::{DistributorCounters, DistributorStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BroadcastKind {
    Proposed,
    Confirmed,
}

impl BroadcastKind {
    fn as_str(&self) -> &'static str {
        match self {
            BroadcastKind::Proposed => "proposed",
            BroadcastKind::Confirmed => "confirmed",
        }
    }
}

/// Why a ledger submission did not succeed
#[derive(Debug, Clone, thiserror::Error)]
enum SubmissionFailure {
    #[error("invalid docket: {0}")]
    InvalidDocket(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("rejected by the register service")]
    Rejected,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

impl SubmissionFailure {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubmissionFailure::Transport(_) | SubmissionFailure::TimedOut(_)
        )
    }
}

/// Result of handling a confirmed docket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationOutcome {
    /// Peers that acknowledged the confirmed broadcast
    pub peers_reached: usize,
    /// Ledger outcome; `None` when automatic submission is disabled
    pub submitted: Option<bool>,
}

/// Fans dockets out to peer validators and submits them to the ledger
pub struct DocketDistributor {
    config: DistributorConfig,
    peer_client: Arc<dyn PeerClient>,
    register_client: Arc<dyn RegisterClient>,
    serializer: Arc<dyn DocketSerializer>,
    counters: DistributorCounters,
    metrics: Option<Arc<DistributorMetrics>>,
}

/// Builder for [`DocketDistributor`]
#[derive(Default)]
pub struct DocketDistributorBuilder {
    config: Option<DistributorConfig>,
    peer_client: Option<Arc<dyn PeerClient>>,
    register_client: Option<Arc<dyn RegisterClient>>,
    serializer: Option<Arc<dyn DocketSerializer>>,
    metrics: Option<Arc<DistributorMetrics>>,
}

impl DocketDistributorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: DistributorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn peer_client(mut self, client: Arc<dyn PeerClient>) -> Self {
        self.peer_client = Some(client);
        self
    }

    pub fn register_client(mut self, client: Arc<dyn RegisterClient>) -> Self {
        self.register_client = Some(client);
        self
    }

    /// Override the default bincode serializer
    pub fn serializer(mut self, serializer: Arc<dyn DocketSerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn metrics(mut self, metrics: Arc<DistributorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the distributor; every collaborator except the serializer is required
    pub fn build(self) -> Result<DocketDistributor> {
        let config = self
            .config
            .ok_or_else(|| DocketError::Config("distributor configuration is required".to_string()))?;
        config.validate()?;
        let peer_client = self
            .peer_client
            .ok_or_else(|| DocketError::Config("peer client is required".to_string()))?;
        let register_client = self
            .register_client
            .ok_or_else(|| DocketError::Config("register client is required".to_string()))?;

        Ok(DocketDistributor {
            config,
            peer_client,
            register_client,
            serializer: self
                .serializer
                .unwrap_or_else(|| Arc::new(BincodeDocketSerializer)),
            counters: DistributorCounters::default(),
            metrics: self.metrics,
        })
    }
}

impl DocketDistributor {
    pub fn builder() -> DocketDistributorBuilder {
        DocketDistributorBuilder::new()
    }

    pub fn config(&self) -> &DistributorConfig {
        &self.config
    }

    /// Send a proposed docket to the register's validators.
    ///
    /// Returns the number of peers that acknowledged it.
    #[instrument(skip(self, docket), fields(docket_id = %docket.docket_id(), register_id = %docket.register_id()))]
    pub async fn broadcast_proposed_docket(&self, docket: &Docket) -> Result<usize> {
        self.broadcast(BroadcastKind::Proposed, docket).await
    }

    /// Send a confirmed docket to the register's validators.
    ///
    /// Returns the number of peers that acknowledged it.
    #[instrument(skip(self, docket), fields(docket_id = %docket.docket_id(), register_id = %docket.register_id()))]
    pub async fn broadcast_confirmed_docket(&self, docket: &Docket) -> Result<usize> {
        self.broadcast(BroadcastKind::Confirmed, docket).await
    }

    /// Write a docket to the register service; `true` only on acknowledgement
    #[instrument(skip(self, docket), fields(docket_id = %docket.docket_id()))]
    pub async fn submit_to_register_service(&self, docket: &Docket) -> bool {
        self.counters.record_submission();
        if let Some(metrics) = &self.metrics {
            metrics.register_submissions_total.inc();
        }

        match self.submit(docket).await {
            Ok(()) => {
                info!(docket_number = docket.docket_number(), "Docket written to register");
                true
            }
            Err(failure) => {
                self.counters.record_failed_submission();
                if let Some(metrics) = &self.metrics {
                    metrics.register_submissions_failed_total.inc();
                }
                warn!(reason = %failure, "Register submission failed");
                false
            }
        }
    }

    /// Broadcast a confirmed docket, then submit it if configured to
    #[instrument(skip(self, docket), fields(docket_id = %docket.docket_id()))]
    pub async fn on_docket_confirmed(&self, docket: &Docket) -> Result<ConfirmationOutcome> {
        if docket.status() != DocketStatus::Confirmed {
            return Err(DocketError::InvalidArgument(format!(
                "docket {} is {}, not confirmed",
                docket.docket_id(),
                docket.status()
            )));
        }

        let peers_reached = self.broadcast_confirmed_docket(docket).await?;
        let submitted = if self.config.auto_submit_to_register {
            Some(self.submit_to_register_service(docket).await)
        } else {
            None
        };

        Ok(ConfirmationOutcome {
            peers_reached,
            submitted,
        })
    }

    pub fn stats(&self) -> DistributorStats {
        self.counters.snapshot()
    }

    async fn broadcast(&self, kind: BroadcastKind, docket: &Docket) -> Result<usize> {
        require_docket(docket)?;

        match kind {
            BroadcastKind::Proposed => self.counters.record_proposed_broadcast(),
            BroadcastKind::Confirmed => self.counters.record_confirmed_broadcast(),
        }
        if let Some(metrics) = &self.metrics {
            match kind {
                BroadcastKind::Proposed => metrics.proposed_broadcasts_total.inc(),
                BroadcastKind::Confirmed => metrics.confirmed_broadcasts_total.inc(),
            }
        }

        let payload = self.serializer.payload(docket)?;

        let started = Instant::now();
        let deadline = self.config.broadcast_timeout;
        let mut reached = 0usize;
        if timeout(deadline, self.fan_out(kind, docket, payload, &mut reached))
            .await
            .is_err()
        {
            warn!(kind = kind.as_str(), ?deadline, reached, "Broadcast deadline reached");
        }

        if let Some(metrics) = &self.metrics {
            metrics
                .broadcast_duration_seconds
                .observe(started.elapsed().as_secs_f64());
            metrics.peers_reached_total.inc_by(reached as u64);
        }
        Ok(reached)
    }

    /// Publish to every peer, retrying only the peers that failed transiently.
    ///
    /// `reached` is updated as acknowledgements arrive so a caller that stops
    /// waiting still sees the partial count.
    async fn fan_out(
        &self,
        kind: BroadcastKind,
        docket: &Docket,
        payload: DocketPayload,
        reached: &mut usize,
    ) {
        let peers = match self.peer_client.query_validators(docket.register_id()).await {
            Ok(peers) => peers,
            Err(e) => {
                warn!(kind = kind.as_str(), error = %e, "Validator discovery failed");
                return;
            }
        };

        if peers.is_empty() {
            debug!(kind = kind.as_str(), "No validators known for register");
            return;
        }

        let mut pending = peers;
        let mut attempt = 0u32;
        loop {
            let mut retry = Vec::new();
            for (peer, result) in self.publish(kind, &pending, payload.clone()).await {
                match result {
                    Ok(()) => *reached += 1,
                    Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                        debug!(kind = kind.as_str(), validator_id = %peer.validator_id, attempt, error = %e, "Publish failed, will retry");
                        retry.push(peer);
                    }
                    Err(e) => {
                        warn!(kind = kind.as_str(), validator_id = %peer.validator_id, attempt, error = %e, "Publish failed, giving up on peer");
                    }
                }
            }

            if retry.is_empty() {
                debug!(kind = kind.as_str(), reached = *reached, attempt, "Broadcast finished");
                return;
            }

            self.record_retry();
            sleep(self.backoff(attempt)).await;
            attempt += 1;
            pending = retry;
        }
    }

    async fn publish(
        &self,
        kind: BroadcastKind,
        peers: &[ValidatorEndpoint],
        payload: DocketPayload,
    ) -> PeerResults {
        match kind {
            BroadcastKind::Proposed => self.peer_client.publish_proposed_docket(peers, payload).await,
            BroadcastKind::Confirmed => {
                self.peer_client
                    .broadcast_confirmed_docket(peers, payload)
                    .await
            }
        }
    }

    async fn submit(&self, docket: &Docket) -> std::result::Result<(), SubmissionFailure> {
        require_docket(docket).map_err(|e| SubmissionFailure::InvalidDocket(e.to_string()))?;
        let payload = self
            .serializer
            .payload(docket)
            .map_err(|e| SubmissionFailure::Serialization(e.to_string()))?;

        let mut attempt = 0u32;
        loop {
            let failure = match self.write_once(payload.clone()).await {
                Ok(()) => return Ok(()),
                Err(failure) => failure,
            };

            if !failure.is_retryable() || attempt >= self.config.max_retries {
                return Err(failure);
            }

            warn!(attempt, reason = %failure, "Register write failed, retrying");
            self.record_retry();
            sleep(self.backoff(attempt)).await;
            attempt += 1;
        }
    }

    async fn write_once(&self, payload: DocketPayload) -> std::result::Result<(), SubmissionFailure> {
        let deadline = self.config.broadcast_timeout;
        match timeout(deadline, self.register_client.write_docket(payload)).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(SubmissionFailure::Rejected),
            Ok(Err(e)) => Err(SubmissionFailure::Transport(e.to_string())),
            Err(_) => Err(SubmissionFailure::TimedOut(deadline)),
        }
    }

    /// Exponential backoff with up to 50% jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .config
            .retry_backoff
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.config.broadcast_timeout);
        let jitter_ms = (base.as_millis() / 2) as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    fn record_retry(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.broadcast_retries_total.inc();
        }
    }
}

fn require_docket(docket: &Docket) -> Result<()> {
    if docket.docket_id().is_empty() || docket.register_id().is_empty() {
        return Err(DocketError::InvalidArgument(
            "docket must have a docket id and register id".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docket_common::{
        ConsensusVote, DocketDraft, Signature, Transaction, TransactionType, VoteDecision,
        VoteThresholds,
    };
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingPeerClient {
        peers: Vec<ValidatorEndpoint>,
        proposed_calls: AtomicUsize,
        confirmed_calls: AtomicUsize,
        transient_failures: AtomicU32,
        fail_permanently: bool,
        hang: bool,
        fail_discovery: bool,
        unreachable: HashSet<String>,
        call_sizes: Mutex<Vec<usize>>,
        last_payload: Mutex<Option<DocketPayload>>,
    }

    impl CountingPeerClient {
        fn with_peers(count: usize) -> Self {
            Self {
                peers: (0..count)
                    .map(|i| ValidatorEndpoint::new(format!("validator-{}", i), format!("10.0.0.{}:7000", i)))
                    .collect(),
                ..Default::default()
            }
        }

        async fn deliver(&self, peers: &[ValidatorEndpoint], payload: DocketPayload) -> PeerResults {
            self.call_sizes.lock().push(peers.len());
            if self.hang {
                std::future::pending::<()>().await;
            }
            // One pending transient failure takes down the whole call
            let remaining = self.transient_failures.load(Ordering::SeqCst);
            let flaky = remaining > 0;
            if flaky {
                self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            }
            *self.last_payload.lock() = Some(payload);

            peers
                .iter()
                .map(|peer| {
                    let result = if self.fail_permanently {
                        Err(DocketError::InvalidArgument("peer refused payload".to_string()))
                    } else if flaky || self.unreachable.contains(&peer.validator_id) {
                        Err(DocketError::Transport("connection reset".to_string()))
                    } else {
                        Ok(())
                    };
                    (peer.clone(), result)
                })
                .collect()
        }
    }

    #[async_trait]
    impl PeerClient for CountingPeerClient {
        async fn query_validators(&self, _register_id: &str) -> Result<Vec<ValidatorEndpoint>> {
            if self.fail_discovery {
                return Err(DocketError::Transport("discovery unavailable".to_string()));
            }
            Ok(self.peers.clone())
        }

        async fn publish_proposed_docket(
            &self,
            peers: &[ValidatorEndpoint],
            payload: DocketPayload,
        ) -> PeerResults {
            self.proposed_calls.fetch_add(1, Ordering::SeqCst);
            self.deliver(peers, payload).await
        }

        async fn broadcast_confirmed_docket(
            &self,
            peers: &[ValidatorEndpoint],
            payload: DocketPayload,
        ) -> PeerResults {
            self.confirmed_calls.fetch_add(1, Ordering::SeqCst);
            self.deliver(peers, payload).await
        }
    }

    enum LedgerBehaviour {
        Accept,
        Reject,
        Fail,
        Hang,
        FailThenAccept(AtomicU32),
    }

    struct MockRegisterClient {
        behaviour: LedgerBehaviour,
        calls: AtomicUsize,
    }

    impl MockRegisterClient {
        fn new(behaviour: LedgerBehaviour) -> Self {
            Self {
                behaviour,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RegisterClient for MockRegisterClient {
        async fn write_docket(&self, _payload: DocketPayload) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                LedgerBehaviour::Accept => Ok(true),
                LedgerBehaviour::Reject => Ok(false),
                LedgerBehaviour::Fail => Err(DocketError::Transport("ledger unreachable".to_string())),
                LedgerBehaviour::Hang => {
                    std::future::pending::<()>().await;
                    Ok(true)
                }
                LedgerBehaviour::FailThenAccept(remaining) => {
                    if remaining.load(Ordering::SeqCst) > 0 {
                        remaining.fetch_sub(1, Ordering::SeqCst);
                        Err(DocketError::Timeout("ledger busy".to_string()))
                    } else {
                        Ok(true)
                    }
                }
            }
        }
    }

    fn proposed_docket() -> Docket {
        Docket::propose(DocketDraft {
            register_id: "register-1".to_string(),
            docket_number: 0,
            previous_hash: None,
            proposer_validator_id: "validator-0".to_string(),
            transactions: vec![Transaction::new("tx-1", TransactionType::Regular, b"payload".to_vec())
                .with_signature(Signature::new(vec![1u8; 32], vec![2u8; 64], "ED25519"))],
        })
        .unwrap()
    }

    fn confirmed_docket() -> Docket {
        let mut docket = proposed_docket();
        for validator in ["validator-1", "validator-2"] {
            let vote = ConsensusVote::cast(
                &docket,
                validator,
                VoteDecision::Approve,
                Signature::new(vec![3u8; 32], vec![4u8; 64], "ED25519"),
            );
            docket.add_vote(vote).unwrap();
        }
        assert_eq!(
            docket.finalize(&VoteThresholds::default()).unwrap(),
            DocketStatus::Confirmed
        );
        docket
    }

    fn distributor(
        peers: Arc<CountingPeerClient>,
        ledger: Arc<MockRegisterClient>,
    ) -> DocketDistributor {
        DocketDistributor::builder()
            .config(DistributorConfig {
                retry_backoff: Duration::from_millis(10),
                ..Default::default()
            })
            .peer_client(peers)
            .register_client(ledger)
            .build()
            .unwrap()
    }

    fn accepting_ledger() -> Arc<MockRegisterClient> {
        Arc::new(MockRegisterClient::new(LedgerBehaviour::Accept))
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let peers: Arc<dyn PeerClient> = Arc::new(CountingPeerClient::default());
        let ledger: Arc<dyn RegisterClient> = accepting_ledger();

        let missing_peers = DocketDistributor::builder()
            .config(DistributorConfig::default())
            .register_client(ledger.clone())
            .build();
        assert!(matches!(missing_peers, Err(DocketError::Config(_))));

        let missing_ledger = DocketDistributor::builder()
            .config(DistributorConfig::default())
            .peer_client(peers.clone())
            .build();
        assert!(matches!(missing_ledger, Err(DocketError::Config(_))));

        let missing_config = DocketDistributor::builder()
            .peer_client(peers)
            .register_client(ledger)
            .build();
        assert!(matches!(missing_config, Err(DocketError::Config(_))));
    }

    #[test]
    fn test_fresh_stats_are_zero() {
        let distributor = distributor(Arc::new(CountingPeerClient::default()), accepting_ledger());
        assert_eq!(distributor.stats(), DistributorStats::default());
    }

    #[tokio::test]
    async fn test_no_peers_skips_publish() {
        let peers = Arc::new(CountingPeerClient::default());
        let distributor = distributor(peers.clone(), accepting_ledger());

        let reached = distributor
            .broadcast_proposed_docket(&proposed_docket())
            .await
            .unwrap();

        assert_eq!(reached, 0);
        assert_eq!(peers.proposed_calls.load(Ordering::SeqCst), 0);
        assert_eq!(distributor.stats().total_proposed_broadcasts, 1);
    }

    #[tokio::test]
    async fn test_single_fan_out_to_all_peers() {
        let peers = Arc::new(CountingPeerClient::with_peers(4));
        let distributor = distributor(peers.clone(), accepting_ledger());
        let docket = proposed_docket();

        let reached = distributor.broadcast_proposed_docket(&docket).await.unwrap();

        assert_eq!(reached, 4);
        assert_eq!(peers.proposed_calls.load(Ordering::SeqCst), 1);
        assert_eq!(peers.confirmed_calls.load(Ordering::SeqCst), 0);

        let payload = peers.last_payload.lock().clone().unwrap();
        assert_eq!(payload.docket_id, docket.docket_id());
        let decoded = BincodeDocketSerializer.deserialize(&payload.bytes).unwrap();
        assert_eq!(decoded, docket);
    }

    #[tokio::test]
    async fn test_confirmed_broadcast_uses_confirmed_api() {
        let peers = Arc::new(CountingPeerClient::with_peers(3));
        let distributor = distributor(peers.clone(), accepting_ledger());

        let reached = distributor
            .broadcast_confirmed_docket(&confirmed_docket())
            .await
            .unwrap();

        assert_eq!(reached, 3);
        assert_eq!(peers.confirmed_calls.load(Ordering::SeqCst), 1);
        assert_eq!(peers.proposed_calls.load(Ordering::SeqCst), 0);
        let stats = distributor.stats();
        assert_eq!(stats.total_confirmed_broadcasts, 1);
        assert_eq!(stats.total_proposed_broadcasts, 0);
    }

    #[tokio::test]
    async fn test_each_counter_counts_once() {
        let peers = Arc::new(CountingPeerClient::with_peers(2));
        let distributor = distributor(peers, accepting_ledger());
        let docket = confirmed_docket();

        distributor.broadcast_proposed_docket(&docket).await.unwrap();
        distributor.broadcast_confirmed_docket(&docket).await.unwrap();
        assert!(distributor.submit_to_register_service(&docket).await);

        assert_eq!(
            distributor.stats(),
            DistributorStats {
                total_proposed_broadcasts: 1,
                total_confirmed_broadcasts: 1,
                total_register_submissions: 1,
                failed_register_submissions: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_docket_without_ids_rejected() {
        let peers = Arc::new(CountingPeerClient::with_peers(2));
        let distributor = distributor(peers.clone(), accepting_ledger());

        let mut json = serde_json::to_value(proposed_docket()).unwrap();
        json["docket_id"] = serde_json::Value::String(String::new());
        let hollow: Docket = serde_json::from_value(json).unwrap();

        let err = distributor.broadcast_proposed_docket(&hollow).await.unwrap_err();
        assert!(matches!(err, DocketError::InvalidArgument(_)));
        assert_eq!(peers.proposed_calls.load(Ordering::SeqCst), 0);
        assert!(!distributor.submit_to_register_service(&hollow).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_publish_failures_retried() {
        let peers = Arc::new(CountingPeerClient {
            transient_failures: AtomicU32::new(2),
            ..CountingPeerClient::with_peers(3)
        });
        let distributor = distributor(peers.clone(), accepting_ledger());

        let reached = distributor
            .broadcast_proposed_docket(&proposed_docket())
            .await
            .unwrap();

        assert_eq!(reached, 3);
        assert_eq!(peers.proposed_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_report_zero() {
        let peers = Arc::new(CountingPeerClient {
            transient_failures: AtomicU32::new(10),
            ..CountingPeerClient::with_peers(3)
        });
        let distributor = distributor(peers.clone(), accepting_ledger());

        let reached = distributor
            .broadcast_proposed_docket(&proposed_docket())
            .await
            .unwrap();

        assert_eq!(reached, 0);
        assert_eq!(peers.proposed_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_peer_excluded_from_count() {
        let peers = Arc::new(CountingPeerClient {
            unreachable: ["validator-4".to_string()].into_iter().collect(),
            ..CountingPeerClient::with_peers(5)
        });
        let distributor = distributor(peers.clone(), accepting_ledger());

        let reached = distributor
            .broadcast_proposed_docket(&proposed_docket())
            .await
            .unwrap();

        assert_eq!(reached, 4);
        // Retries go to the failing peer only
        assert_eq!(*peers.call_sizes.lock(), vec![5, 1, 1, 1]);
        assert_eq!(distributor.stats().total_proposed_broadcasts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_keeps_partial_count() {
        let peers = Arc::new(CountingPeerClient {
            unreachable: ["validator-2".to_string()].into_iter().collect(),
            ..CountingPeerClient::with_peers(3)
        });
        let distributor = DocketDistributor::builder()
            .config(DistributorConfig {
                broadcast_timeout: Duration::from_millis(500),
                retry_backoff: Duration::from_millis(400),
                max_retries: 10,
                ..Default::default()
            })
            .peer_client(peers.clone())
            .register_client(accepting_ledger())
            .build()
            .unwrap();

        let started = Instant::now();
        let reached = distributor
            .broadcast_confirmed_docket(&confirmed_docket())
            .await
            .unwrap();

        assert_eq!(reached, 2);
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(peers.call_sizes.lock().len() < 11);
    }

    #[tokio::test]
    async fn test_permanent_publish_failure_not_retried() {
        let peers = Arc::new(CountingPeerClient {
            fail_permanently: true,
            ..CountingPeerClient::with_peers(3)
        });
        let distributor = distributor(peers.clone(), accepting_ledger());

        let reached = distributor
            .broadcast_proposed_docket(&proposed_docket())
            .await
            .unwrap();

        assert_eq!(reached, 0);
        assert_eq!(peers.proposed_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_discovery_failure_reports_zero() {
        let peers = Arc::new(CountingPeerClient {
            fail_discovery: true,
            ..CountingPeerClient::with_peers(3)
        });
        let distributor = distributor(peers.clone(), accepting_ledger());

        let reached = distributor
            .broadcast_confirmed_docket(&confirmed_docket())
            .await
            .unwrap();
        assert_eq!(reached, 0);
        assert_eq!(peers.confirmed_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_peers_bounded_by_deadline() {
        let peers = Arc::new(CountingPeerClient {
            hang: true,
            ..CountingPeerClient::with_peers(3)
        });
        let distributor = distributor(peers, accepting_ledger());

        let started = Instant::now();
        let reached = distributor
            .broadcast_proposed_docket(&proposed_docket())
            .await
            .unwrap();

        assert_eq!(reached, 0);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_rejected_submission_not_retried() {
        let ledger = Arc::new(MockRegisterClient::new(LedgerBehaviour::Reject));
        let distributor = distributor(Arc::new(CountingPeerClient::default()), ledger.clone());

        assert!(!distributor.submit_to_register_service(&confirmed_docket()).await);
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 1);

        let stats = distributor.stats();
        assert_eq!(stats.total_register_submissions, 1);
        assert_eq!(stats.failed_register_submissions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_ledger_returns_false() {
        let ledger = Arc::new(MockRegisterClient::new(LedgerBehaviour::Fail));
        let distributor = distributor(Arc::new(CountingPeerClient::default()), ledger.clone());

        assert!(!distributor.submit_to_register_service(&confirmed_docket()).await);
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 4);
        assert_eq!(distributor.stats().failed_register_submissions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_ledger_failure_recovers() {
        let ledger = Arc::new(MockRegisterClient::new(LedgerBehaviour::FailThenAccept(
            AtomicU32::new(1),
        )));
        let distributor = distributor(Arc::new(CountingPeerClient::default()), ledger.clone());

        assert!(distributor.submit_to_register_service(&confirmed_docket()).await);
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 2);
        assert_eq!(distributor.stats().failed_register_submissions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_ledger_times_out_each_attempt() {
        let ledger = Arc::new(MockRegisterClient::new(LedgerBehaviour::Hang));
        let distributor = distributor(Arc::new(CountingPeerClient::default()), ledger.clone());

        assert!(!distributor.submit_to_register_service(&confirmed_docket()).await);
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_on_docket_confirmed_submits() {
        let peers = Arc::new(CountingPeerClient::with_peers(2));
        let ledger = accepting_ledger();
        let distributor = distributor(peers.clone(), ledger.clone());

        let outcome = distributor
            .on_docket_confirmed(&confirmed_docket())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ConfirmationOutcome {
                peers_reached: 2,
                submitted: Some(true)
            }
        );
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_docket_confirmed_without_auto_submit() {
        let ledger = accepting_ledger();
        let distributor = DocketDistributor::builder()
            .config(DistributorConfig {
                auto_submit_to_register: false,
                ..Default::default()
            })
            .peer_client(Arc::new(CountingPeerClient::with_peers(1)))
            .register_client(ledger.clone())
            .build()
            .unwrap();

        let outcome = distributor
            .on_docket_confirmed(&confirmed_docket())
            .await
            .unwrap();
        assert_eq!(outcome.submitted, None);
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_on_docket_confirmed_requires_confirmed_status() {
        let distributor = distributor(Arc::new(CountingPeerClient::with_peers(1)), accepting_ledger());
        let err = distributor
            .on_docket_confirmed(&proposed_docket())
            .await
            .unwrap_err();
        assert!(matches!(err, DocketError::InvalidArgument(_)));
        assert_eq!(distributor.stats().total_confirmed_broadcasts, 0);
    }

    #[tokio::test]
    async fn test_metrics_mirror_counters() {
        let metrics = Arc::new(DistributorMetrics::new().unwrap());
        let distributor = DocketDistributor::builder()
            .config(DistributorConfig::default())
            .peer_client(Arc::new(CountingPeerClient::with_peers(3)))
            .register_client(Arc::new(MockRegisterClient::new(LedgerBehaviour::Reject)))
            .metrics(metrics.clone())
            .build()
            .unwrap();
        let docket = confirmed_docket();

        distributor.broadcast_proposed_docket(&docket).await.unwrap();
        distributor.submit_to_register_service(&docket).await;

        assert_eq!(metrics.proposed_broadcasts_total.get(), 1);
        assert_eq!(metrics.peers_reached_total.get(), 3);
        assert_eq!(metrics.register_submissions_total.get(), 1);
        assert_eq!(metrics.register_submissions_failed_total.get(), 1);
        assert_eq!(metrics.broadcast_duration_seconds.get_sample_count(), 1);
    }
}
