//! Applies crypto policy updates announced by configuration changes

use std::sync::Arc;

use docket_common::{CryptoPolicyEngine, PolicyUpdateOutcome, Result};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::service::{ConfigChanged, GenesisConfigService};

/// Feeds policies from changed configurations into a [`CryptoPolicyEngine`]
pub struct PolicyUpdateListener {
    service: GenesisConfigService,
    engine: Arc<CryptoPolicyEngine>,
    register_id: Option<String>,
}

impl PolicyUpdateListener {
    pub fn new(service: GenesisConfigService, engine: Arc<CryptoPolicyEngine>) -> Self {
        Self {
            service,
            engine,
            register_id: None,
        }
    }

    /// Only react to changes for one register
    pub fn for_register(mut self, register_id: impl Into<String>) -> Self {
        self.register_id = Some(register_id.into());
        self
    }

    /// Re-read the changed configuration and offer its policy to the engine.
    ///
    /// Returns `None` when the event is filtered out or the configuration
    /// carries no policy.
    pub async fn handle(&self, event: &ConfigChanged) -> Result<Option<PolicyUpdateOutcome>> {
        if let Some(register_id) = &self.register_id {
            if register_id != &event.register_id {
                return Ok(None);
            }
        }

        let config = self.service.get_full_config(&event.register_id).await?;
        let Some(policy) = config.crypto_policy.clone() else {
            debug!(register_id = %event.register_id, "Changed configuration carries no crypto policy");
            return Ok(None);
        };

        let outcome = self.engine.apply_policy_update(policy)?;
        if outcome.is_applied() {
            info!(
                register_id = %event.register_id,
                version_id = %event.new_version_id,
                ?outcome,
                "Applied crypto policy from configuration change"
            );
        }
        Ok(Some(outcome))
    }

    /// Process notifications until the channel closes
    pub async fn run(self, mut changes: broadcast::Receiver<ConfigChanged>) {
        loop {
            match changes.recv().await {
                Ok(event) => {
                    if let Err(e) = self.handle(&event).await {
                        warn!(register_id = %event.register_id, error = %e, "Failed to apply policy update");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Policy listener lagged behind configuration changes");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Policy listener stopped");
    }

    /// Subscribe now and process notifications on a background task
    pub fn spawn(self) -> JoinHandle<()> {
        let changes = self.service.subscribe();
        tokio::spawn(self.run(changes))
    }
}
