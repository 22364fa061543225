//! Genesis configuration service
//!
//! Resolves a register's configuration through the local cache, the
//! distributed store and an optional source of truth, synthesizing defaults
//! when nothing exists. Concurrent misses for one register share a single
//! in-flight fetch.
//!
//! Crypto policies applied from control transactions are also kept under a
//! non-expiring key and laid over every rebuilt configuration, so refreshes
//! and store TTLs never roll a register back to an ungoverned policy.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use docket_common::{CryptoPolicy, DocketError, PolicyUpdateOutcome, Result, Transaction};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::genesis::{
    ConsensusConfig, GenesisConfiguration, LeaderElectionConfig, ValidatorConfig,
};
use crate::local::LocalConfigCache;
use crate::settings::ConfigCacheSettings;
use crate::store::{DistributedStore, InMemoryConfigStore, RedisConfigStore};
use crate::CHANGE_CHANNEL_CAPACITY;

/// Authoritative configuration source consulted on a store miss
#[async_trait]
pub trait GenesisConfigSource: Send + Sync {
    /// Configuration for a register, or `None` if the register has none
    async fn load(&self, register_id: &str) -> Result<Option<GenesisConfiguration>>;
}

/// Published when a register's blueprint version changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChanged {
    pub register_id: String,
    pub previous_version_id: String,
    pub new_version_id: String,
}

type ConfigFuture = Shared<BoxFuture<'static, Result<Arc<GenesisConfiguration>>>>;

/// Policy applied from a control transaction, stored without expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GovernedPolicy {
    control_blueprint_version_id: String,
    crypto_policy: CryptoPolicy,
}

impl GovernedPolicy {
    /// Lay the policy over `config` unless it already carries a newer one
    fn overlay(self, config: &mut GenesisConfiguration) {
        let current = config.crypto_policy.as_ref().map_or(0, |p| p.version);
        if self.crypto_policy.version > current {
            config.control_blueprint_version_id = self.control_blueprint_version_id;
            config.crypto_policy = Some(self.crypto_policy);
        }
    }
}

/// What the distributed store holds for a register
enum StoredConfig {
    Found(GenesisConfiguration),
    Missing,
    /// Present but not decodable or not valid; left untouched
    Unusable,
}

struct ServiceInner {
    settings: ConfigCacheSettings,
    store: Arc<dyn DistributedStore>,
    source: Option<Arc<dyn GenesisConfigSource>>,
    local: LocalConfigCache,
    in_flight: DashMap<String, ConfigFuture>,
    /// Bumped whenever a register's cached configuration is invalidated
    generations: DashMap<String, u64>,
    changes: broadcast::Sender<ConfigChanged>,
}

/// Two-tier genesis configuration cache
#[derive(Clone)]
pub struct GenesisConfigService {
    inner: Arc<ServiceInner>,
}

impl GenesisConfigService {
    pub fn new(settings: ConfigCacheSettings, store: Arc<dyn DistributedStore>) -> Self {
        Self::build(settings, store, None)
    }

    /// Service that consults `source` before synthesizing defaults
    pub fn with_source(
        settings: ConfigCacheSettings,
        store: Arc<dyn DistributedStore>,
        source: Arc<dyn GenesisConfigSource>,
    ) -> Self {
        Self::build(settings, store, Some(source))
    }

    /// Service backed by Redis when `redis_url` is set, in-memory otherwise
    pub async fn from_settings(settings: ConfigCacheSettings) -> Result<Self> {
        let store: Arc<dyn DistributedStore> = match &settings.redis_url {
            Some(url) => Arc::new(RedisConfigStore::new(url).await?),
            None => {
                warn!("No Redis URL configured, using in-memory configuration store");
                Arc::new(InMemoryConfigStore::new())
            }
        };
        Ok(Self::new(settings, store))
    }

    fn build(
        settings: ConfigCacheSettings,
        store: Arc<dyn DistributedStore>,
        source: Option<Arc<dyn GenesisConfigSource>>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let local = LocalConfigCache::new(settings.local_cache_capacity);
        Self {
            inner: Arc::new(ServiceInner {
                settings,
                store,
                source,
                local,
                in_flight: DashMap::new(),
                generations: DashMap::new(),
                changes,
            }),
        }
    }

    pub fn settings(&self) -> &ConfigCacheSettings {
        &self.inner.settings
    }

    /// Receive configuration change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChanged> {
        self.inner.changes.subscribe()
    }

    /// Full configuration for a register
    #[instrument(skip(self))]
    pub async fn get_full_config(&self, register_id: &str) -> Result<Arc<GenesisConfiguration>> {
        require_register_id(register_id)?;

        if self.inner.settings.local_cache_enabled {
            if let Some(config) = self.inner.local.get(register_id) {
                debug!("Local cache hit");
                return Ok(config);
            }
        }

        let fetch = match self.inner.in_flight.entry(register_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().peek().is_some() {
                    // Left behind by a cancelled caller
                    let fetch = self.start_fetch(register_id);
                    entry.insert(fetch.clone());
                    fetch
                } else {
                    debug!("Joining in-flight fetch");
                    entry.get().clone()
                }
            }
            Entry::Vacant(entry) => {
                let fetch = self.start_fetch(register_id);
                entry.insert(fetch.clone());
                fetch
            }
        };

        let result = fetch.clone().await;
        self.inner
            .in_flight
            .remove_if(register_id, |_, pending| pending.ptr_eq(&fetch));
        result
    }

    fn start_fetch(&self, register_id: &str) -> ConfigFuture {
        let inner = Arc::clone(&self.inner);
        let register_id = register_id.to_string();
        let generation = inner.generation(&register_id);
        async move { inner.fetch(&register_id, generation).await }
            .boxed()
            .shared()
    }

    pub async fn get_consensus_config(&self, register_id: &str) -> Result<ConsensusConfig> {
        Ok(self.get_full_config(register_id).await?.consensus.clone())
    }

    pub async fn get_validator_config(&self, register_id: &str) -> Result<ValidatorConfig> {
        Ok(self.get_full_config(register_id).await?.validators.clone())
    }

    pub async fn get_leader_election_config(
        &self,
        register_id: &str,
    ) -> Result<LeaderElectionConfig> {
        Ok(self.get_full_config(register_id).await?.leader_election.clone())
    }

    /// Whether the register is due for a staleness check.
    ///
    /// A stale answer records the current time as the latest check.
    #[instrument(skip(self))]
    pub async fn is_config_stale(&self, register_id: &str) -> Result<bool> {
        require_register_id(register_id)?;
        let settings = &self.inner.settings;
        let key = settings.last_check_key(register_id);

        let last_check = self
            .inner
            .store
            .get(&key)
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|ts| ts.with_timezone(&Utc));

        let stale = match last_check {
            None => true,
            Some(ts) => Utc::now()
                .signed_duration_since(ts)
                .to_std()
                .map(|elapsed| elapsed >= settings.stale_check_interval)
                .unwrap_or(false),
        };

        if stale {
            let ttl = settings
                .distributed_cache_ttl
                .max(settings.stale_check_interval);
            self.inner
                .store
                .set(&key, &Utc::now().to_rfc3339(), ttl)
                .await?;
        }

        debug!(stale, "Staleness check");
        Ok(stale)
    }

    /// Drop cached entries and re-resolve.
    ///
    /// Publishes [`ConfigChanged`] when the blueprint version differs from the
    /// previously cached one.
    #[instrument(skip(self))]
    pub async fn refresh_config(&self, register_id: &str) -> Result<Arc<GenesisConfiguration>> {
        require_register_id(register_id)?;

        let previous_version_id = match self.inner.local.get(register_id) {
            Some(config) => Some(config.control_blueprint_version_id.clone()),
            None => match self.inner.read_store(register_id).await? {
                StoredConfig::Found(config) => Some(config.control_blueprint_version_id),
                StoredConfig::Missing | StoredConfig::Unusable => None,
            },
        };

        self.inner.invalidate(register_id);
        self.inner
            .store
            .delete(&self.inner.settings.config_key(register_id))
            .await?;
        self.inner.local.remove(register_id);
        self.inner.in_flight.remove(register_id);

        let config = self.get_full_config(register_id).await?;

        match previous_version_id {
            Some(previous) if previous != config.control_blueprint_version_id => {
                self.inner.notify(ConfigChanged {
                    register_id: register_id.to_string(),
                    previous_version_id: previous,
                    new_version_id: config.control_blueprint_version_id.clone(),
                });
            }
            _ => debug!("Blueprint version unchanged"),
        }

        Ok(config)
    }

    /// Store the policy carried by a crypto policy control transaction.
    ///
    /// The blueprint version becomes the transaction id. Policies whose
    /// version does not exceed the stored one are ignored. Applied policies
    /// outlive the configuration entry's TTL and [`refresh_config`].
    ///
    /// [`refresh_config`]: Self::refresh_config
    #[instrument(skip(self, tx), fields(tx_id = %tx.id))]
    pub async fn apply_crypto_policy_update(
        &self,
        register_id: &str,
        tx: &Transaction,
    ) -> Result<PolicyUpdateOutcome> {
        require_register_id(register_id)?;
        let policy = tx.crypto_policy_update()?;
        policy.validate()?;

        let current = self.get_full_config(register_id).await?;
        let current_version = current
            .crypto_policy
            .as_ref()
            .map(|p| p.version)
            .unwrap_or(0);

        if policy.version <= current_version {
            debug!(
                current_version,
                offered_version = policy.version,
                "Ignoring non-increasing crypto policy version"
            );
            return Ok(PolicyUpdateOutcome::Ignored {
                current_version,
                offered_version: policy.version,
            });
        }

        let new_version = policy.version;
        let governed = GovernedPolicy {
            control_blueprint_version_id: tx.id.clone(),
            crypto_policy: policy,
        };
        self.inner
            .store
            .set_persistent(
                &self.inner.settings.policy_key(register_id),
                &serde_json::to_string(&governed)?,
            )
            .await?;

        let mut updated = (*current).clone();
        let previous_version_id = updated.control_blueprint_version_id.clone();
        governed.overlay(&mut updated);
        updated.loaded_at = Utc::now();

        self.inner.invalidate(register_id);
        self.inner.write_store(&updated).await?;
        self.inner.local.remove(register_id);

        info!(
            previous_version = current_version,
            new_version, "Stored crypto policy update"
        );
        self.inner.notify(ConfigChanged {
            register_id: register_id.to_string(),
            previous_version_id,
            new_version_id: tx.id.clone(),
        });

        Ok(PolicyUpdateOutcome::Applied {
            previous_version: current_version,
            new_version,
        })
    }

    /// Evict a register from the local cache only
    pub fn invalidate_local(&self, register_id: &str) -> bool {
        self.inner.invalidate(register_id);
        self.inner.local.remove(register_id)
    }
}

impl ServiceInner {
    async fn fetch(&self, register_id: &str, generation: u64) -> Result<Arc<GenesisConfiguration>> {
        let persist = match self.read_store(register_id).await? {
            StoredConfig::Found(config) => {
                debug!(register_id, "Distributed store hit");
                return Ok(self.cache_locally(config, generation));
            }
            StoredConfig::Missing => true,
            StoredConfig::Unusable => false,
        };

        let loaded = match &self.source {
            Some(source) => source.load(register_id).await?,
            None => None,
        };

        let mut config = match loaded {
            Some(config) => {
                config.validate()?;
                debug!(register_id, version = %config.control_blueprint_version_id, "Loaded from source");
                config
            }
            None => {
                info!(register_id, "Synthesizing default configuration");
                GenesisConfiguration::synthesize_default(register_id)
            }
        };

        if let Some(governed) = self.read_governed_policy(register_id).await? {
            governed.overlay(&mut config);
        }

        if persist {
            if let Err(e) = self.write_store(&config).await {
                warn!(register_id, error = %e, "Failed to persist configuration");
            }
        }

        Ok(self.cache_locally(config, generation))
    }

    async fn read_store(&self, register_id: &str) -> Result<StoredConfig> {
        let key = self.settings.config_key(register_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(StoredConfig::Missing);
        };
        let config: GenesisConfiguration = match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(register_id, error = %e, "Stored configuration is undecodable, leaving it in place");
                return Ok(StoredConfig::Unusable);
            }
        };
        if let Err(e) = config.validate() {
            warn!(register_id, error = %e, "Stored configuration is invalid, leaving it in place");
            return Ok(StoredConfig::Unusable);
        }
        Ok(StoredConfig::Found(config))
    }

    async fn read_governed_policy(&self, register_id: &str) -> Result<Option<GovernedPolicy>> {
        let Some(raw) = self.store.get(&self.settings.policy_key(register_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(governed) => Ok(Some(governed)),
            Err(e) => {
                warn!(register_id, error = %e, "Ignoring undecodable governed policy");
                Ok(None)
            }
        }
    }

    async fn write_store(&self, config: &GenesisConfiguration) -> Result<()> {
        let json = serde_json::to_string(config)?;
        self.store
            .set(
                &self.settings.config_key(&config.register_id),
                &json,
                self.settings.distributed_cache_ttl,
            )
            .await
    }

    fn generation(&self, register_id: &str) -> u64 {
        self.generations.get(register_id).map_or(0, |g| *g)
    }

    /// Mark fetches started before now as stale
    fn invalidate(&self, register_id: &str) {
        *self.generations.entry(register_id.to_string()).or_insert(0) += 1;
    }

    /// Cache a fetched configuration unless the register was invalidated
    /// after the fetch started
    fn cache_locally(&self, config: GenesisConfiguration, generation: u64) -> Arc<GenesisConfiguration> {
        let config = Arc::new(config);
        if self.settings.local_cache_enabled {
            let ttl = self.settings.local_cache_ttl.min(config.cache_ttl);
            self.local
                .insert(&config.register_id, Arc::clone(&config), ttl);
            if self.generation(&config.register_id) != generation {
                self.local.remove_if_same(&config.register_id, &config);
                debug!(register_id = %config.register_id, "Discarded configuration fetched before invalidation");
            }
        }
        config
    }

    fn notify(&self, event: ConfigChanged) {
        info!(
            register_id = %event.register_id,
            previous = %event.previous_version_id,
            new = %event.new_version_id,
            "Configuration changed"
        );
        // No receivers is not an error
        let _ = self.changes.send(event);
    }
}

fn require_register_id(register_id: &str) -> Result<()> {
    if register_id.is_empty() {
        return Err(DocketError::InvalidArgument(
            "register_id must not be empty".to_string(),
        ));
    }
    Ok(())
}
