//! # Docket Config
//!
//! Versioned per-register genesis configuration for validators.
//!
//! ## Lookup
//!
//! ```text
//! local cache (LRU + TTL) ─miss─▶ distributed store ─miss─▶ source of truth ─none─▶ defaults
//!        ▲                                                                          │
//!        └──────────────── populated on every successful resolution ◀───────────────┘
//! ```
//!
//! Concurrent misses for the same register share one in-flight fetch.
//! Configuration changes (including control-driven crypto policy updates) are
//! published as [`ConfigChanged`] messages; [`PolicyUpdateListener`] applies
//! the embedded policy to a [`docket_common::CryptoPolicyEngine`].

pub mod genesis;
pub mod listener;
pub mod local;
pub mod service;
pub mod settings;
pub mod store;

pub use genesis::{
    ConsensusConfig, GenesisConfiguration, LeaderElectionConfig, RegistrationMode,
    ValidatorConfig,
};
pub use listener::PolicyUpdateListener;
pub use local::LocalConfigCache;
pub use service::{ConfigChanged, GenesisConfigService, GenesisConfigSource};
pub use settings::ConfigCacheSettings;
pub use store::{DistributedStore, InMemoryConfigStore, RedisConfigStore};

/// Blueprint version assigned to synthesized default configurations
pub const DEFAULT_BLUEPRINT_VERSION: &str = "default";

/// Capacity of the change-notification channel
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;
