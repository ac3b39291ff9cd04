//! # dc-01-registry
//!
//! Validator Registry and Genesis Configuration Provider.
//!
//! ## Architecture
//!
//! - [`ValidatorRegistry`] tracks the validators of each register: identity,
//!   public key, status and rotation order. Misses are resolved by refreshing
//!   once from the [`GovernanceSource`] port before failing.
//! - [`GenesisConfigProvider`] resolves the versioned [`ConsensusConfig`] of a
//!   register, caching it with a TTL and serving a stale value when
//!   governance cannot be reached.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = ValidatorRegistry::new(governance.clone(), time_source.clone());
//! registry.register_validator("reg", "v1", key, "mem://v1", RegistrationMode::Public)?;
//!
//! let configs = GenesisConfigProvider::new(governance, time_source, bus, ttl);
//! let current = configs.get("reg").await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::StaticGovernanceSource;
pub use domain::{
    ConsensusConfig, LeaderElectionMechanism, RegistrationMode, RegistryError, RegistryResult,
    ValidatorSet, VersionedConfig,
};
pub use ports::GovernanceSource;
pub use service::{ConfigHandle, GenesisConfigProvider, ValidatorRegistry};
