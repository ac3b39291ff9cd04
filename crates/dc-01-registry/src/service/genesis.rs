//! Genesis configuration provider
//!
//! Resolves the consensus parameters of a register from its governance
//! definition. Values are cached for a bounded TTL, refreshed explicitly or
//! on a `ConfigChanged` notification, and exposed through a pollable
//! [`ConfigHandle`]. A newer version supersedes an older one for subsequent
//! rounds only; a version older than the cached one is ignored.

use crate::domain::{RegistryError, RegistryResult, VersionedConfig};
use crate::ports::GovernanceSource;
use parking_lot::RwLock;
use shared_bus::{ConsensusEvent, EventPublisher};
use shared_types::{RegisterId, TimeSource, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct CachedConfig {
    sender: watch::Sender<VersionedConfig>,
    fetched_at: Timestamp,
    /// Forces the next `get` to refresh regardless of age
    stale: bool,
}

/// Read handle over a register's current configuration.
#[derive(Clone)]
pub struct ConfigHandle {
    receiver: watch::Receiver<VersionedConfig>,
}

impl ConfigHandle {
    /// Current configuration snapshot.
    pub fn current(&self) -> VersionedConfig {
        self.receiver.borrow().clone()
    }

    pub fn version(&self) -> u64 {
        self.receiver.borrow().version
    }

    /// Wait until a newer configuration is installed.
    ///
    /// Returns false once the provider has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }
}

/// Versioned, cached consensus configuration per register.
pub struct GenesisConfigProvider {
    governance: Arc<dyn GovernanceSource>,
    time_source: Arc<dyn TimeSource>,
    event_bus: Arc<dyn EventPublisher>,
    ttl: Duration,
    entries: RwLock<HashMap<RegisterId, CachedConfig>>,
}

impl GenesisConfigProvider {
    pub fn new(
        governance: Arc<dyn GovernanceSource>,
        time_source: Arc<dyn TimeSource>,
        event_bus: Arc<dyn EventPublisher>,
        ttl: Duration,
    ) -> Self {
        Self {
            governance,
            time_source,
            event_bus,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Current configuration, refreshing when expired or invalidated.
    ///
    /// If the refresh fails and a cached value exists, the stale value is
    /// served.
    pub async fn get(&self, register_id: &str) -> RegistryResult<VersionedConfig> {
        let now = self.time_source.now();
        let cached = {
            let entries = self.entries.read();
            entries.get(register_id).map(|entry| {
                let fresh = !entry.stale
                    && now.saturating_sub(entry.fetched_at) < self.ttl.as_millis() as u64;
                (entry.sender.borrow().clone(), fresh)
            })
        };

        match cached {
            Some((config, true)) => Ok(config),
            Some((stale, false)) => match self.refresh(register_id).await {
                Ok(config) => Ok(config),
                Err(e) => {
                    warn!(
                        register = %register_id,
                        version = stale.version,
                        error = %e,
                        "[dc-01] Config refresh failed, serving stale value"
                    );
                    Ok(stale)
                }
            },
            None => self.refresh(register_id).await,
        }
    }

    /// Fetch from governance and install if newer.
    ///
    /// Returns the installed configuration, which may be the cached one when
    /// governance answered with an older version.
    pub async fn refresh(&self, register_id: &str) -> RegistryResult<VersionedConfig> {
        let fetched = self
            .governance
            .fetch_consensus_config(register_id)
            .await
            .map_err(RegistryError::Governance)?;
        fetched.config.validate()?;

        let (installed, superseded) = self.install(register_id, fetched);
        if let Some(previous) = superseded {
            info!(
                register = %register_id,
                previous,
                version = installed.version,
                "[dc-01] Consensus config superseded"
            );
            self.event_bus
                .publish(ConsensusEvent::ConfigChanged {
                    register_id: register_id.to_string(),
                    version: installed.version,
                })
                .await;
        }
        Ok(installed)
    }

    /// Handle a governance change notification.
    pub async fn on_config_changed(
        &self,
        register_id: &str,
        version: u64,
    ) -> RegistryResult<VersionedConfig> {
        let current = self.cached_version(register_id);
        if let Some(current) = current {
            if version <= current {
                debug!(
                    register = %register_id,
                    announced = version,
                    current,
                    "[dc-01] Ignoring stale config notification"
                );
                return self.get(register_id).await;
            }
        }
        self.invalidate(register_id);
        self.refresh(register_id).await
    }

    /// Mark the cached value stale; the next `get` refreshes.
    pub fn invalidate(&self, register_id: &str) {
        if let Some(entry) = self.entries.write().get_mut(register_id) {
            entry.stale = true;
        }
    }

    /// Handle that observes future changes of the register's configuration.
    pub async fn subscribe(&self, register_id: &str) -> RegistryResult<ConfigHandle> {
        self.get(register_id).await?;
        self.entries
            .read()
            .get(register_id)
            .map(|entry| ConfigHandle {
                receiver: entry.sender.subscribe(),
            })
            .ok_or_else(|| RegistryError::ConfigUnavailable(register_id.to_string()))
    }

    fn cached_version(&self, register_id: &str) -> Option<u64> {
        self.entries
            .read()
            .get(register_id)
            .map(|entry| entry.sender.borrow().version)
    }

    /// Install a fetched value. Returns the installed value and, when a
    /// previous version was replaced, that version.
    fn install(
        &self,
        register_id: &str,
        fetched: VersionedConfig,
    ) -> (VersionedConfig, Option<u64>) {
        let now = self.time_source.now();
        let mut entries = self.entries.write();

        match entries.get_mut(register_id) {
            Some(entry) => {
                entry.fetched_at = now;
                entry.stale = false;
                let current = entry.sender.borrow().version;
                if fetched.version > current {
                    entry.sender.send_replace(fetched.clone());
                    (fetched, Some(current))
                } else {
                    (entry.sender.borrow().clone(), None)
                }
            }
            None => {
                let (sender, _) = watch::channel(fetched.clone());
                entries.insert(
                    register_id.to_string(),
                    CachedConfig {
                        sender,
                        fetched_at: now,
                        stale: false,
                    },
                );
                debug!(
                    register = %register_id,
                    version = fetched.version,
                    "[dc-01] Consensus config loaded"
                );
                (fetched, None)
            }
        }
    }
}
