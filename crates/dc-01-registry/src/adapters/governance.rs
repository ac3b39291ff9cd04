//! Static governance source

use crate::domain::VersionedConfig;
use crate::ports::GovernanceSource;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::ValidatorInfo;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Governance source backed by in-memory maps.
///
/// Can be switched into a failing mode to exercise stale-config and
/// refresh-failure paths.
#[derive(Default)]
pub struct StaticGovernanceSource {
    configs: RwLock<HashMap<String, VersionedConfig>>,
    validators: RwLock<HashMap<String, Vec<ValidatorInfo>>>,
    failing: AtomicBool,
    config_fetches: AtomicU64,
    validator_fetches: AtomicU64,
}

impl StaticGovernanceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a configuration version for a register.
    pub fn set_config(&self, register_id: &str, config: VersionedConfig) {
        self.configs.write().insert(register_id.to_string(), config);
    }

    /// Replace the validator list of a register.
    pub fn set_validators(&self, register_id: &str, validators: Vec<ValidatorInfo>) {
        self.validators
            .write()
            .insert(register_id.to_string(), validators);
    }

    /// Make every fetch fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn config_fetches(&self) -> u64 {
        self.config_fetches.load(Ordering::SeqCst)
    }

    pub fn validator_fetches(&self) -> u64 {
        self.validator_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GovernanceSource for StaticGovernanceSource {
    async fn fetch_consensus_config(&self, register_id: &str) -> Result<VersionedConfig, String> {
        self.config_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err("governance unavailable".to_string());
        }
        self.configs
            .read()
            .get(register_id)
            .cloned()
            .ok_or_else(|| format!("no governance definition for register {register_id}"))
    }

    async fn fetch_validators(&self, register_id: &str) -> Result<Vec<ValidatorInfo>, String> {
        self.validator_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err("governance unavailable".to_string());
        }
        Ok(self
            .validators
            .read()
            .get(register_id)
            .cloned()
            .unwrap_or_default())
    }
}
