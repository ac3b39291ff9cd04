//! Validator registry service

use crate::domain::{RegistrationMode, RegistryError, RegistryResult, ValidatorSet};
use crate::ports::GovernanceSource;
use parking_lot::RwLock;
use shared_types::{RegisterId, TimeSource, ValidatorInfo, ValidatorStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registered validators of every register this node serves.
///
/// Reads are snapshot clones; the lock is never held across an await.
pub struct ValidatorRegistry {
    sets: RwLock<HashMap<RegisterId, ValidatorSet>>,
    governance: Arc<dyn GovernanceSource>,
    time_source: Arc<dyn TimeSource>,
}

impl ValidatorRegistry {
    pub fn new(governance: Arc<dyn GovernanceSource>, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            sets: RwLock::new(HashMap::new()),
            governance,
            time_source,
        }
    }

    /// Register a validator on a register.
    pub fn register_validator(
        &self,
        register_id: &str,
        validator_id: impl Into<String>,
        public_key: Vec<u8>,
        endpoint: impl Into<String>,
        mode: RegistrationMode,
    ) -> RegistryResult<ValidatorInfo> {
        let now = self.time_source.now();
        let mut sets = self.sets.write();
        let set = sets
            .entry(register_id.to_string())
            .or_insert_with(|| ValidatorSet::new(register_id));
        let info = set.register(validator_id.into(), public_key, endpoint.into(), mode, now)?;

        info!(
            register = %register_id,
            validator = %info.validator_id,
            status = ?info.status,
            order_index = info.order_index,
            "[dc-01] Validator registered"
        );
        Ok(info)
    }

    /// Approve a consent registration (Pending -> Active).
    pub fn approve(&self, register_id: &str, validator_id: &str) -> RegistryResult<ValidatorInfo> {
        let current = self
            .get(register_id, validator_id)
            .ok_or_else(|| unknown(register_id, validator_id))?;
        if current.status != ValidatorStatus::Pending {
            return Err(RegistryError::InvalidTransition {
                validator_id: validator_id.to_string(),
                from: current.status,
                to: ValidatorStatus::Active,
            });
        }
        self.set_status(register_id, validator_id, ValidatorStatus::Active)
    }

    /// Apply a governance status transition.
    pub fn set_status(
        &self,
        register_id: &str,
        validator_id: &str,
        status: ValidatorStatus,
    ) -> RegistryResult<ValidatorInfo> {
        let mut sets = self.sets.write();
        let set = sets
            .get_mut(register_id)
            .ok_or_else(|| unknown(register_id, validator_id))?;
        let info = set.set_status(validator_id, status)?;

        info!(
            register = %register_id,
            validator = %validator_id,
            status = ?status,
            "[dc-01] Validator status changed"
        );
        Ok(info)
    }

    /// Snapshot of one validator.
    pub fn get(&self, register_id: &str, validator_id: &str) -> Option<ValidatorInfo> {
        self.sets
            .read()
            .get(register_id)
            .and_then(|set| set.get(validator_id).cloned())
    }

    /// Active validators ordered by `order_index`.
    pub fn active_validators(&self, register_id: &str) -> Vec<ValidatorInfo> {
        self.sets
            .read()
            .get(register_id)
            .map(ValidatorSet::active_ordered)
            .unwrap_or_default()
    }

    pub fn active_count(&self, register_id: &str) -> usize {
        self.active_validators(register_id).len()
    }

    /// Membership version; changes whenever the set or a status changes.
    pub fn membership_version(&self, register_id: &str) -> u64 {
        self.sets
            .read()
            .get(register_id)
            .map(ValidatorSet::version)
            .unwrap_or(0)
    }

    /// Pull the authoritative validator list from governance.
    ///
    /// Returns true if the local view changed.
    pub async fn refresh(&self, register_id: &str) -> RegistryResult<bool> {
        let snapshot = self
            .governance
            .fetch_validators(register_id)
            .await
            .map_err(RegistryError::Governance)?;

        let changed = {
            let mut sets = self.sets.write();
            sets.entry(register_id.to_string())
                .or_insert_with(|| ValidatorSet::new(register_id))
                .merge(snapshot)
        };

        debug!(register = %register_id, changed, "[dc-01] Validator set refreshed");
        Ok(changed)
    }

    /// Look up a validator, refreshing from governance once on a miss.
    pub async fn get_or_refresh(
        &self,
        register_id: &str,
        validator_id: &str,
    ) -> RegistryResult<ValidatorInfo> {
        if let Some(info) = self.get(register_id, validator_id) {
            return Ok(info);
        }

        debug!(
            register = %register_id,
            validator = %validator_id,
            "[dc-01] Unknown validator, refreshing from governance"
        );
        if let Err(e) = self.refresh(register_id).await {
            warn!(register = %register_id, error = %e, "[dc-01] Registry refresh failed");
        }

        self.get(register_id, validator_id)
            .ok_or_else(|| unknown(register_id, validator_id))
    }

    /// Public key of an Active validator, refreshing once on a miss.
    pub async fn active_public_key(
        &self,
        register_id: &str,
        validator_id: &str,
    ) -> RegistryResult<Vec<u8>> {
        let info = self.get_or_refresh(register_id, validator_id).await?;
        if !info.is_active() {
            return Err(RegistryError::InactiveValidator {
                validator_id: info.validator_id,
                status: info.status,
            });
        }
        Ok(info.public_key)
    }
}

fn unknown(register_id: &str, validator_id: &str) -> RegistryError {
    RegistryError::UnknownValidator {
        register_id: register_id.to_string(),
        validator_id: validator_id.to_string(),
    }
}
