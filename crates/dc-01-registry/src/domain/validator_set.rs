//! Per-register validator membership.

use super::error::{RegistryError, RegistryResult};
use shared_types::{RegisterId, Timestamp, ValidatorId, ValidatorInfo, ValidatorStatus};
use std::collections::HashMap;

/// How a validator joins a register
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationMode {
    /// Open register: validator is Active immediately
    Public,
    /// Consent register: validator waits in Pending for approval
    Consent,
}

/// Validators of one register, keyed by id.
///
/// INVARIANT: entries are never removed; `Removed` is terminal.
/// INVARIANT: `order_index` values are unique and assigned in registration order.
#[derive(Clone, Debug)]
pub struct ValidatorSet {
    register_id: RegisterId,
    validators: HashMap<ValidatorId, ValidatorInfo>,
    next_order_index: u64,
    /// Bumped on every membership or status change
    version: u64,
}

impl ValidatorSet {
    pub fn new(register_id: impl Into<RegisterId>) -> Self {
        Self {
            register_id: register_id.into(),
            validators: HashMap::new(),
            next_order_index: 0,
            version: 0,
        }
    }

    /// Register a new validator.
    pub fn register(
        &mut self,
        validator_id: ValidatorId,
        public_key: Vec<u8>,
        endpoint: String,
        mode: RegistrationMode,
        now: Timestamp,
    ) -> RegistryResult<ValidatorInfo> {
        if self.validators.contains_key(&validator_id) {
            return Err(RegistryError::AlreadyRegistered(validator_id));
        }

        let status = match mode {
            RegistrationMode::Public => ValidatorStatus::Active,
            RegistrationMode::Consent => ValidatorStatus::Pending,
        };
        let info = ValidatorInfo {
            validator_id: validator_id.clone(),
            public_key,
            endpoint,
            status,
            order_index: self.next_order_index,
            registered_at: now,
        };
        self.next_order_index += 1;
        self.version += 1;
        self.validators.insert(validator_id, info.clone());
        Ok(info)
    }

    /// Apply a governance status transition.
    pub fn set_status(
        &mut self,
        validator_id: &str,
        status: ValidatorStatus,
    ) -> RegistryResult<ValidatorInfo> {
        let info = self
            .validators
            .get_mut(validator_id)
            .ok_or_else(|| RegistryError::UnknownValidator {
                register_id: self.register_id.clone(),
                validator_id: validator_id.to_string(),
            })?;

        if !info.status.can_transition_to(status) {
            return Err(RegistryError::InvalidTransition {
                validator_id: validator_id.to_string(),
                from: info.status,
                to: status,
            });
        }
        info.status = status;
        self.version += 1;
        Ok(info.clone())
    }

    /// Merge an authoritative governance snapshot.
    ///
    /// Validators absent from the snapshot are kept. A locally `Removed`
    /// validator stays removed. Returns true if anything changed.
    pub fn merge(&mut self, snapshot: Vec<ValidatorInfo>) -> bool {
        let mut changed = false;
        for incoming in snapshot {
            match self.validators.get_mut(&incoming.validator_id) {
                Some(existing) if existing.status == ValidatorStatus::Removed => {}
                Some(existing) => {
                    if *existing != incoming {
                        *existing = incoming;
                        changed = true;
                    }
                }
                None => {
                    self.next_order_index = self.next_order_index.max(incoming.order_index + 1);
                    self.validators.insert(incoming.validator_id.clone(), incoming);
                    changed = true;
                }
            }
        }
        if changed {
            self.version += 1;
        }
        changed
    }

    pub fn get(&self, validator_id: &str) -> Option<&ValidatorInfo> {
        self.validators.get(validator_id)
    }

    /// Active validators ordered by `order_index`, then id.
    pub fn active_ordered(&self) -> Vec<ValidatorInfo> {
        let mut active: Vec<ValidatorInfo> = self
            .validators
            .values()
            .filter(|v| v.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            a.order_index
                .cmp(&b.order_index)
                .then_with(|| a.validator_id.cmp(&b.validator_id))
        });
        active
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
