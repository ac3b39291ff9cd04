//! Engine configuration.
//!
//! Per-register consensus parameters come from governance
//! (`ConsensusConfig`); this holds the node-local settings.

use super::error::ConsensusError;
use dc_02_mempool::MempoolConfig;
use shared_types::ValidatorId;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Identity of the local validator.
    pub validator_id: ValidatorId,
    pub mempool: MempoolConfig,
    /// How long a fetched consensus configuration is served before refresh.
    pub config_ttl: Duration,
    pub definition_ttl: Duration,
    pub definition_cache_capacity: usize,
    /// Rejections of one initiator after which a bad actor report is queued.
    pub bad_actor_report_threshold: u32,
    /// Bound of the inbound peer message queue.
    pub inbox_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validator_id: String::new(),
            mempool: MempoolConfig::default(),
            config_ttl: Duration::from_secs(60),
            definition_ttl: Duration::from_secs(300),
            definition_cache_capacity: 1_024,
            bad_actor_report_threshold: 10,
            inbox_capacity: 1_024,
        }
    }
}

impl EngineConfig {
    pub fn new(validator_id: impl Into<ValidatorId>) -> Self {
        Self {
            validator_id: validator_id.into(),
            ..Self::default()
        }
    }

    /// Creates a small config for testing.
    pub fn for_testing(validator_id: impl Into<ValidatorId>) -> Self {
        Self {
            validator_id: validator_id.into(),
            mempool: MempoolConfig::for_testing(),
            config_ttl: Duration::from_secs(5),
            definition_ttl: Duration::from_secs(5),
            definition_cache_capacity: 16,
            bad_actor_report_threshold: 3,
            inbox_capacity: 256,
        }
    }

    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.validator_id.is_empty() {
            return Err(ConsensusError::InvalidConfig(
                "validator_id must not be empty".into(),
            ));
        }
        if self.definition_cache_capacity == 0 {
            return Err(ConsensusError::InvalidConfig(
                "definition_cache_capacity must be at least 1".into(),
            ));
        }
        if self.inbox_capacity == 0 {
            return Err(ConsensusError::InvalidConfig(
                "inbox_capacity must be at least 1".into(),
            ));
        }
        if self.mempool.max_per_register > self.mempool.max_transactions {
            return Err(ConsensusError::InvalidConfig(
                "mempool max_per_register exceeds max_transactions".into(),
            ));
        }
        Ok(())
    }
}
