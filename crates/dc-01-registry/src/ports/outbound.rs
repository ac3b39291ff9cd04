//! Driven ports (Outbound dependencies)

use crate::domain::VersionedConfig;
use async_trait::async_trait;
use shared_types::ValidatorInfo;

/// Register governance collaborator.
///
/// Supplies the versioned consensus configuration and the authoritative
/// validator list of a register.
#[async_trait]
pub trait GovernanceSource: Send + Sync {
    /// Fetch the current consensus configuration
    async fn fetch_consensus_config(&self, register_id: &str) -> Result<VersionedConfig, String>;

    /// Fetch the validator list
    async fn fetch_validators(&self, register_id: &str) -> Result<Vec<ValidatorInfo>, String>;
}
