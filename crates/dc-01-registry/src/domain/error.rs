//! Registry error types

use shared_types::{RegisterId, ValidatorId, ValidatorStatus};
use thiserror::Error;

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors from the validator registry and configuration provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Validator not known even after a governance refresh
    #[error("Unknown validator {validator_id} on register {register_id}")]
    UnknownValidator {
        register_id: RegisterId,
        validator_id: ValidatorId,
    },

    /// Validator is known but not Active
    #[error("Validator {validator_id} is {status:?}, not Active")]
    InactiveValidator {
        validator_id: ValidatorId,
        status: ValidatorStatus,
    },

    /// Validator id registered twice
    #[error("Validator {0} already registered")]
    AlreadyRegistered(ValidatorId),

    /// Governance transition not permitted
    #[error("Invalid status transition for {validator_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        validator_id: ValidatorId,
        from: ValidatorStatus,
        to: ValidatorStatus,
    },

    /// Consensus configuration failed validation or parsing
    #[error("Invalid consensus config: {0}")]
    InvalidConfig(String),

    /// No configuration could be obtained for the register
    #[error("No consensus config available for register {0}")]
    ConfigUnavailable(RegisterId),

    /// Governance collaborator failure
    #[error("Governance source error: {0}")]
    Governance(String),
}

impl RegistryError {
    /// Transient errors that a later refresh may resolve
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownValidator { .. } | Self::ConfigUnavailable(_) | Self::Governance(_)
        )
    }
}
