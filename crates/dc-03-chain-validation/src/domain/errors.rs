//! Validation error types.

use shared_types::{short_hex, TxId};
use thiserror::Error;

/// Why a transaction failed validation.
///
/// Local to the transaction: an error here never affects other transactions
/// in the same batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Id is not the hash of the transaction content.
    #[error("Transaction id {} does not match its content", short_hex(.0))]
    IdMismatch(TxId),

    /// Action transaction names no definition, or the definition is unknown.
    #[error("Definition not found: {0}")]
    DefinitionMissing(String),

    /// Definition provider could not be reached.
    #[error("Definition unavailable: {0}")]
    DefinitionUnavailable(String),

    #[error("Action {action_id:?} not found in definition {definition_id}")]
    ActionNotFound {
        definition_id: String,
        action_id: Option<u32>,
    },

    /// Back-reference not allowed for the transaction kind or unresolvable.
    #[error("Invalid previous id for {}", short_hex(.0))]
    InvalidPreviousId(TxId),

    /// Publication chained to a different definition.
    #[error("Publication of {definition_id} chains to definition {found}")]
    InvalidVersionChain { definition_id: String, found: String },

    /// Action back-reference does not continue its instance.
    #[error("Broken chain: {reason}")]
    BrokenChain { reason: String },

    #[error("Previous data does not match the referenced transaction")]
    PreviousDataMismatch,

    #[error("Schema violation at '{path}': {reason}")]
    SchemaViolation { path: String, reason: String },

    #[error("Condition not met for action {0}")]
    ConditionNotMet(u32),

    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Sender {sender} not permitted for action {action_id}")]
    UnauthorizedSender { sender: String, action_id: u32 },

    #[error("Disclosure names unknown participant: {0}")]
    InvalidDisclosure(String),

    #[error("Invalid signature from {0}")]
    InvalidSignature(String),
}

impl ValidationError {
    /// Transient errors leave the transaction pooled; the rest dead-letter it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DefinitionUnavailable(_))
    }
}
