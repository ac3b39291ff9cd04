//! # Outbound Ports (Driven Ports / SPI)
//!
//! Collaborators the validator reads from: committed chain state and the
//! workflow definition service.

use crate::domain::Definition;
use async_trait::async_trait;
use shared_types::{Transaction, TxId};

/// Read access to committed register state.
///
/// Synchronous so that validation stays a pure function of its inputs.
pub trait ChainLookup: Send + Sync {
    /// A committed transaction by id.
    fn get_transaction(&self, id: &TxId) -> Option<Transaction>;

    /// Registered key of a sender outside any definition (anchor and
    /// publication submitters).
    fn sender_key(&self, register_id: &str, sender: &str) -> Option<Vec<u8>>;
}

/// Workflow definition service.
#[async_trait]
pub trait DefinitionProvider: Send + Sync {
    /// Resolve the current version of a definition. `Ok(None)` when the
    /// definition does not exist.
    async fn get_definition(
        &self,
        definition_id: &str,
        register_id: &str,
    ) -> Result<Option<Definition>, String>;
}
