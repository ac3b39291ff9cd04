//! Mempool error types.

use super::entities::TxId;
use shared_types::short_hex;
use thiserror::Error;

/// Mempool error type.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MempoolError {
    /// Transaction id is not the hash of its content.
    #[error("Transaction id {} does not match its content", short_hex(.0))]
    IdMismatch(TxId),

    /// Transaction already pooled (pending or in flight).
    #[error("Duplicate transaction: {}", short_hex(.0))]
    DuplicateTransaction(TxId),

    /// Transaction already included in a committed docket.
    #[error("Transaction already committed: {}", short_hex(.0))]
    AlreadyCommitted(TxId),

    /// Transaction sits in the dead-letter store.
    #[error("Transaction is dead-lettered: {}", short_hex(.0))]
    DeadLettered(TxId),

    /// Pool has reached maximum capacity.
    #[error("Pool full at {capacity} transactions")]
    PoolFull { capacity: usize },

    /// Register has reached its share of the pool.
    #[error("Register {register_id} full at {capacity} transactions")]
    RegisterFull {
        register_id: String,
        capacity: usize,
    },

    /// Transaction not found in the pool.
    #[error("Transaction not found: {}", short_hex(.0))]
    TransactionNotFound(TxId),

    /// Snapshot could not be encoded or decoded.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Persistence collaborator failure.
    #[error("Store error: {0}")]
    Store(String),
}
