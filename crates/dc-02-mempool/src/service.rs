//! Thread-safe mempool service.
//!
//! Wraps the [`TransactionPool`] in a single `parking_lot::Mutex` so that
//! dequeue, commit, requeue and reject are mutually exclusive per id. No
//! method awaits while holding the lock.

use crate::domain::{
    DeadLetter, MempoolConfig, MempoolError, MempoolSnapshot, MempoolStatus, RequeueResult,
    TransactionPool, TxLocation,
};
use crate::ports::MempoolStore;
use parking_lot::Mutex;
use shared_types::{short_hex, TimeSource, Transaction, TxId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared transaction pool.
pub struct Mempool {
    pool: Mutex<TransactionPool>,
    time_source: Arc<dyn TimeSource>,
}

impl Mempool {
    pub fn new(config: MempoolConfig, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            pool: Mutex::new(TransactionPool::new(config)),
            time_source,
        }
    }

    /// Add a transaction with the given priority.
    pub fn enqueue(&self, transaction: Transaction, priority: u32) -> Result<(), MempoolError> {
        let id = transaction.id;
        let register = transaction.register_id.clone();
        let now = self.time_source.now();
        self.pool.lock().enqueue(transaction, priority, now)?;
        debug!(
            register = %register,
            tx = %short_hex(&id),
            priority,
            "[dc-02] Transaction enqueued"
        );
        Ok(())
    }

    /// Take up to `max_count` pending transactions of a register for the
    /// docket with `docket_sequence`.
    pub fn dequeue_batch(
        &self,
        register_id: &str,
        max_count: usize,
        docket_sequence: u64,
    ) -> Vec<Transaction> {
        self.pool
            .lock()
            .dequeue_batch(register_id, max_count, docket_sequence)
    }

    /// Return transactions of an abandoned docket.
    pub fn requeue(&self, transactions: &[Transaction]) -> RequeueResult {
        let now = self.time_source.now();
        let result = self.pool.lock().requeue(transactions, now);
        debug!(
            requeued = result.requeued.len(),
            restored = result.restored.len(),
            skipped = result.skipped.len(),
            "[dc-02] Transactions requeued"
        );
        result
    }

    /// Remove ids included in a committed docket.
    pub fn commit(&self, ids: &[TxId]) -> usize {
        self.pool.lock().commit(ids)
    }

    /// Dead-letter a transaction that failed build-time validation.
    pub fn reject(&self, id: &TxId, reason: impl Into<String>) -> Result<DeadLetter, MempoolError> {
        let now = self.time_source.now();
        let letter = self.pool.lock().reject(id, reason, now)?;
        warn!(
            tx = %short_hex(id),
            reason = %letter.reason,
            "[dc-02] Transaction dead-lettered"
        );
        Ok(letter)
    }

    /// Dead-letter pending entries past their expiry.
    pub fn expire_stale(&self) -> Vec<DeadLetter> {
        let now = self.time_source.now();
        let expired = self.pool.lock().expire_stale(now);
        if !expired.is_empty() {
            warn!(count = expired.len(), "[dc-02] Expired transactions dead-lettered");
        }
        expired
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.pool.lock().dead_letters()
    }

    pub fn location(&self, id: &TxId) -> TxLocation {
        self.pool.lock().location(id)
    }

    pub fn pending_count(&self, register_id: &str) -> usize {
        self.pool.lock().pending_count(register_id)
    }

    pub fn status(&self) -> MempoolStatus {
        let now = self.time_source.now();
        self.pool.lock().status(now)
    }

    /// Capture the current pool.
    pub fn snapshot(&self) -> MempoolSnapshot {
        self.pool.lock().snapshot()
    }

    /// Replace the pool with a snapshot.
    pub fn restore(&self, snapshot: MempoolSnapshot) {
        let mut pool = self.pool.lock();
        let config = pool.config().clone();
        *pool = TransactionPool::restore(config, snapshot);
    }

    /// Write a snapshot to the store.
    pub async fn persist(&self, store: &dyn MempoolStore) -> Result<(), MempoolError> {
        let bytes = self.snapshot().encode()?;
        let size = bytes.len();
        store.save(bytes).await.map_err(MempoolError::Store)?;
        debug!(bytes = size, "[dc-02] Mempool snapshot saved");
        Ok(())
    }

    /// Restore from the store if it holds a snapshot. Returns true if one
    /// was loaded.
    pub async fn load(&self, store: &dyn MempoolStore) -> Result<bool, MempoolError> {
        let Some(bytes) = store.load().await.map_err(MempoolError::Store)? else {
            return Ok(false);
        };
        let snapshot = MempoolSnapshot::decode(&bytes)?;
        let entries = snapshot.entries.len();
        self.restore(snapshot);
        info!(entries, "[dc-02] Mempool restored from snapshot");
        Ok(true)
    }
}
