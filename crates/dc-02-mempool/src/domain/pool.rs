//! # Transaction Pool - Priority Queue with In-Flight Tracking
//!
//! ## Data Structures
//!
//! - `by_id`: O(1) lookup of pooled entries (pending and in flight)
//! - `by_priority`: per-register O(log n) queue of PENDING entries only
//! - `committed`: bounded LRU of committed ids, rejects re-submission
//! - `dead_letters`: expired or rejected transactions, kept for review
//!
//! ## Invariants Enforced
//!
//! - A transaction id is in exactly one of {pending, in flight, committed,
//!   dead-letter}.
//! - In-flight entries are absent from `by_priority`, so a transaction can
//!   never be dequeued into two dockets.
//! - Requeue preserves `enqueued_at`.

use super::entities::{
    DeadLetter, DeadLetterReason, EntryState, MempoolConfig, MempoolEntry, RegisterId, Timestamp,
    Transaction, TxId,
};
use super::errors::MempoolError;
use super::persistence::MempoolSnapshot;
use super::value_objects::{MempoolStatus, PrioritizedEntry, RequeueResult, TxLocation};
use lru::LruCache;
use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;

/// Priority used when an unknown transaction is restored by requeue.
pub const DEFAULT_PRIORITY: u32 = 0;

/// Register-partitioned transaction pool.
pub struct TransactionPool {
    config: MempoolConfig,

    /// All pooled entries indexed by id.
    by_id: HashMap<TxId, MempoolEntry>,

    /// Pending entries per register, in dequeue order.
    by_priority: HashMap<RegisterId, BTreeSet<PrioritizedEntry>>,

    /// Entry count per register (pending plus in flight).
    register_counts: HashMap<RegisterId, usize>,

    /// Recently committed ids.
    committed: LruCache<TxId, ()>,

    /// Expired or rejected transactions.
    dead_letters: HashMap<TxId, DeadLetter>,
}

impl TransactionPool {
    /// Creates a new empty transaction pool.
    pub fn new(config: MempoolConfig) -> Self {
        let cache_size =
            NonZeroUsize::new(config.committed_cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            by_id: HashMap::new(),
            by_priority: HashMap::new(),
            register_counts: HashMap::new(),
            committed: LruCache::new(cache_size),
            dead_letters: HashMap::new(),
        }
    }

    /// Creates a pool with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(MempoolConfig::default())
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    /// Number of pooled entries (pending plus in flight).
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Pending entries for a register.
    pub fn pending_count(&self, register_id: &str) -> usize {
        self.by_priority.get(register_id).map_or(0, BTreeSet::len)
    }

    pub fn get(&self, id: &TxId) -> Option<&MempoolEntry> {
        self.by_id.get(id)
    }

    /// Adds a transaction to the pool.
    ///
    /// # Errors
    /// - `IdMismatch` if the id is not derived from the content
    /// - `AlreadyCommitted` if the id is in the committed cache
    /// - `DeadLettered` if the id is parked in the dead-letter store
    /// - `DuplicateTransaction` if the id is already pooled
    /// - `PoolFull` / `RegisterFull` at capacity
    pub fn enqueue(
        &mut self,
        transaction: Transaction,
        priority: u32,
        now: Timestamp,
    ) -> Result<(), MempoolError> {
        let id = transaction.id;
        if transaction.compute_id() != id {
            return Err(MempoolError::IdMismatch(id));
        }
        if self.committed.contains(&id) {
            return Err(MempoolError::AlreadyCommitted(id));
        }
        if self.dead_letters.contains_key(&id) {
            return Err(MempoolError::DeadLettered(id));
        }
        if self.by_id.contains_key(&id) {
            return Err(MempoolError::DuplicateTransaction(id));
        }
        self.check_capacity(&transaction.register_id)?;

        let entry = MempoolEntry::new(transaction, priority, now, self.config.entry_ttl_ms);
        self.insert_entry(entry);
        Ok(())
    }

    fn check_capacity(&self, register_id: &str) -> Result<(), MempoolError> {
        if self.by_id.len() >= self.config.max_transactions {
            return Err(MempoolError::PoolFull {
                capacity: self.config.max_transactions,
            });
        }
        let register_count = self.register_counts.get(register_id).copied().unwrap_or(0);
        if register_count >= self.config.max_per_register {
            return Err(MempoolError::RegisterFull {
                register_id: register_id.to_string(),
                capacity: self.config.max_per_register,
            });
        }
        Ok(())
    }

    /// Internal insert without validation (assumes all checks passed).
    fn insert_entry(&mut self, entry: MempoolEntry) {
        let register_id = entry.register_id().to_string();
        if entry.is_pending() {
            self.by_priority
                .entry(register_id.clone())
                .or_default()
                .insert(PrioritizedEntry::new(
                    entry.priority,
                    entry.enqueued_at,
                    entry.id(),
                ));
        }
        *self.register_counts.entry(register_id).or_insert(0) += 1;
        self.by_id.insert(entry.id(), entry);
    }

    /// Internal remove from every index.
    fn remove_entry(&mut self, id: &TxId) -> Option<MempoolEntry> {
        let entry = self.by_id.remove(id)?;
        let register_id = entry.register_id().to_string();

        if let Some(queue) = self.by_priority.get_mut(&register_id) {
            queue.remove(&PrioritizedEntry::new(
                entry.priority,
                entry.enqueued_at,
                entry.id(),
            ));
            if queue.is_empty() {
                self.by_priority.remove(&register_id);
            }
        }
        if let Some(count) = self.register_counts.get_mut(&register_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.register_counts.remove(&register_id);
            }
        }
        Some(entry)
    }

    /// Takes up to `max_count` pending entries of a register, highest
    /// priority first, and marks them in flight for `docket_sequence`.
    pub fn dequeue_batch(
        &mut self,
        register_id: &str,
        max_count: usize,
        docket_sequence: u64,
    ) -> Vec<Transaction> {
        let Some(queue) = self.by_priority.get_mut(register_id) else {
            return Vec::new();
        };

        let mut batch = Vec::with_capacity(max_count.min(queue.len()));
        while batch.len() < max_count {
            let Some(next) = queue.pop_first() else {
                break;
            };
            if let Some(entry) = self.by_id.get_mut(&next.id) {
                entry.state = EntryState::InFlight { docket_sequence };
                batch.push(entry.transaction.clone());
            }
        }
        if queue.is_empty() {
            self.by_priority.remove(register_id);
        }
        batch
    }

    /// Returns transactions of an abandoned docket to the pending queue.
    ///
    /// Idempotent. In-flight entries go back with their original
    /// `enqueued_at`; pending, committed and dead-lettered ids are skipped;
    /// unknown transactions are re-inserted so none is lost.
    pub fn requeue(&mut self, transactions: &[Transaction], now: Timestamp) -> RequeueResult {
        let mut result = RequeueResult::default();

        for tx in transactions {
            let id = tx.id;
            if self.committed.contains(&id) || self.dead_letters.contains_key(&id) {
                result.skipped.push(id);
                continue;
            }

            match self.by_id.get_mut(&id) {
                Some(entry) if entry.is_in_flight() => {
                    entry.state = EntryState::Pending;
                    let key = PrioritizedEntry::new(entry.priority, entry.enqueued_at, id);
                    self.by_priority
                        .entry(entry.transaction.register_id.clone())
                        .or_default()
                        .insert(key);
                    result.requeued.push(id);
                }
                Some(_) => result.skipped.push(id),
                None => {
                    let entry =
                        MempoolEntry::new(tx.clone(), DEFAULT_PRIORITY, now, self.config.entry_ttl_ms);
                    self.insert_entry(entry);
                    result.restored.push(id);
                }
            }
        }

        result
    }

    /// Records ids as committed and removes them from every other place.
    ///
    /// Returns the number of pooled entries removed.
    pub fn commit(&mut self, ids: &[TxId]) -> usize {
        let mut removed = 0;
        for id in ids {
            if self.remove_entry(id).is_some() {
                removed += 1;
            }
            // Committed elsewhere wins over a local dead-letter verdict.
            self.dead_letters.remove(id);
            self.committed.put(*id, ());
        }
        removed
    }

    /// Moves a pooled transaction to the dead-letter store.
    pub fn reject(
        &mut self,
        id: &TxId,
        reason: impl Into<String>,
        now: Timestamp,
    ) -> Result<DeadLetter, MempoolError> {
        let entry = self
            .remove_entry(id)
            .ok_or(MempoolError::TransactionNotFound(*id))?;
        Ok(self.park(entry.transaction, DeadLetterReason::Rejected(reason.into()), now))
    }

    /// Moves expired pending entries to the dead-letter store.
    pub fn expire_stale(&mut self, now: Timestamp) -> Vec<DeadLetter> {
        let expired: Vec<TxId> = self
            .by_id
            .values()
            .filter(|entry| entry.is_expired(now))
            .map(MempoolEntry::id)
            .collect();

        let mut letters = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(entry) = self.remove_entry(&id) {
                letters.push(self.park(entry.transaction, DeadLetterReason::Expired, now));
            }
        }
        letters
    }

    fn park(
        &mut self,
        transaction: Transaction,
        reason: DeadLetterReason,
        now: Timestamp,
    ) -> DeadLetter {
        let letter = DeadLetter {
            transaction,
            reason,
            dead_lettered_at: now,
        };
        self.dead_letters.insert(letter.transaction.id, letter.clone());
        letter
    }

    /// Dead letters ordered by the time they were parked.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        let mut letters: Vec<DeadLetter> = self.dead_letters.values().cloned().collect();
        letters.sort_by(|a, b| {
            a.dead_lettered_at
                .cmp(&b.dead_lettered_at)
                .then_with(|| a.transaction.id.cmp(&b.transaction.id))
        });
        letters
    }

    pub fn location(&self, id: &TxId) -> TxLocation {
        if let Some(entry) = self.by_id.get(id) {
            return match entry.state {
                EntryState::Pending => TxLocation::Pending,
                EntryState::InFlight { docket_sequence } => TxLocation::InFlight { docket_sequence },
            };
        }
        if self.committed.contains(id) {
            TxLocation::Committed
        } else if self.dead_letters.contains_key(id) {
            TxLocation::DeadLetter
        } else {
            TxLocation::Unknown
        }
    }

    pub fn status(&self, now: Timestamp) -> MempoolStatus {
        let pending_count: usize = self.by_priority.values().map(BTreeSet::len).sum();
        let oldest_pending_age_ms = self
            .by_id
            .values()
            .filter(|entry| entry.is_pending())
            .map(|entry| now.saturating_sub(entry.enqueued_at))
            .max()
            .unwrap_or(0);

        MempoolStatus {
            pending_count,
            in_flight_count: self.by_id.len() - pending_count,
            dead_letter_count: self.dead_letters.len(),
            committed_cached: self.committed.len(),
            oldest_pending_age_ms,
        }
    }

    /// Capture the pool for persistence.
    ///
    /// In-flight entries are captured as pending: a restarted node has no
    /// docket to hold them.
    pub fn snapshot(&self) -> MempoolSnapshot {
        let mut entries: Vec<MempoolEntry> = self
            .by_id
            .values()
            .cloned()
            .map(|mut entry| {
                entry.state = EntryState::Pending;
                entry
            })
            .collect();
        entries.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.id().cmp(&b.id()))
        });

        MempoolSnapshot {
            entries,
            dead_letters: self.dead_letters(),
            committed: self.committed.iter().map(|(id, _)| *id).collect(),
        }
    }

    /// Rebuild a pool from a snapshot.
    pub fn restore(config: MempoolConfig, snapshot: MempoolSnapshot) -> Self {
        let mut pool = Self::new(config);
        // Oldest first so the most recent ids end up most recently used.
        for id in snapshot.committed.into_iter().rev() {
            pool.committed.put(id, ());
        }
        for letter in snapshot.dead_letters {
            pool.dead_letters.insert(letter.transaction.id, letter);
        }
        for mut entry in snapshot.entries {
            let id = entry.id();
            if pool.committed.contains(&id) || pool.dead_letters.contains_key(&id) {
                continue;
            }
            entry.state = EntryState::Pending;
            pool.insert_entry(entry);
        }
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::TransactionKind;

    fn create_tx(register: &str, seed: u64) -> Transaction {
        Transaction {
            id: [0u8; 32],
            kind: TransactionKind::Action,
            register_id: register.into(),
            definition_id: "def".into(),
            action_id: Some(1),
            instance_id: Some("inst".into()),
            previous_id: Some([0xAA; 32]),
            sender: "alice".into(),
            data: json!({ "seed": seed }),
            previous_data: None,
            signature: vec![],
            timestamp: seed,
            nonce: seed,
        }
        .with_computed_id()
    }

    fn pool() -> TransactionPool {
        TransactionPool::new(MempoolConfig::for_testing())
    }

    #[test]
    fn test_enqueue_rejects_forged_id() {
        let mut pool = pool();
        let mut forged = create_tx("reg", 1);
        forged.id = [7u8; 32];

        assert_eq!(
            pool.enqueue(forged, 0, 0),
            Err(MempoolError::IdMismatch([7u8; 32]))
        );
        assert_eq!(pool.location(&[7u8; 32]), TxLocation::Unknown);
        assert_eq!(pool.pending_count("reg"), 0);
    }

    #[test]
    fn test_dequeue_order_priority_then_fifo() {
        let mut pool = pool();
        let low_early = create_tx("reg", 1);
        let high_late = create_tx("reg", 2);
        let low_late = create_tx("reg", 3);

        pool.enqueue(low_early.clone(), 1, 100).unwrap();
        pool.enqueue(high_late.clone(), 9, 300).unwrap();
        pool.enqueue(low_late.clone(), 1, 200).unwrap();

        let batch = pool.dequeue_batch("reg", 10, 1);
        let ids: Vec<_> = batch.iter().map(|tx| tx.id).collect();
        assert_eq!(ids, vec![high_late.id, low_early.id, low_late.id]);
    }

    #[test]
    fn test_dequeue_marks_in_flight_and_respects_max() {
        let mut pool = pool();
        for seed in 0..5 {
            pool.enqueue(create_tx("reg", seed), 0, seed).unwrap();
        }

        let batch = pool.dequeue_batch("reg", 3, 7);
        assert_eq!(batch.len(), 3);
        assert_eq!(
            pool.location(&batch[0].id),
            TxLocation::InFlight { docket_sequence: 7 }
        );
        assert_eq!(pool.pending_count("reg"), 2);

        // In-flight entries are not handed out again.
        let second = pool.dequeue_batch("reg", 10, 8);
        assert_eq!(second.len(), 2);
        assert!(pool.dequeue_batch("reg", 10, 9).is_empty());
    }

    #[test]
    fn test_registers_are_isolated() {
        let mut pool = pool();
        pool.enqueue(create_tx("a", 1), 0, 1).unwrap();
        pool.enqueue(create_tx("b", 2), 0, 2).unwrap();

        let batch = pool.dequeue_batch("a", 10, 1);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].register_id, "a");
        assert_eq!(pool.pending_count("b"), 1);
    }

    #[test]
    fn test_requeue_preserves_enqueued_at() {
        let mut pool = pool();
        let first = create_tx("reg", 1);
        let second = create_tx("reg", 2);
        pool.enqueue(first.clone(), 0, 100).unwrap();

        let batch = pool.dequeue_batch("reg", 10, 1);
        pool.enqueue(second.clone(), 0, 200).unwrap();

        let result = pool.requeue(&batch, 500);
        assert_eq!(result.requeued, vec![first.id]);
        assert_eq!(pool.get(&first.id).unwrap().enqueued_at, 100);

        // Abandoned transaction keeps its place ahead of the newer one.
        let next = pool.dequeue_batch("reg", 1, 2);
        assert_eq!(next[0].id, first.id);
    }

    #[test]
    fn test_requeue_is_idempotent() {
        let mut pool = pool();
        let tx = create_tx("reg", 1);
        pool.enqueue(tx.clone(), 0, 100).unwrap();
        let batch = pool.dequeue_batch("reg", 10, 1);

        assert_eq!(pool.requeue(&batch, 500).returned(), 1);
        let again = pool.requeue(&batch, 600);
        assert_eq!(again.returned(), 0);
        assert_eq!(again.skipped, vec![tx.id]);
        assert_eq!(pool.pending_count("reg"), 1);
    }

    #[test]
    fn test_requeue_restores_unknown_transaction() {
        let mut pool = pool();
        let tx = create_tx("reg", 1);

        let result = pool.requeue(std::slice::from_ref(&tx), 900);
        assert_eq!(result.restored, vec![tx.id]);
        assert_eq!(pool.location(&tx.id), TxLocation::Pending);
    }

    #[test]
    fn test_commit_blocks_reenqueue() {
        let mut pool = pool();
        let tx = create_tx("reg", 1);
        pool.enqueue(tx.clone(), 0, 100).unwrap();
        let batch = pool.dequeue_batch("reg", 10, 1);

        assert_eq!(pool.commit(&[batch[0].id]), 1);
        assert_eq!(pool.location(&tx.id), TxLocation::Committed);
        assert_eq!(
            pool.enqueue(tx.clone(), 0, 200),
            Err(MempoolError::AlreadyCommitted(tx.id))
        );

        // Requeue after commit is a no-op.
        let result = pool.requeue(&batch, 300);
        assert_eq!(result.skipped, vec![tx.id]);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut pool = pool();
        let tx = create_tx("reg", 1);
        pool.enqueue(tx.clone(), 0, 100).unwrap();
        assert_eq!(
            pool.enqueue(tx.clone(), 0, 100),
            Err(MempoolError::DuplicateTransaction(tx.id))
        );
    }

    #[test]
    fn test_reject_moves_to_dead_letter() {
        let mut pool = pool();
        let tx = create_tx("reg", 1);
        pool.enqueue(tx.clone(), 0, 100).unwrap();
        let _ = pool.dequeue_batch("reg", 10, 1);

        let letter = pool.reject(&tx.id, "BrokenChain", 150).unwrap();
        assert_eq!(letter.reason, DeadLetterReason::Rejected("BrokenChain".into()));
        assert_eq!(pool.location(&tx.id), TxLocation::DeadLetter);
        assert!(pool.get(&tx.id).is_none());
        assert_eq!(
            pool.enqueue(tx.clone(), 0, 200),
            Err(MempoolError::DeadLettered(tx.id))
        );
    }

    #[test]
    fn test_expire_stale_only_pending() {
        let mut pool = pool();
        let stale = create_tx("reg", 1);
        let flying = create_tx("reg", 2);
        pool.enqueue(flying.clone(), 9, 0).unwrap();
        let _ = pool.dequeue_batch("reg", 1, 1);
        pool.enqueue(stale.clone(), 0, 0).unwrap();

        let ttl = pool.config().entry_ttl_ms;
        let expired = pool.expire_stale(ttl);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].transaction.id, stale.id);
        assert_eq!(pool.location(&stale.id), TxLocation::DeadLetter);
        assert!(matches!(pool.location(&flying.id), TxLocation::InFlight { .. }));
    }

    #[test]
    fn test_commit_clears_local_dead_letter() {
        let mut pool = pool();
        let tx = create_tx("reg", 1);
        pool.enqueue(tx.clone(), 0, 0).unwrap();
        pool.reject(&tx.id, "schema", 10).unwrap();

        pool.commit(&[tx.id]);
        assert_eq!(pool.location(&tx.id), TxLocation::Committed);
        assert!(pool.dead_letters().is_empty());
    }

    #[test]
    fn test_capacity_limits() {
        let mut pool = TransactionPool::new(MempoolConfig {
            max_transactions: 3,
            max_per_register: 2,
            ..MempoolConfig::for_testing()
        });
        pool.enqueue(create_tx("a", 1), 0, 0).unwrap();
        pool.enqueue(create_tx("a", 2), 0, 0).unwrap();
        assert!(matches!(
            pool.enqueue(create_tx("a", 3), 0, 0),
            Err(MempoolError::RegisterFull { .. })
        ));
        pool.enqueue(create_tx("b", 4), 0, 0).unwrap();
        assert!(matches!(
            pool.enqueue(create_tx("c", 5), 0, 0),
            Err(MempoolError::PoolFull { capacity: 3 })
        ));
    }

    #[test]
    fn test_exactly_one_location_under_random_ops() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut pool = pool();
        let txs: Vec<_> = (0..20).map(|i| create_tx("reg", i)).collect();
        for (i, tx) in txs.iter().enumerate() {
            pool.enqueue(tx.clone(), rng.gen_range(0..3), i as u64).unwrap();
        }

        let mut sequence = 0;
        for step in 0..200u64 {
            match rng.gen_range(0..4) {
                0 => {
                    sequence += 1;
                    let batch = pool.dequeue_batch("reg", 3, sequence);
                    if rng.gen_bool(0.5) {
                        pool.requeue(&batch, step);
                    } else {
                        let ids: Vec<_> = batch.iter().map(|t| t.id).collect();
                        pool.commit(&ids);
                    }
                }
                1 => {
                    let tx = &txs[rng.gen_range(0..txs.len())];
                    let _ = pool.reject(&tx.id, "random", step);
                }
                2 => {
                    let tx = &txs[rng.gen_range(0..txs.len())];
                    let _ = pool.enqueue(tx.clone(), 0, step);
                }
                _ => {
                    let _ = pool.expire_stale(step);
                }
            }

            let status = pool.status(step);
            let located = txs
                .iter()
                .filter(|tx| pool.location(&tx.id) != TxLocation::Unknown)
                .count();
            assert_eq!(located, txs.len());
            assert_eq!(
                status.pending_count + status.in_flight_count,
                pool.len()
            );
        }
    }

    #[test]
    fn test_snapshot_restore_returns_in_flight_to_pending() {
        let mut pool = pool();
        let a = create_tx("reg", 1);
        let b = create_tx("reg", 2);
        let c = create_tx("reg", 3);
        pool.enqueue(a.clone(), 0, 10).unwrap();
        pool.enqueue(b.clone(), 0, 20).unwrap();
        pool.enqueue(c.clone(), 0, 30).unwrap();
        let _ = pool.dequeue_batch("reg", 1, 1);
        pool.commit(&[b.id]);
        pool.reject(&c.id, "schema", 40).unwrap();

        let restored = TransactionPool::restore(MempoolConfig::for_testing(), pool.snapshot());
        assert_eq!(restored.location(&a.id), TxLocation::Pending);
        assert_eq!(restored.get(&a.id).unwrap().enqueued_at, 10);
        assert_eq!(restored.location(&b.id), TxLocation::Committed);
        assert_eq!(restored.location(&c.id), TxLocation::DeadLetter);
    }
}
