//! Value objects for the Mempool subsystem.
//!
//! Immutable types used for ordering and reporting.

use super::entities::{Timestamp, TxId};
use std::cmp::Ordering;

/// An entry reference ordered for dequeue.
///
/// Implements `Ord` such that higher priority sorts first. Ties are broken by
/// enqueue time (FIFO) then id (deterministic).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrioritizedEntry {
    pub priority: u32,
    pub enqueued_at: Timestamp,
    pub id: TxId,
}

impl PrioritizedEntry {
    pub fn new(priority: u32, enqueued_at: Timestamp, id: TxId) -> Self {
        Self {
            priority,
            enqueued_at,
            id,
        }
    }
}

impl Ord for PrioritizedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.enqueued_at.cmp(&other.enqueued_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for PrioritizedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Where a transaction currently lives.
///
/// A transaction is in exactly one of these places at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxLocation {
    Pending,
    InFlight { docket_sequence: u64 },
    Committed,
    DeadLetter,
    Unknown,
}

/// Mempool status snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MempoolStatus {
    pub pending_count: usize,
    pub in_flight_count: usize,
    pub dead_letter_count: usize,
    pub committed_cached: usize,
    /// Age of the oldest pending entry in milliseconds.
    pub oldest_pending_age_ms: u64,
}

/// Outcome of a requeue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequeueResult {
    /// In-flight entries returned to pending.
    pub requeued: Vec<TxId>,
    /// Entries that were unknown locally and re-inserted.
    pub restored: Vec<TxId>,
    /// Ids ignored because they were already pending, committed or dead-lettered.
    pub skipped: Vec<TxId>,
}

impl RequeueResult {
    /// Number of entries now pending because of this call.
    pub fn returned(&self) -> usize {
        self.requeued.len() + self.restored.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_priority_then_fifo_then_id() {
        let mut set = BTreeSet::new();
        set.insert(PrioritizedEntry::new(1, 100, [3; 32]));
        set.insert(PrioritizedEntry::new(5, 300, [2; 32]));
        set.insert(PrioritizedEntry::new(1, 50, [9; 32]));
        set.insert(PrioritizedEntry::new(1, 100, [1; 32]));

        let order: Vec<_> = set.iter().map(|e| e.id[0]).collect();
        assert_eq!(order, vec![2, 9, 1, 3]);
    }

    #[test]
    fn test_requeue_result_counts() {
        let result = RequeueResult {
            requeued: vec![[1; 32]],
            restored: vec![[2; 32]],
            skipped: vec![[3; 32]],
        };
        assert_eq!(result.returned(), 2);
    }
}
