//! Core domain entities for the Mempool subsystem.
//!
//! ```text
//! [PENDING] ──dequeue──→ [IN_FLIGHT] ──commit──→ [COMMITTED]
//!    │  ↑                     │
//!    │  └──── requeue ────────┘
//!    │                        │
//!    └── expire ──→ [DEAD_LETTER] ←── reject
//! ```

pub use shared_types::{RegisterId, Timestamp, Transaction, TxId};
use serde::{Deserialize, Serialize};

/// Where an entry sits in the build pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntryState {
    /// Eligible for the next docket.
    #[default]
    Pending,
    /// Part of a docket awaiting signatures.
    InFlight {
        /// Sequence number of the docket holding the entry.
        docket_sequence: u64,
    },
}

/// A pooled transaction with its scheduling metadata.
///
/// `enqueued_at` is preserved across requeues so an abandoned transaction
/// keeps its FIFO position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MempoolEntry {
    pub transaction: Transaction,
    /// Higher is served first.
    pub priority: u32,
    pub enqueued_at: Timestamp,
    pub expires_at: Timestamp,
    pub state: EntryState,
}

impl MempoolEntry {
    pub fn new(transaction: Transaction, priority: u32, now: Timestamp, ttl_ms: u64) -> Self {
        Self {
            transaction,
            priority,
            enqueued_at: now,
            expires_at: now.saturating_add(ttl_ms),
            state: EntryState::Pending,
        }
    }

    pub fn id(&self) -> TxId {
        self.transaction.id
    }

    pub fn register_id(&self) -> &str {
        &self.transaction.register_id
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, EntryState::Pending)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, EntryState::InFlight { .. })
    }

    /// Pending entries past their expiry.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.is_pending() && now >= self.expires_at
    }
}

/// Why a transaction left the pool without being committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadLetterReason {
    /// Stayed pending past its expiry.
    Expired,
    /// Failed validation at build time.
    Rejected(String),
}

impl std::fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

/// A transaction parked for operator review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub transaction: Transaction,
    pub reason: DeadLetterReason,
    pub dead_lettered_at: Timestamp,
}

/// Mempool configuration.
#[derive(Clone, Debug)]
pub struct MempoolConfig {
    /// Maximum entries (pending plus in-flight) across all registers.
    pub max_transactions: usize,
    /// Maximum entries per register.
    pub max_per_register: usize,
    /// Time a pending entry may wait before expiring (milliseconds).
    pub entry_ttl_ms: u64,
    /// Size of the committed-id cache used to reject re-submission.
    pub committed_cache_size: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: 50_000,
            max_per_register: 10_000,
            entry_ttl_ms: 3_600_000, // 1 hour
            committed_cache_size: 100_000,
        }
    }
}

impl MempoolConfig {
    /// Creates a minimal config for testing.
    pub fn for_testing() -> Self {
        Self {
            max_transactions: 100,
            max_per_register: 50,
            entry_ttl_ms: 60_000,
            committed_cache_size: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::TransactionKind;

    fn tx() -> Transaction {
        Transaction {
            id: [1u8; 32],
            kind: TransactionKind::Action,
            register_id: "reg".into(),
            definition_id: "def".into(),
            action_id: Some(1),
            instance_id: Some("i".into()),
            previous_id: Some([0u8; 32]),
            sender: "alice".into(),
            data: serde_json::json!({}),
            previous_data: None,
            signature: vec![],
            timestamp: 0,
            nonce: 0,
        }
    }

    #[test]
    fn test_new_entry_is_pending() {
        let entry = MempoolEntry::new(tx(), 5, 1_000, 500);
        assert!(entry.is_pending());
        assert_eq!(entry.expires_at, 1_500);
        assert!(!entry.is_expired(1_499));
        assert!(entry.is_expired(1_500));
    }

    #[test]
    fn test_in_flight_never_expires() {
        let mut entry = MempoolEntry::new(tx(), 0, 0, 10);
        entry.state = EntryState::InFlight { docket_sequence: 3 };
        assert!(!entry.is_expired(1_000));
    }

    #[test]
    fn test_dead_letter_reason_display() {
        assert_eq!(DeadLetterReason::Expired.to_string(), "expired");
        assert_eq!(
            DeadLetterReason::Rejected("BrokenChain".into()).to_string(),
            "rejected: BrokenChain"
        );
    }
}
