//! # Consensus Events
//!
//! Defines all lifecycle events that flow through the shared bus. These are
//! notifications for observers; the consensus protocol itself never depends
//! on an event being delivered.

use serde::{Deserialize, Serialize};
use shared_types::entities::{DocketId, RegisterId, TxId, ValidatorId};

/// Why a register's leader changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaderChangeReason {
    /// First election for the register.
    Initial,
    /// The leader's heartbeat was not seen within the leader timeout.
    HeartbeatTimeout,
    /// A peer announced a higher term.
    HigherTerm,
    /// The active validator set changed.
    ValidatorSetChanged,
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConsensusEvent {
    // =========================================================================
    // SUBSYSTEM 1: VALIDATOR REGISTRY
    // =========================================================================
    /// A register's genesis configuration was replaced.
    ConfigChanged {
        register_id: RegisterId,
        version: u64,
    },

    // =========================================================================
    // SUBSYSTEM 2: MEMPOOL
    // =========================================================================
    /// A transaction was moved to the dead-letter store.
    TransactionDeadLettered {
        register_id: RegisterId,
        tx_id: TxId,
        reason: String,
    },

    // =========================================================================
    // SUBSYSTEM 4: LEADER ELECTION
    // =========================================================================
    /// A register elected a new leader.
    LeaderChanged {
        register_id: RegisterId,
        previous_leader: Option<ValidatorId>,
        new_leader: ValidatorId,
        term: u64,
        reason: LeaderChangeReason,
    },

    // =========================================================================
    // SUBSYSTEM 5: DOCKET CONSENSUS
    // =========================================================================
    /// A docket reached threshold and was durably committed.
    DocketCommitted {
        register_id: RegisterId,
        docket_id: DocketId,
        sequence_number: u64,
        transaction_count: usize,
        signatures: usize,
    },

    /// A docket was abandoned and its transactions re-queued.
    DocketAbandoned {
        register_id: RegisterId,
        docket_id: DocketId,
        sequence_number: u64,
        reason: String,
        requeued: usize,
    },

    /// This validator refused to sign a proposal.
    ConfirmationRejected {
        register_id: RegisterId,
        docket_id: DocketId,
        initiator_id: ValidatorId,
        reason: String,
    },

    /// A validator crossed the bad-actor rejection threshold.
    BadActorReported {
        register_id: RegisterId,
        validator_id: ValidatorId,
        rejections: u32,
    },
}

impl ConsensusEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ConfigChanged { .. } => EventTopic::Config,
            Self::TransactionDeadLettered { .. } => EventTopic::Mempool,
            Self::LeaderChanged { .. } => EventTopic::Election,
            Self::DocketCommitted { .. } | Self::DocketAbandoned { .. } => EventTopic::Docket,
            Self::ConfirmationRejected { .. } | Self::BadActorReported { .. } => {
                EventTopic::Confirmation
            }
        }
    }

    /// Get the subsystem that emits this event.
    #[must_use]
    pub fn source_subsystem(&self) -> u8 {
        match self {
            Self::ConfigChanged { .. } => 1,
            Self::TransactionDeadLettered { .. } => 2,
            Self::LeaderChanged { .. } => 4,
            Self::DocketCommitted { .. }
            | Self::DocketAbandoned { .. }
            | Self::ConfirmationRejected { .. }
            | Self::BadActorReported { .. } => 5,
        }
    }

    /// Register the event concerns.
    #[must_use]
    pub fn register_id(&self) -> &str {
        match self {
            Self::ConfigChanged { register_id, .. }
            | Self::TransactionDeadLettered { register_id, .. }
            | Self::LeaderChanged { register_id, .. }
            | Self::DocketCommitted { register_id, .. }
            | Self::DocketAbandoned { register_id, .. }
            | Self::ConfirmationRejected { register_id, .. }
            | Self::BadActorReported { register_id, .. } => register_id,
        }
    }
}

/// Event topics for filtering subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Genesis configuration events.
    Config,
    /// Mempool events.
    Mempool,
    /// Leader election events.
    Election,
    /// Docket commit/abandon events.
    Docket,
    /// Confirmer-side events.
    Confirmation,
    /// All events (wildcard).
    All,
}

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Registers to include. Empty means all registers.
    pub register_ids: Vec<RegisterId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            register_ids: Vec::new(),
        }
    }

    /// Restrict the filter to one register.
    #[must_use]
    pub fn for_register(mut self, register_id: impl Into<RegisterId>) -> Self {
        self.register_ids.push(register_id.into());
        self
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &ConsensusEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let register_match = self.register_ids.is_empty()
            || self.register_ids.iter().any(|r| r == event.register_id());

        topic_match && register_match
    }
}
