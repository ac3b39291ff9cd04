//! Error types for docket consensus
//!
//! [`RejectionReason`] travels on the wire back to the initiator;
//! [`ConsensusError`] stays local.

use dc_01_registry::RegistryError;
use dc_02_mempool::MempoolError;
use dc_04_leader_election::ElectionError;
use serde::{Deserialize, Serialize};
use shared_types::{short_hex, LedgerError, TransportError, TxId, ValidatorId};
use thiserror::Error;

pub type ConsensusResult<T> = Result<T, ConsensusError>;

/// Why a confirmer refused to sign a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RejectionReason {
    #[error("Stale term {proposed}, current term is {current}")]
    StaleTerm { current: u64, proposed: u64 },

    #[error("Initiator is not the leader of the term (expected {expected:?})")]
    NotLeader { expected: Option<ValidatorId> },

    #[error("Sequence {proposed} is not beyond the committed tip (next is {next})")]
    StaleSequence { next: u64, proposed: u64 },

    #[error("Previous docket does not match the committed tip")]
    PreviousDocketMismatch,

    #[error("A different docket was already signed for term {term} sequence {sequence}")]
    ConflictingProposal { term: u64, sequence: u64 },

    #[error("Transaction ids do not match the transactions")]
    TransactionSetMismatch,

    #[error("Docket id does not match its header")]
    IdMismatch,

    #[error("Invalid initiator signature")]
    InvalidInitiatorSignature,

    #[error("Invalid transaction {}: {reason}", short_hex(.transaction_id))]
    InvalidTransaction { transaction_id: TxId, reason: String },

    #[error("Merkle root mismatch")]
    InvalidMerkleRoot,

    /// A local collaborator failed; says nothing about the initiator.
    #[error("Confirmer unavailable: {detail}")]
    Unavailable { detail: String },
}

impl RejectionReason {
    /// Short label for metrics and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::StaleTerm { .. } => "stale_term",
            Self::NotLeader { .. } => "not_leader",
            Self::StaleSequence { .. } => "stale_sequence",
            Self::PreviousDocketMismatch => "previous_mismatch",
            Self::ConflictingProposal { .. } => "conflicting_proposal",
            Self::TransactionSetMismatch => "transaction_set_mismatch",
            Self::IdMismatch => "id_mismatch",
            Self::InvalidInitiatorSignature => "invalid_initiator_signature",
            Self::InvalidTransaction { .. } => "invalid_transaction",
            Self::InvalidMerkleRoot => "invalid_merkle_root",
            Self::Unavailable { .. } => "unavailable",
        }
    }

    /// Whether the rejection counts against the initiator.
    pub fn is_attributable(&self) -> bool {
        !matches!(self, Self::Unavailable { .. })
    }
}

/// Consensus error type.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Election(#[from] ElectionError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Mempool(#[from] MempoolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Proposal rejected: {0}")]
    Rejected(RejectionReason),

    #[error("Committed docket {sequence} carries {valid} valid signatures, {required} required")]
    InsufficientSignatures {
        sequence: u64,
        valid: usize,
        required: usize,
    },

    #[error("Docket id does not match its header")]
    DocketIdMismatch,

    #[error("Docket transactions do not match its merkle root")]
    DocketBodyMismatch,

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}

impl ConsensusError {
    /// Recoverable errors end the current operation only; loops keep running.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_))
    }
}
