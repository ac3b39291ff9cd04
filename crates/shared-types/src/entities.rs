//! # Core Domain Entities
//!
//! Defines the register ledger entities used by every consensus subsystem.
//!
//! ## Clusters
//!
//! - **Ledger intent**: `Transaction`, `TransactionKind`
//! - **Consensus output**: `Docket`, `DocketSignature`, `ConsensusMetadata`
//! - **Membership**: `ValidatorInfo`, `ValidatorStatus`

use crate::digest::CanonicalHasher;
use serde::{Deserialize, Serialize};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// Transaction identifier (content hash).
pub type TxId = Hash;

/// Docket identifier (header hash).
pub type DocketId = Hash;

/// Validator identifier as registered in governance.
pub type ValidatorId = String;

/// Register (ledger) identifier.
pub type RegisterId = String;

/// Timestamp in milliseconds since UNIX epoch.
pub type Timestamp = u64;

// =============================================================================
// CLUSTER A: LEDGER INTENT
// =============================================================================

/// What a transaction does on its register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// The first transaction of a register. Has no back-reference.
    GenesisAnchor,
    /// Publishes a new workflow definition or a new version of one.
    DefinitionPublication,
    /// Executes one action of a published definition.
    Action,
}

impl TransactionKind {
    fn tag(self) -> u64 {
        match self {
            Self::GenesisAnchor => 0,
            Self::DefinitionPublication => 1,
            Self::Action => 2,
        }
    }
}

/// Immutable unit of ledger intent.
///
/// INVARIANT: `previous_id` is `None` only for the register's anchor and,
/// once resolvable, never changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Content hash; equals `compute_id()` for a well formed transaction.
    pub id: TxId,
    pub kind: TransactionKind,
    pub register_id: RegisterId,
    pub definition_id: String,
    /// Target action (Action kind only).
    pub action_id: Option<u32>,
    /// Workflow instance the action belongs to (Action kind only).
    pub instance_id: Option<String>,
    /// Chain back-reference.
    pub previous_id: Option<TxId>,
    /// Participant that submitted the transaction.
    pub sender: String,
    pub data: serde_json::Value,
    /// Claimed data of the referenced transaction, for continuity checks.
    pub previous_data: Option<serde_json::Value>,
    pub signature: Vec<u8>,
    pub timestamp: Timestamp,
    pub nonce: u64,
}

impl Transaction {
    /// Hash the sender signs: every field except `id` and `signature`.
    pub fn signing_hash(&self) -> Hash {
        let mut hasher = CanonicalHasher::new("docket-chain/tx/v1");
        hasher
            .write_u64(self.kind.tag())
            .write_str(&self.register_id)
            .write_str(&self.definition_id);
        match self.action_id {
            Some(action) => hasher.write_u64(1).write_u64(u64::from(action)),
            None => hasher.write_u64(0),
        };
        hasher
            .write_opt_str(self.instance_id.as_deref())
            .write_opt_hash(self.previous_id.as_ref())
            .write_str(&self.sender)
            .write_json(&self.data);
        match &self.previous_data {
            Some(prev) => hasher.write_u64(1).write_json(prev),
            None => hasher.write_u64(0),
        };
        hasher.write_u64(self.timestamp).write_u64(self.nonce);
        hasher.finalize()
    }

    /// Compute the content-derived identifier.
    pub fn compute_id(&self) -> TxId {
        self.signing_hash()
    }

    /// Recompute and store the identifier.
    pub fn with_computed_id(mut self) -> Self {
        self.id = self.compute_id();
        self
    }

    /// Returns true for the register anchor.
    pub fn is_anchor(&self) -> bool {
        self.kind == TransactionKind::GenesisAnchor
    }
}

// =============================================================================
// CLUSTER B: CONSENSUS OUTPUT
// =============================================================================

/// A validator's signature over a docket hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocketSignature {
    pub validator_id: ValidatorId,
    pub signature: Vec<u8>,
    pub is_initiator: bool,
    pub signed_at: Timestamp,
}

/// Bookkeeping attached to a docket by the signature collector.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusMetadata {
    pub threshold_required: usize,
    pub signatures_collected: usize,
    pub timeout_ms: u64,
    /// Set when the docket reaches a terminal state.
    pub completed_at: Option<Timestamp>,
}

/// A proposed or committed batch of transactions.
///
/// Exclusively owned by the initiator until committed or abandoned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Docket {
    pub id: DocketId,
    pub register_id: RegisterId,
    pub previous_docket_id: Option<DocketId>,
    pub sequence_number: u64,
    pub transactions: Vec<Transaction>,
    pub merkle_root: Hash,
    pub initiator_id: ValidatorId,
    /// Election term the docket was built under.
    pub term: u64,
    pub signatures: Vec<DocketSignature>,
    pub created_at: Timestamp,
    pub consensus_metadata: ConsensusMetadata,
}

impl Docket {
    /// Hash of the docket header; this is what validators sign.
    pub fn hash(&self) -> Hash {
        docket_hash(
            &self.register_id,
            self.previous_docket_id.as_ref(),
            self.sequence_number,
            &self.merkle_root,
            &self.initiator_id,
            self.term,
            self.created_at,
        )
    }

    /// Ordered ids of the contained transactions.
    pub fn transaction_ids(&self) -> Vec<TxId> {
        self.transactions.iter().map(|tx| tx.id).collect()
    }

    /// The initiator's own signature, if present.
    pub fn initiator_signature(&self) -> Option<&DocketSignature> {
        self.signatures.iter().find(|s| s.is_initiator)
    }
}

/// Compute a docket header hash from its parts.
///
/// Exposed so a confirmer can hash a wire proposal without building a
/// `Docket` first.
pub fn docket_hash(
    register_id: &str,
    previous_docket_id: Option<&DocketId>,
    sequence_number: u64,
    merkle_root: &Hash,
    initiator_id: &str,
    term: u64,
    created_at: Timestamp,
) -> Hash {
    let mut hasher = CanonicalHasher::new("docket-chain/docket/v1");
    hasher
        .write_str(register_id)
        .write_opt_hash(previous_docket_id)
        .write_u64(sequence_number)
        .write_hash(merkle_root)
        .write_str(initiator_id)
        .write_u64(term)
        .write_u64(created_at);
    hasher.finalize()
}

// =============================================================================
// CLUSTER C: MEMBERSHIP
// =============================================================================

/// Lifecycle status of a registered validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidatorStatus {
    /// Registered through consent, awaiting approval.
    Pending,
    Active,
    Suspended,
    /// Terminal. Validators are never deleted.
    Removed,
}

impl ValidatorStatus {
    /// Governance transitions allowed from this status.
    pub fn can_transition_to(self, next: ValidatorStatus) -> bool {
        use ValidatorStatus::*;
        match (self, next) {
            (Removed, _) => false,
            (current, next) if current == next => false,
            (Pending, Active) | (Pending, Removed) => true,
            (Active, Suspended) | (Active, Removed) => true,
            (Suspended, Active) | (Suspended, Removed) => true,
            _ => false,
        }
    }
}

/// A validator known to a register.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub validator_id: ValidatorId,
    pub public_key: Vec<u8>,
    pub endpoint: String,
    pub status: ValidatorStatus,
    /// Registration order, used for leader rotation.
    pub order_index: u64,
    pub registered_at: Timestamp,
}

impl ValidatorInfo {
    pub fn is_active(&self) -> bool {
        self.status == ValidatorStatus::Active
    }
}
