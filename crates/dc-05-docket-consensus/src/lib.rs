//! # Docket Consensus Subsystem
//!
//! Builds dockets from the mempool, collects validator signatures up to the
//! register's threshold, commits to the ledger, and confirms proposals from
//! other initiators.
//!
//! ## Protocol
//!
//! The leader of a register's current term dequeues a batch, validates it
//! (invalid transactions are dead-lettered), computes the merkle root,
//! signs the docket header and broadcasts the proposal to the other active
//! validators. Confirmers re-run the same checks and answer with a
//! signature or a rejection. Once `signature_threshold_min` distinct valid
//! signatures are held (the initiator's included) the docket is submitted
//! to the ledger and announced. Reaching the timeout or losing leadership
//! abandons the docket and requeues its transactions.
//!
//! ## Safety
//!
//! - a confirmer signs at most one docket per (term, sequence) within the
//!   docket timeout
//! - committed sequence numbers are gapless per register
//! - a committed docket always carries at least the threshold of
//!   signatures verifying against active registry keys
//!
//! ## Usage
//!
//! ```rust,ignore
//! let engine = Arc::new(DocketEngine::new(EngineConfig::new("v0"), deps)?);
//! let handles = engine.spawn(&["reg".to_string()], inbox, shutdown_rx);
//! ```

pub mod adapters;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::{Ed25519Signer, InMemoryLedger, InMemoryNetwork, NetworkTransport, TokioClock};
pub use domain::{
    merkle_root, BadActorDetector, BadActorReport, ChainTip, CollectOutcome, ConsensusError,
    ConsensusResult, DocketProposal, EngineConfig, MerkleProof, MerkleTree, PeerEnvelope,
    PeerMessage, PriorVote, RejectionReason, SignatureCollector, VoteLog, SENTINEL_HASH,
};
pub use ports::{DocketSigner, LedgerGateway, PeerTransport};
pub use service::{AbandonReason, DocketEngine, DocketOutcome, EngineDependencies, SkipReason};
