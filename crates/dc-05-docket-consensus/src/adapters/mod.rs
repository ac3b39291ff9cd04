//! Adapters for docket consensus
//!
//! In-memory ledger and peer network, the ed25519 signer and a clock that
//! follows the tokio timer.

pub mod clock;
pub mod ledger;
pub mod network;
pub mod signer;

pub use clock::TokioClock;
pub use ledger::InMemoryLedger;
pub use network::{InMemoryNetwork, NetworkTransport};
pub use signer::Ed25519Signer;
