//! Domain layer for docket consensus
//!
//! - merkle: integrity proof over ordered transaction ids
//! - proposal, messages: wire types
//! - chain_tip: local committed head per register
//! - collector: initiator-side signature counting
//! - votes: confirmer-side signed-slot log
//! - bad_actor: rejection history for governance review

mod bad_actor;
mod chain_tip;
mod collector;
mod config;
mod error;
mod merkle;
mod messages;
mod proposal;
mod votes;

pub use bad_actor::*;
pub use chain_tip::*;
pub use collector::*;
pub use config::*;
pub use error::*;
pub use merkle::*;
pub use messages::*;
pub use proposal::*;
pub use votes::*;
