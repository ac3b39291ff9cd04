//! Adapters layer
//!
//! In-memory chain view and definition provider for tests and
//! single-process simulation.

mod chain;
mod definitions;

pub use chain::*;
pub use definitions::*;
