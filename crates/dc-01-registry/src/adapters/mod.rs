//! Adapters layer
//!
//! In-memory governance source for tests and single-process simulation.

mod governance;

pub use governance::*;
