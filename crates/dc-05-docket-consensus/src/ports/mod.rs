//! Ports for docket consensus

pub mod outbound;

pub use outbound::*;
