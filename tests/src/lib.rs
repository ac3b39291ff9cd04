//! # Docket-Chain Test Suite
//!
//! Multi-validator scenarios run against real engines wired over the
//! in-memory network, a shared in-memory ledger and a paused tokio clock.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Cluster builder, transaction factories, waits
//! └── integration/
//!     ├── flows.rs      # Commit, timeout and dead-letter scenarios
//!     └── properties.rs # Quorum, gapless sequencing, no loss, leadership
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p dc-tests
//! cargo test -p dc-tests integration::properties::
//! DC_LOG_LEVEL=debug cargo test -p dc-tests -- --nocapture
//! ```

pub mod harness;
pub mod integration;
