//! # dc-02-mempool
//!
//! Register transaction pool feeding docket builds.
//!
//! ## Lifecycle
//!
//! Transactions enter as PENDING, move to IN_FLIGHT when dequeued into a
//! docket, and leave only by:
//!
//! - inclusion in a committed docket (`commit`)
//! - build-time rejection (`reject`, to the dead-letter store with a reason)
//! - expiry while pending (`expire_stale`, to the dead-letter store)
//!
//! Abandoned dockets hand their transactions back through `requeue`, which
//! keeps the original enqueue time.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mempool = Mempool::new(MempoolConfig::default(), Arc::new(SystemTimeSource));
//! mempool.enqueue(tx, 0)?;
//! let batch = mempool.dequeue_batch("reg", 100, next_sequence);
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemoryMempoolStore;
pub use domain::{
    DeadLetter, DeadLetterReason, EntryState, MempoolConfig, MempoolEntry, MempoolError,
    MempoolSnapshot, MempoolStatus, RequeueResult, TransactionPool, TxLocation,
};
pub use ports::MempoolStore;
pub use service::Mempool;
