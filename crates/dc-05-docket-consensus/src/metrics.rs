//! # Docket Consensus Metrics
//!
//! Prometheus metrics for monitoring docket throughput and confirmation
//! health.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! dc-05-docket-consensus = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `docket_committed_total` - Counter of committed dockets
//! - `docket_abandoned_total` - Counter of abandoned dockets (by reason)
//! - `docket_confirmations_rejected_total` - Counter of refused proposals (by reason)
//! - `docket_signature_collection_seconds` - Histogram of time to threshold
//! - `docket_leader_changes_total` - Counter of leadership changes seen locally

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, CounterVec, Histogram,
    IntCounter,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total dockets committed to the ledger
    pub static ref DOCKETS_COMMITTED: IntCounter = register_int_counter!(
        "docket_committed_total",
        "Total number of dockets committed"
    )
    .expect("Failed to create DOCKETS_COMMITTED metric");

    /// Total dockets abandoned, labeled by reason
    pub static ref DOCKETS_ABANDONED: CounterVec = register_counter_vec!(
        "docket_abandoned_total",
        "Total number of dockets abandoned",
        &["reason"]
    )
    .expect("Failed to create DOCKETS_ABANDONED metric");

    /// Total proposals this validator refused to sign
    pub static ref CONFIRMATIONS_REJECTED: CounterVec = register_counter_vec!(
        "docket_confirmations_rejected_total",
        "Total number of docket proposals rejected",
        &["reason"]
    )
    .expect("Failed to create CONFIRMATIONS_REJECTED metric");

    /// Time from broadcast to reaching the signature threshold
    pub static ref SIGNATURE_COLLECTION_LATENCY: Histogram = register_histogram!(
        "docket_signature_collection_seconds",
        "Time taken to collect docket signatures in seconds",
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to create SIGNATURE_COLLECTION_LATENCY metric");

    pub static ref LEADER_CHANGES: IntCounter = register_int_counter!(
        "docket_leader_changes_total",
        "Total number of leader changes observed"
    )
    .expect("Failed to create LEADER_CHANGES metric");
}

#[cfg(feature = "metrics")]
pub fn record_docket_committed() {
    DOCKETS_COMMITTED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_docket_abandoned(reason: &str) {
    DOCKETS_ABANDONED.with_label_values(&[reason]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_confirmation_rejected(reason: &str) {
    CONFIRMATIONS_REJECTED.with_label_values(&[reason]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_signature_collection_latency(seconds: f64) {
    SIGNATURE_COLLECTION_LATENCY.observe(seconds);
}

#[cfg(feature = "metrics")]
pub fn record_leader_change() {
    LEADER_CHANGES.inc();
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_docket_committed() {}

#[cfg(not(feature = "metrics"))]
pub fn record_docket_abandoned(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_confirmation_rejected(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_signature_collection_latency(_seconds: f64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_leader_change() {}
