//! # Shared Bus - Consensus Lifecycle Events
//!
//! Subsystems publish lifecycle notifications (leader changes, docket
//! commits and abandonments, rejections, configuration changes) for
//! observers such as telemetry and the test harness.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Subsystem A  │                    │   Observer   │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Peer-to-peer protocol messages do NOT travel over this bus; they use the
//! `PeerTransport` port of the docket consensus crate.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{ConsensusEvent, EventFilter, EventTopic, LeaderChangeReason};
pub use publisher::{EventPublisher, InMemoryEventBus, NoopPublisher};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
