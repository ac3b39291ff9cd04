//! # dc-04-leader-election
//!
//! Per-register leader election for docket building.
//!
//! The leader of a term is `active[term mod |active|]` over the register's
//! Active validators ordered by registration. There is no voting: a
//! follower that misses heartbeats for `leaderTimeout` increments the term
//! and every follower lands on the same next leader. A higher term seen on
//! any message supersedes the local one at once; a deposed leader learns of
//! it only through such a message.

pub mod domain;
pub mod service;

pub use domain::{
    compute_leader, ElectionError, ElectionResult, Heartbeat, LeaderElectionState,
};
pub use service::LeaderElection;
