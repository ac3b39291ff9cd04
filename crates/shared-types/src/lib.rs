//! # Shared Types Crate
//!
//! This crate contains the entities that flow between the consensus
//! subsystems: transactions, dockets, validator records and the canonical
//! hashing used to identify and sign them.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Content Addressing**: Transaction and docket ids are SHA-256 digests of
//!   a canonical, length-prefixed field encoding. Every validator computes the
//!   same id for the same content.
//! - **Untrusted by Default**: Nothing in this crate assumes a value received
//!   from a peer is well formed; validation lives in the subsystems.

pub mod digest;
pub mod entities;
pub mod errors;
pub mod time;

pub use digest::{short_hex, CanonicalHasher};
pub use entities::*;
pub use errors::*;
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
