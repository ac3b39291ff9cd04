//! # dc-03-chain-validation
//!
//! Chain and transaction validation shared by initiators and confirmers.
//!
//! ## Architecture
//!
//! - [`validate`] is a pure, deterministic check of one transaction against
//!   its workflow [`Definition`], the committed chain ([`ChainLookup`]) and a
//!   signature verifier. Every validator must reach the same verdict on the
//!   same input.
//! - [`BatchLookup`] lets later transactions of a docket chain to earlier
//!   ones before anything is committed.
//! - [`DefinitionCache`] resolves definitions through the
//!   [`DefinitionProvider`] port with a bounded TTL.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let definition = cache.definition_for(&tx).await?;
//! let valid = validate(&tx, definition.as_deref(), &ledger, &Ed25519Verifier)?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryChain, StaticDefinitionProvider};
pub use domain::{
    validate, validate_schema, ActionDefinition, BatchLookup, Condition, Definition, Disclosure,
    Participant, ValidTransaction, ValidationError,
};
pub use ports::{ChainLookup, DefinitionProvider};
pub use service::DefinitionCache;
