//! # Shared Crypto - Signature Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Transaction, docket and peer message signing |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, no RNG dependency
//! - Malformed keys and signatures verify as `false`, never panic

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use signatures::{
    Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, Ed25519Verifier, SignatureVerifier,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
