//! Domain layer for the validator registry
//!
//! - config: consensus parameters and their governance versioning
//! - validator_set: per-register membership and status transitions

mod config;
mod error;
mod validator_set;

pub use config::*;
pub use error::*;
pub use validator_set::*;
