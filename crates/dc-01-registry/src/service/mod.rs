//! Registry services

mod genesis;
mod registry;

pub use genesis::{ConfigHandle, GenesisConfigProvider};
pub use registry::ValidatorRegistry;
