//! Domain layer for leader election

mod error;
mod heartbeat;
mod rotation;
mod state;

pub use error::*;
pub use heartbeat::*;
pub use rotation::*;
pub use state::*;
