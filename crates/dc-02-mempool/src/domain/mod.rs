//! Domain layer for the Mempool subsystem

mod entities;
mod errors;
mod persistence;
mod pool;
mod value_objects;

pub use entities::*;
pub use errors::*;
pub use persistence::*;
pub use pool::*;
pub use value_objects::*;
