//! Domain layer for chain validation
//!
//! - definition: workflow definitions, actions, participants, disclosures
//! - schema: the JSON-schema subset applied to action data
//! - condition: action condition expressions
//! - validator: the ordered `validate` pipeline
//! - batch: intra-docket lookup overlay

mod batch;
mod condition;
mod definition;
mod errors;
mod schema;
mod validator;

pub use batch::*;
pub use condition::*;
pub use definition::*;
pub use errors::*;
pub use schema::*;
pub use validator::*;
