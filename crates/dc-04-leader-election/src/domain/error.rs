//! Error types for leader election

use shared_types::{RegisterId, ValidatorId};
use thiserror::Error;

pub type ElectionResult<T> = Result<T, ElectionError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ElectionError {
    #[error("Register {0} has no active validators")]
    NoActiveValidators(RegisterId),

    #[error("Stale term {received}, current term is {current}")]
    StaleTerm { current: u64, received: u64 },

    #[error("Unexpected leader for term {term}: expected {expected:?}, got {actual}")]
    UnexpectedLeader {
        term: u64,
        expected: Option<ValidatorId>,
        actual: ValidatorId,
    },

    #[error("Local validator is not the leader of {0}")]
    NotLeader(RegisterId),
}
