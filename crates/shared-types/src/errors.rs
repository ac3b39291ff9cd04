//! # Error Types
//!
//! Collaborator errors shared across subsystems.

use crate::entities::ValidatorId;
use thiserror::Error;

/// Errors returned by the ledger/storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Docket does not extend the committed chain.
    #[error("Sequence conflict: expected {expected}, got {actual}")]
    SequenceConflict { expected: u64, actual: u64 },

    /// Docket's previous id does not match the committed tip.
    #[error("Previous docket mismatch at sequence {sequence}")]
    PreviousMismatch { sequence: u64 },

    /// Storage is not reachable.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by the peer transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Peer could not be reached this round.
    #[error("Peer unreachable: {0}")]
    Unreachable(ValidatorId),

    /// Local transport has shut down.
    #[error("Transport closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LedgerError::SequenceConflict {
            expected: 4,
            actual: 6,
        };
        assert!(err.to_string().contains("expected 4"));

        let err = TransportError::Unreachable("validator-3".into());
        assert!(err.to_string().contains("validator-3"));
    }
}
