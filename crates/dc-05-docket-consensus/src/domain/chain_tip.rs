//! Locally tracked head of a register's committed docket chain.

use shared_types::{Docket, DocketId};

/// Last committed docket of a register.
///
/// Bootstrapped once from the ledger, then advanced locally on every
/// commit. An empty tip means nothing is committed yet: the next docket
/// has sequence 0 and no previous id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainTip {
    pub last_sequence: Option<u64>,
    pub last_docket_id: Option<DocketId>,
}

impl ChainTip {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bootstrap(latest: Option<&Docket>) -> Self {
        match latest {
            Some(docket) => Self {
                last_sequence: Some(docket.sequence_number),
                last_docket_id: Some(docket.id),
            },
            None => Self::empty(),
        }
    }

    pub fn next_sequence(&self) -> u64 {
        self.last_sequence.map_or(0, |s| s + 1)
    }

    pub fn previous_id(&self) -> Option<DocketId> {
        self.last_docket_id
    }

    /// Move to a committed docket at or beyond the next sequence.
    ///
    /// Returns false for a docket the tip has already passed.
    pub fn advance(&mut self, sequence: u64, docket_id: DocketId) -> bool {
        if sequence < self.next_sequence() {
            return false;
        }
        self.last_sequence = Some(sequence);
        self.last_docket_id = Some(docket_id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tip() {
        let tip = ChainTip::bootstrap(None);
        assert_eq!(tip.next_sequence(), 0);
        assert_eq!(tip.previous_id(), None);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut tip = ChainTip::empty();
        assert!(tip.advance(0, [1; 32]));
        assert!(tip.advance(1, [2; 32]));
        assert!(!tip.advance(1, [3; 32]));
        assert!(!tip.advance(0, [4; 32]));
        assert_eq!(tip.next_sequence(), 2);
        assert_eq!(tip.previous_id(), Some([2; 32]));

        // A lagging confirmer may skip ahead.
        assert!(tip.advance(5, [5; 32]));
        assert_eq!(tip.next_sequence(), 6);
    }
}
