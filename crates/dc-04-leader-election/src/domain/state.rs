//! Per-register election state.

use serde::{Deserialize, Serialize};
use shared_types::{RegisterId, Timestamp, ValidatorId};

/// Leader and term of one register.
///
/// INVARIANT: `current_term` never decreases.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderElectionState {
    pub register_id: RegisterId,
    pub current_leader_id: Option<ValidatorId>,
    pub current_term: u64,
    /// Last valid heartbeat seen (or sent, on the leader).
    pub last_heartbeat_at: Timestamp,
}

impl LeaderElectionState {
    pub fn new(
        register_id: impl Into<RegisterId>,
        leader: Option<ValidatorId>,
        now: Timestamp,
    ) -> Self {
        Self {
            register_id: register_id.into(),
            current_leader_id: leader,
            current_term: 0,
            last_heartbeat_at: now,
        }
    }

    pub fn is_leader(&self, validator_id: &str) -> bool {
        self.current_leader_id.as_deref() == Some(validator_id)
    }

    /// Move to a later term. Returns the previous leader.
    ///
    /// Terms at or below the current one are ignored.
    pub fn advance(
        &mut self,
        term: u64,
        leader: Option<ValidatorId>,
        now: Timestamp,
    ) -> Option<Option<ValidatorId>> {
        if term <= self.current_term {
            return None;
        }
        self.current_term = term;
        self.last_heartbeat_at = now;
        Some(std::mem::replace(&mut self.current_leader_id, leader))
    }

    /// Milliseconds since the last heartbeat.
    pub fn silence(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.last_heartbeat_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_is_monotonic() {
        let mut state = LeaderElectionState::new("reg", Some("v0".into()), 0);
        assert_eq!(state.advance(2, Some("v2".into()), 10), Some(Some("v0".into())));
        assert_eq!(state.advance(1, Some("v1".into()), 20), None);
        assert_eq!(state.advance(2, Some("v1".into()), 20), None);
        assert_eq!(state.current_term, 2);
        assert!(state.is_leader("v2"));
        assert_eq!(state.silence(25), 15);
    }
}
