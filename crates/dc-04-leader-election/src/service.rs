//! # Leader Election Service
//!
//! One writer per register at a time (`parking_lot::RwLock`); readers get
//! snapshot clones. Every state change is also pushed to a `watch` channel
//! so the docket builder can abandon in-flight work the moment it loses
//! leadership. Locks are released before any event is published.

use crate::domain::{
    compute_leader, ElectionError, ElectionResult, Heartbeat, LeaderElectionState,
};
use dc_01_registry::ValidatorRegistry;
use parking_lot::RwLock;
use shared_bus::{ConsensusEvent, EventPublisher, LeaderChangeReason};
use shared_types::{RegisterId, Timestamp, ValidatorId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct RegisterElection {
    state: LeaderElectionState,
    notifier: watch::Sender<LeaderElectionState>,
}

impl RegisterElection {
    fn publish_state(&self) {
        self.notifier.send_replace(self.state.clone());
    }
}

/// Pending bus notification, published after the lock is dropped.
struct LeaderChange {
    register_id: RegisterId,
    previous: Option<ValidatorId>,
    new: Option<ValidatorId>,
    term: u64,
    reason: LeaderChangeReason,
}

/// Rotating leader election for every register this validator serves.
pub struct LeaderElection {
    local_id: ValidatorId,
    registry: Arc<ValidatorRegistry>,
    event_bus: Arc<dyn EventPublisher>,
    registers: RwLock<HashMap<RegisterId, RegisterElection>>,
}

impl LeaderElection {
    pub fn new(
        local_id: impl Into<ValidatorId>,
        registry: Arc<ValidatorRegistry>,
        event_bus: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            registry,
            event_bus,
            registers: RwLock::new(HashMap::new()),
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Leader the rotation assigns to `term` under the current validator set.
    pub fn expected_leader(&self, register_id: &str, term: u64) -> Option<ValidatorId> {
        compute_leader(&self.registry.active_validators(register_id), term)
    }

    /// Start tracking a register at term 0. No-op if already tracked.
    pub async fn initialize(
        &self,
        register_id: &str,
        now: Timestamp,
    ) -> ElectionResult<LeaderElectionState> {
        if let Some(state) = self.snapshot(register_id) {
            return Ok(state);
        }
        let leader = self
            .expected_leader(register_id, 0)
            .ok_or_else(|| ElectionError::NoActiveValidators(register_id.to_string()))?;

        let state = {
            let mut registers = self.registers.write();
            if let Some(existing) = registers.get(register_id) {
                return Ok(existing.state.clone());
            }
            let state = LeaderElectionState::new(register_id, Some(leader.clone()), now);
            let (notifier, _) = watch::channel(state.clone());
            registers.insert(
                register_id.to_string(),
                RegisterElection {
                    state: state.clone(),
                    notifier,
                },
            );
            state
        };

        info!(
            register = %register_id,
            leader = %leader,
            is_local = leader == self.local_id,
            "[dc-04] Election initialized"
        );
        self.announce(LeaderChange {
            register_id: register_id.to_string(),
            previous: None,
            new: Some(leader),
            term: 0,
            reason: LeaderChangeReason::Initial,
        })
        .await;
        Ok(state)
    }

    pub fn snapshot(&self, register_id: &str) -> Option<LeaderElectionState> {
        self.registers
            .read()
            .get(register_id)
            .map(|r| r.state.clone())
    }

    pub fn current_leader(&self, register_id: &str) -> Option<ValidatorId> {
        self.snapshot(register_id)
            .and_then(|state| state.current_leader_id)
    }

    pub fn current_term(&self, register_id: &str) -> u64 {
        self.snapshot(register_id)
            .map(|state| state.current_term)
            .unwrap_or(0)
    }

    /// True if this validator is the leader of the register's current term.
    pub fn is_leader(&self, register_id: &str) -> bool {
        self.registers
            .read()
            .get(register_id)
            .is_some_and(|r| r.state.is_leader(&self.local_id))
    }

    /// Watch state changes of a register.
    pub fn watch(&self, register_id: &str) -> Option<watch::Receiver<LeaderElectionState>> {
        self.registers
            .read()
            .get(register_id)
            .map(|r| r.notifier.subscribe())
    }

    /// Accept a heartbeat from the leader.
    ///
    /// A lower term is rejected. A heartbeat whose sender is not the leader
    /// the rotation assigns to its term is rejected. A higher term is adopted
    /// immediately.
    pub async fn on_heartbeat(&self, heartbeat: &Heartbeat, now: Timestamp) -> ElectionResult<()> {
        self.initialize(&heartbeat.register_id, now).await?;

        let expected = self.expected_leader(&heartbeat.register_id, heartbeat.term);
        if expected.as_deref() != Some(heartbeat.leader_id.as_str()) {
            warn!(
                register = %heartbeat.register_id,
                term = heartbeat.term,
                sender = %heartbeat.leader_id,
                "[dc-04] Heartbeat from unexpected leader"
            );
            return Err(ElectionError::UnexpectedLeader {
                term: heartbeat.term,
                expected,
                actual: heartbeat.leader_id.clone(),
            });
        }

        let change = {
            let mut registers = self.registers.write();
            let Some(entry) = registers.get_mut(&heartbeat.register_id) else {
                return Err(ElectionError::NoActiveValidators(heartbeat.register_id.clone()));
            };
            let current = entry.state.current_term;
            if heartbeat.term < current {
                return Err(ElectionError::StaleTerm {
                    current,
                    received: heartbeat.term,
                });
            }
            let change = entry
                .state
                .advance(heartbeat.term, Some(heartbeat.leader_id.clone()), now)
                .map(|previous| LeaderChange {
                    register_id: heartbeat.register_id.clone(),
                    previous,
                    new: Some(heartbeat.leader_id.clone()),
                    term: heartbeat.term,
                    reason: LeaderChangeReason::HigherTerm,
                });
            entry.state.last_heartbeat_at = now;
            if change.is_some() {
                entry.publish_state();
            }
            change
        };

        debug!(
            register = %heartbeat.register_id,
            term = heartbeat.term,
            leader = %heartbeat.leader_id,
            "[dc-04] Heartbeat accepted"
        );
        if let Some(change) = change {
            self.announce(change).await;
        }
        Ok(())
    }

    /// Advance the term if the leader has been silent for `leader_timeout`.
    ///
    /// Returns the new state when the term advanced. The leader never times
    /// itself out, and the last representable term never advances.
    pub async fn on_heartbeat_timeout(
        &self,
        register_id: &str,
        now: Timestamp,
        leader_timeout: Duration,
    ) -> Option<LeaderElectionState> {
        let current = self.snapshot(register_id)?;
        if current.is_leader(&self.local_id)
            || current.silence(now) < leader_timeout.as_millis() as u64
        {
            return None;
        }

        let Some(term) = current.current_term.checked_add(1) else {
            warn!(
                register = %register_id,
                term = current.current_term,
                "[dc-04] Term space exhausted, leader kept"
            );
            return None;
        };
        let leader = self.expected_leader(register_id, term);
        let (state, change) = {
            let mut registers = self.registers.write();
            let entry = registers.get_mut(register_id)?;
            // Another path may have moved the term while the lock was free.
            if entry.state.current_term != current.current_term {
                return None;
            }
            let previous = entry.state.advance(term, leader.clone(), now)?;
            entry.publish_state();
            (
                entry.state.clone(),
                LeaderChange {
                    register_id: register_id.to_string(),
                    previous,
                    new: leader,
                    term,
                    reason: LeaderChangeReason::HeartbeatTimeout,
                },
            )
        };

        warn!(
            register = %register_id,
            term,
            silence_ms = current.silence(now),
            "[dc-04] Leader heartbeat timeout, advancing term"
        );
        self.announce(change).await;
        Some(state)
    }

    /// Adopt a higher term seen on any message (proposal, rejection).
    ///
    /// Returns true if the term advanced.
    pub async fn observe_term(&self, register_id: &str, term: u64, now: Timestamp) -> bool {
        if term <= self.current_term(register_id) {
            return false;
        }
        let leader = self.expected_leader(register_id, term);
        let change = {
            let mut registers = self.registers.write();
            let Some(entry) = registers.get_mut(register_id) else {
                return false;
            };
            let Some(previous) = entry.state.advance(term, leader.clone(), now) else {
                return false;
            };
            entry.publish_state();
            LeaderChange {
                register_id: register_id.to_string(),
                previous,
                new: leader,
                term,
                reason: LeaderChangeReason::HigherTerm,
            }
        };
        info!(register = %register_id, term, "[dc-04] Higher term observed");
        self.announce(change).await;
        true
    }

    /// Heartbeat to send to followers. Only the current leader may send one;
    /// sending also refreshes the leader's own liveness timestamp.
    pub fn make_heartbeat(
        &self,
        register_id: &str,
        latest_docket_sequence: Option<u64>,
        now: Timestamp,
    ) -> ElectionResult<Heartbeat> {
        let mut registers = self.registers.write();
        let entry = registers
            .get_mut(register_id)
            .filter(|entry| entry.state.is_leader(&self.local_id))
            .ok_or_else(|| ElectionError::NotLeader(register_id.to_string()))?;
        entry.state.last_heartbeat_at = now;
        Ok(Heartbeat {
            register_id: register_id.to_string(),
            leader_id: self.local_id.clone(),
            term: entry.state.current_term,
            timestamp: now,
            latest_docket_sequence,
        })
    }

    /// Recompute the current term's leader after membership changed.
    ///
    /// Returns true if the leader changed.
    pub async fn on_validator_set_changed(&self, register_id: &str) -> bool {
        let Some(current) = self.snapshot(register_id) else {
            return false;
        };
        let leader = self.expected_leader(register_id, current.current_term);
        let change = {
            let mut registers = self.registers.write();
            let Some(entry) = registers.get_mut(register_id) else {
                return false;
            };
            if entry.state.current_leader_id == leader {
                return false;
            }
            let previous = std::mem::replace(&mut entry.state.current_leader_id, leader.clone());
            entry.publish_state();
            LeaderChange {
                register_id: register_id.to_string(),
                previous,
                new: leader,
                term: entry.state.current_term,
                reason: LeaderChangeReason::ValidatorSetChanged,
            }
        };
        self.announce(change).await;
        true
    }

    async fn announce(&self, change: LeaderChange) {
        let Some(new_leader) = change.new else {
            warn!(
                register = %change.register_id,
                term = change.term,
                "[dc-04] No active validator to lead term"
            );
            return;
        };
        info!(
            register = %change.register_id,
            term = change.term,
            previous = ?change.previous,
            leader = %new_leader,
            reason = ?change.reason,
            "[dc-04] Leader changed"
        );
        self.event_bus
            .publish(ConsensusEvent::LeaderChanged {
                register_id: change.register_id,
                previous_leader: change.previous,
                new_leader,
                term: change.term,
                reason: change.reason,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_01_registry::{RegistrationMode, StaticGovernanceSource};
    use shared_bus::{EventFilter, EventTopic, InMemoryEventBus};
    use shared_types::{ManualTimeSource, ValidatorStatus};

    const TIMEOUT: Duration = Duration::from_millis(1_000);

    fn registry(n: usize) -> Arc<ValidatorRegistry> {
        let registry = Arc::new(ValidatorRegistry::new(
            Arc::new(StaticGovernanceSource::new()),
            Arc::new(ManualTimeSource::new(0)),
        ));
        for i in 0..n {
            registry
                .register_validator("reg", format!("v{i}"), vec![i as u8], "mem", RegistrationMode::Public)
                .unwrap();
        }
        registry
    }

    fn election(local: &str, registry: Arc<ValidatorRegistry>) -> (LeaderElection, Arc<InMemoryEventBus>) {
        let bus = Arc::new(InMemoryEventBus::new());
        (LeaderElection::new(local, registry, bus.clone()), bus)
    }

    fn heartbeat(leader: &str, term: u64) -> Heartbeat {
        Heartbeat {
            register_id: "reg".into(),
            leader_id: leader.into(),
            term,
            timestamp: 0,
            latest_docket_sequence: None,
        }
    }

    #[tokio::test]
    async fn test_initial_leader_is_first_in_order() {
        let (election, bus) = election("v1", registry(3));
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Election]));

        let state = election.initialize("reg", 0).await.unwrap();
        assert_eq!(state.current_term, 0);
        assert_eq!(election.current_leader("reg").as_deref(), Some("v0"));
        assert!(!election.is_leader("reg"));

        let event = sub.try_recv().unwrap().unwrap();
        assert!(matches!(
            event,
            ConsensusEvent::LeaderChanged { reason: LeaderChangeReason::Initial, .. }
        ));
    }

    #[tokio::test]
    async fn test_no_active_validators() {
        let (election, _) = election("v0", registry(0));
        assert_eq!(
            election.initialize("reg", 0).await,
            Err(ElectionError::NoActiveValidators("reg".into()))
        );
    }

    #[tokio::test]
    async fn test_timeout_advances_term_deterministically() {
        let registry = registry(3);
        let (a, _) = election("v1", registry.clone());
        let (b, _) = election("v2", registry);
        a.initialize("reg", 0).await.unwrap();
        b.initialize("reg", 0).await.unwrap();

        assert!(a.on_heartbeat_timeout("reg", 999, TIMEOUT).await.is_none());

        let sa = a.on_heartbeat_timeout("reg", 1_000, TIMEOUT).await.unwrap();
        let sb = b.on_heartbeat_timeout("reg", 1_000, TIMEOUT).await.unwrap();
        assert_eq!(sa.current_term, 1);
        assert_eq!(sa.current_leader_id, sb.current_leader_id);
        assert!(a.is_leader("reg"));
        assert!(!b.is_leader("reg"));
    }

    #[tokio::test]
    async fn test_leader_never_times_out_itself() {
        let (election, _) = election("v0", registry(3));
        election.initialize("reg", 0).await.unwrap();
        assert!(election.on_heartbeat_timeout("reg", 60_000, TIMEOUT).await.is_none());
    }

    #[tokio::test]
    async fn test_timeout_at_last_term_does_not_overflow() {
        let (election, _) = election("v1", registry(3));
        election.initialize("reg", 0).await.unwrap();
        assert!(election.observe_term("reg", u64::MAX, 0).await);
        let leader = election.current_leader("reg");

        assert!(election
            .on_heartbeat_timeout("reg", 600_000, TIMEOUT)
            .await
            .is_none());
        assert_eq!(election.current_term("reg"), u64::MAX);
        assert_eq!(election.current_leader("reg"), leader);
    }

    #[tokio::test]
    async fn test_heartbeat_rules() {
        let (election, _) = election("v2", registry(3));
        election.initialize("reg", 0).await.unwrap();

        election.on_heartbeat(&heartbeat("v0", 0), 500).await.unwrap();
        assert_eq!(election.snapshot("reg").unwrap().last_heartbeat_at, 500);
        assert!(election.on_heartbeat_timeout("reg", 1_400, TIMEOUT).await.is_none());

        assert!(matches!(
            election.on_heartbeat(&heartbeat("v2", 0), 600).await,
            Err(ElectionError::UnexpectedLeader { .. })
        ));

        election.on_heartbeat(&heartbeat("v1", 4), 700).await.unwrap();
        assert_eq!(election.current_term("reg"), 4);
        assert_eq!(election.current_leader("reg").as_deref(), Some("v1"));

        assert_eq!(
            election.on_heartbeat(&heartbeat("v0", 3), 800).await,
            Err(ElectionError::StaleTerm { current: 4, received: 3 })
        );
    }

    #[tokio::test]
    async fn test_observe_higher_term_demotes_leader() {
        let (election, _) = election("v0", registry(3));
        election.initialize("reg", 0).await.unwrap();
        assert!(election.is_leader("reg"));
        let mut watcher = election.watch("reg").unwrap();

        assert!(election.observe_term("reg", 2, 10).await);
        assert!(!election.is_leader("reg"));
        assert!(watcher.has_changed().unwrap());
        assert_eq!(watcher.borrow_and_update().current_term, 2);

        assert!(!election.observe_term("reg", 2, 20).await);
        assert!(!election.observe_term("reg", 1, 20).await);
    }

    #[tokio::test]
    async fn test_make_heartbeat_only_on_leader() {
        let registry = registry(2);
        let (leader, _) = election("v0", registry.clone());
        let (follower, _) = election("v1", registry);
        leader.initialize("reg", 0).await.unwrap();
        follower.initialize("reg", 0).await.unwrap();

        let hb = leader.make_heartbeat("reg", Some(7), 50).unwrap();
        assert_eq!(hb.term, 0);
        assert_eq!(hb.latest_docket_sequence, Some(7));
        assert_eq!(
            follower.make_heartbeat("reg", None, 50),
            Err(ElectionError::NotLeader("reg".into()))
        );
        follower.on_heartbeat(&hb, 50).await.unwrap();
    }

    #[tokio::test]
    async fn test_validator_set_change_recomputes_leader() {
        let registry = registry(3);
        let (election, _) = election("v1", registry.clone());
        election.initialize("reg", 0).await.unwrap();

        registry
            .set_status("reg", "v0", ValidatorStatus::Suspended)
            .unwrap();
        assert!(election.on_validator_set_changed("reg").await);
        assert!(election.is_leader("reg"));
        assert!(!election.on_validator_set_changed("reg").await);
    }
}
