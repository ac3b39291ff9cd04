//! # Docket Engine
//!
//! Drives one validator's part in docket consensus for every register it
//! serves. The same engine acts as initiator while it leads a register and
//! as confirmer otherwise.
//!
//! ## Tasks
//!
//! - inbound: dispatches peer messages in arrival order
//! - election (per register): heartbeats while leading, timeout checks
//!   otherwise
//! - builder (per register): expires stale transactions and runs a build
//!   cycle while leading
//!
//! All three stop when the shutdown watch flips to `true`.
//!
//! ## Locking
//!
//! Every `parking_lot` lock is held for a map lookup or update only. None
//! is held across an await. Confirmation of one register is serialised by
//! an async mutex, so the vote log check and the vote it records cannot
//! interleave with another proposal for the same slot.

mod confirmer;
mod initiator;


pub use initiator::{AbandonReason, DocketOutcome, SkipReason};

use crate::domain::{
    BadActorDetector, BadActorReport, ChainTip, ConsensusResult, EngineConfig, PeerEnvelope,
    PeerMessage, VoteLog,
};
use crate::metrics;
use crate::ports::{DocketSigner, LedgerGateway, PeerTransport};
use dc_01_registry::{ConsensusConfig, GenesisConfigProvider, ValidatorRegistry};
use dc_02_mempool::Mempool;
use dc_03_chain_validation::{ChainLookup, DefinitionCache};
use dc_04_leader_election::LeaderElection;
use parking_lot::{Mutex, RwLock};
use shared_bus::{ConsensusEvent, EventPublisher};
use shared_crypto::SignatureVerifier;
use shared_types::{short_hex, DocketId, DocketSignature, RegisterId, TimeSource, ValidatorId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Back-off used when a register's configuration cannot be read.
const CONFIG_RETRY: Duration = Duration::from_secs(1);

/// Dependencies for DocketEngine
pub struct EngineDependencies {
    pub registry: Arc<ValidatorRegistry>,
    pub configs: Arc<GenesisConfigProvider>,
    pub election: Arc<LeaderElection>,
    pub mempool: Arc<Mempool>,
    pub definitions: Arc<DefinitionCache>,
    pub ledger: Arc<dyn LedgerGateway>,
    /// Committed transactions, for chain validation.
    pub chain: Arc<dyn ChainLookup>,
    pub signer: Arc<dyn DocketSigner>,
    pub verifier: Arc<dyn SignatureVerifier>,
    pub transport: Arc<dyn PeerTransport>,
    pub event_bus: Arc<dyn EventPublisher>,
    pub time_source: Arc<dyn TimeSource>,
}

/// Signature collection in progress on this validator.
struct Round {
    docket_id: DocketId,
    responses: mpsc::Sender<DocketSignature>,
}

/// Docket consensus engine.
pub struct DocketEngine {
    config: EngineConfig,
    registry: Arc<ValidatorRegistry>,
    configs: Arc<GenesisConfigProvider>,
    election: Arc<LeaderElection>,
    mempool: Arc<Mempool>,
    definitions: Arc<DefinitionCache>,
    ledger: Arc<dyn LedgerGateway>,
    chain: Arc<dyn ChainLookup>,
    signer: Arc<dyn DocketSigner>,
    verifier: Arc<dyn SignatureVerifier>,
    transport: Arc<dyn PeerTransport>,
    event_bus: Arc<dyn EventPublisher>,
    time_source: Arc<dyn TimeSource>,
    tips: RwLock<HashMap<RegisterId, ChainTip>>,
    votes: Mutex<HashMap<RegisterId, VoteLog>>,
    confirming: Mutex<HashMap<RegisterId, Arc<AsyncMutex<()>>>>,
    detector: Mutex<BadActorDetector>,
    rounds: Mutex<HashMap<RegisterId, Round>>,
    building: Mutex<HashSet<RegisterId>>,
}

impl DocketEngine {
    pub fn new(config: EngineConfig, deps: EngineDependencies) -> ConsensusResult<Self> {
        config.validate()?;
        if deps.signer.validator_id() != &config.validator_id
            || deps.election.local_id() != config.validator_id
        {
            return Err(crate::domain::ConsensusError::InvalidConfig(format!(
                "signer and election must act as {}",
                config.validator_id
            )));
        }
        let detector = BadActorDetector::new(config.bad_actor_report_threshold);
        Ok(Self {
            config,
            registry: deps.registry,
            configs: deps.configs,
            election: deps.election,
            mempool: deps.mempool,
            definitions: deps.definitions,
            ledger: deps.ledger,
            chain: deps.chain,
            signer: deps.signer,
            verifier: deps.verifier,
            transport: deps.transport,
            event_bus: deps.event_bus,
            time_source: deps.time_source,
            tips: RwLock::new(HashMap::new()),
            votes: Mutex::new(HashMap::new()),
            confirming: Mutex::new(HashMap::new()),
            detector: Mutex::new(detector),
            rounds: Mutex::new(HashMap::new()),
            building: Mutex::new(HashSet::new()),
        })
    }

    pub fn validator_id(&self) -> &ValidatorId {
        &self.config.validator_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    pub fn election(&self) -> &Arc<LeaderElection> {
        &self.election
    }

    /// Locally known committed head, if loaded.
    pub fn tip(&self, register_id: &str) -> Option<ChainTip> {
        self.tips.read().get(register_id).copied()
    }

    /// Initiators whose proposals this validator refused at least
    /// `min_rejections` times.
    pub fn suspects(&self, min_rejections: u32) -> Vec<BadActorReport> {
        self.detector.lock().suspects(min_rejections)
    }

    /// Reports queued for governance since the last drain.
    pub fn drain_bad_actor_reports(&self) -> Vec<BadActorReport> {
        self.detector.lock().drain_reports()
    }

    // === MESSAGE DISPATCH ===

    /// Handle one peer message. Malformed or unexpected messages are logged
    /// and dropped.
    pub async fn handle_message(&self, from: &ValidatorId, message: PeerMessage) {
        match message {
            PeerMessage::Heartbeat(heartbeat) => {
                if heartbeat.leader_id != *from {
                    warn!(
                        from = %from,
                        leader = %heartbeat.leader_id,
                        "[dc-05] Relayed heartbeat dropped"
                    );
                    return;
                }
                self.on_heartbeat(heartbeat).await;
            }
            PeerMessage::Proposal(proposal) => {
                if proposal.initiator_id != *from {
                    warn!(
                        from = %from,
                        initiator = %proposal.initiator_id,
                        "[dc-05] Relayed proposal dropped"
                    );
                    return;
                }
                self.on_proposal(from, proposal).await;
            }
            PeerMessage::SignatureResponse {
                register_id,
                docket_id,
                signature,
                ..
            } => {
                if signature.validator_id != *from {
                    warn!(
                        from = %from,
                        signer = %signature.validator_id,
                        "[dc-05] Relayed signature dropped"
                    );
                    return;
                }
                self.route_signature(&register_id, &docket_id, signature);
            }
            PeerMessage::Rejection {
                register_id,
                docket_id,
                validator_id,
                term,
                reason,
            } => {
                if validator_id != *from {
                    warn!(
                        from = %from,
                        rejector = %validator_id,
                        "[dc-05] Relayed rejection dropped"
                    );
                    return;
                }
                if !self.is_active_round(&register_id, &docket_id) {
                    debug!(
                        register = %register_id,
                        from = %from,
                        "[dc-05] Rejection for no active round dropped"
                    );
                    return;
                }
                if let Err(e) = self.registry.active_public_key(&register_id, from).await {
                    warn!(
                        register = %register_id,
                        from = %from,
                        error = %e,
                        "[dc-05] Rejection from non-validator dropped"
                    );
                    return;
                }
                info!(
                    register = %register_id,
                    docket = %short_hex(&docket_id),
                    validator = %validator_id,
                    reason = %reason,
                    "[dc-05] Proposal rejected by peer"
                );
                let now = self.time_source.now();
                if self.election.observe_term(&register_id, term, now).await {
                    metrics::record_leader_change();
                }
            }
            PeerMessage::Committed(docket) => {
                let register_id = docket.register_id.clone();
                let sequence = docket.sequence_number;
                if let Err(e) = self.accept_committed(docket).await {
                    warn!(
                        register = %register_id,
                        sequence,
                        error = %e,
                        "[dc-05] Committed docket notification refused"
                    );
                }
            }
        }
    }

    fn is_active_round(&self, register_id: &str, docket_id: &DocketId) -> bool {
        self.rounds
            .lock()
            .get(register_id)
            .is_some_and(|round| round.docket_id == *docket_id)
    }

    /// Async lock serialising confirmation for one register.
    fn confirm_lock(&self, register_id: &str) -> Arc<AsyncMutex<()>> {
        self.confirming
            .lock()
            .entry(register_id.to_string())
            .or_default()
            .clone()
    }

    fn route_signature(&self, register_id: &str, docket_id: &DocketId, signature: DocketSignature) {
        let rounds = self.rounds.lock();
        match rounds.get(register_id) {
            Some(round) if round.docket_id == *docket_id => {
                if round.responses.try_send(signature).is_err() {
                    debug!(register = %register_id, "[dc-05] Signature queue full, response dropped");
                }
            }
            _ => debug!(register = %register_id, "[dc-05] Signature for no active round dropped"),
        }
    }

    // === TASKS ===

    /// Spawn the inbound task and the per-register election and builder
    /// tasks.
    pub fn spawn(
        self: &Arc<Self>,
        registers: &[RegisterId],
        inbox: mpsc::Receiver<PeerEnvelope>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = vec![tokio::spawn(
            Arc::clone(self).run_inbound(inbox, shutdown.clone()),
        )];
        for register_id in registers {
            handles.push(tokio::spawn(
                Arc::clone(self).run_election(register_id.clone(), shutdown.clone()),
            ));
            handles.push(tokio::spawn(
                Arc::clone(self).run_builder(register_id.clone(), shutdown.clone()),
            ));
        }
        handles
    }

    pub async fn run_inbound(
        self: Arc<Self>,
        mut inbox: mpsc::Receiver<PeerEnvelope>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                envelope = inbox.recv() => {
                    let Some(PeerEnvelope { from, message }) = envelope else {
                        break;
                    };
                    self.handle_message(&from, message).await;
                }
            }
        }
        debug!(validator = %self.config.validator_id, "[dc-05] Inbound loop stopped");
    }

    pub async fn run_election(
        self: Arc<Self>,
        register_id: RegisterId,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let pause = match self.current_config(&register_id).await {
                Some(config) => {
                    self.election_tick(&register_id, &config).await;
                    config.heartbeat_interval
                }
                None => CONFIG_RETRY,
            };
            if wait_or_shutdown(&mut shutdown, pause).await {
                break;
            }
        }
        debug!(register = %register_id, "[dc-05] Election loop stopped");
    }

    pub async fn run_builder(
        self: Arc<Self>,
        register_id: RegisterId,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let pause = match self.current_config(&register_id).await {
                Some(config) => {
                    self.expire_stale().await;
                    match self.run_build_cycle(&register_id).await {
                        Ok(outcome) => debug!(
                            register = %register_id,
                            outcome = outcome.label(),
                            "[dc-05] Build cycle finished"
                        ),
                        Err(e) => {
                            warn!(register = %register_id, error = %e, "[dc-05] Build cycle failed")
                        }
                    }
                    config.docket_build_interval
                }
                None => CONFIG_RETRY,
            };
            if wait_or_shutdown(&mut shutdown, pause).await {
                break;
            }
        }
        debug!(register = %register_id, "[dc-05] Builder loop stopped");
    }

    /// One election step: heartbeat if leading, otherwise check the leader's
    /// liveness.
    pub async fn election_tick(&self, register_id: &str, config: &ConsensusConfig) {
        let now = self.time_source.now();
        if let Err(e) = self.election.initialize(register_id, now).await {
            warn!(register = %register_id, error = %e, "[dc-05] Election not initialized");
            return;
        }
        match self.registry.refresh(register_id).await {
            Ok(true) => {
                if self.election.on_validator_set_changed(register_id).await {
                    metrics::record_leader_change();
                }
            }
            Ok(false) => {}
            Err(e) => {
                debug!(register = %register_id, error = %e, "[dc-05] Membership refresh failed")
            }
        }

        if !self.election.is_leader(register_id)
            && self
                .election
                .on_heartbeat_timeout(register_id, now, config.leader_timeout)
                .await
                .is_some()
        {
            metrics::record_leader_change();
        }
        if self.election.is_leader(register_id) {
            self.send_heartbeat(register_id).await;
        }
    }

    async fn send_heartbeat(&self, register_id: &str) {
        let latest = self.tip(register_id).and_then(|tip| tip.last_sequence);
        let now = self.time_source.now();
        let Ok(heartbeat) = self.election.make_heartbeat(register_id, latest, now) else {
            return;
        };
        let peers = self.peers(register_id);
        let failures = self
            .transport
            .broadcast(&peers, PeerMessage::Heartbeat(heartbeat))
            .await;
        if !failures.is_empty() {
            debug!(
                register = %register_id,
                unreachable = failures.len(),
                "[dc-05] Heartbeat not delivered to all peers"
            );
        }
    }

    async fn expire_stale(&self) {
        for letter in self.mempool.expire_stale() {
            self.event_bus
                .publish(ConsensusEvent::TransactionDeadLettered {
                    register_id: letter.transaction.register_id.clone(),
                    tx_id: letter.transaction.id,
                    reason: letter.reason.to_string(),
                })
                .await;
        }
    }

    // === SHARED HELPERS ===

    async fn current_config(&self, register_id: &str) -> Option<ConsensusConfig> {
        match self.configs.get(register_id).await {
            Ok(versioned) => Some(versioned.config),
            Err(e) => {
                warn!(register = %register_id, error = %e, "[dc-05] Consensus config unavailable");
                None
            }
        }
    }

    /// Active validators of a register other than this one.
    fn peers(&self, register_id: &str) -> Vec<ValidatorId> {
        self.registry
            .active_validators(register_id)
            .into_iter()
            .map(|v| v.validator_id)
            .filter(|id| *id != self.config.validator_id)
            .collect()
    }

    /// Committed head of a register, loaded from the ledger on first use.
    async fn chain_tip(&self, register_id: &str) -> ConsensusResult<ChainTip> {
        if let Some(tip) = self.tip(register_id) {
            return Ok(tip);
        }
        let latest = self.ledger.get_latest_committed_docket(register_id).await?;
        let loaded = ChainTip::bootstrap(latest.as_ref());
        let mut tips = self.tips.write();
        let tip = tips.entry(register_id.to_string()).or_insert(loaded);
        if loaded.next_sequence() > tip.next_sequence() {
            *tip = loaded;
        }
        Ok(*tip)
    }

    /// Drop the cached head so the next read goes to the ledger.
    fn invalidate_tip(&self, register_id: &str) {
        self.tips.write().remove(register_id);
    }

    fn advance_tip(&self, register_id: &str, sequence: u64, docket_id: DocketId) -> bool {
        let advanced = self
            .tips
            .write()
            .entry(register_id.to_string())
            .or_default()
            .advance(sequence, docket_id);
        if advanced {
            if let Some(log) = self.votes.lock().get_mut(register_id) {
                log.prune_below(sequence + 1);
            }
        }
        advanced
    }

    /// Check a collected or relayed signature against the registry key of
    /// its validator.
    async fn signature_valid(
        &self,
        register_id: &str,
        docket_id: &DocketId,
        signature: &DocketSignature,
    ) -> bool {
        match self
            .registry
            .active_public_key(register_id, &signature.validator_id)
            .await
        {
            Ok(key) => self.verifier.verify(docket_id, &signature.signature, &key),
            Err(e) => {
                debug!(
                    register = %register_id,
                    validator = %signature.validator_id,
                    error = %e,
                    "[dc-05] Signature from non-active validator ignored"
                );
                false
            }
        }
    }
}

/// Sleep for `pause`; returns true if shutdown was requested meanwhile.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, pause: Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(pause) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
