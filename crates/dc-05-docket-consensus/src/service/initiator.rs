//! Initiator side: build, broadcast, collect, commit.
//!
//! A build cycle either commits a docket, abandons it (every transaction
//! goes back to the mempool) or is skipped before anything leaves the
//! mempool. Committed sequence numbers stay gapless: an abandoned docket's
//! sequence is reused by the next attempt.

use super::{DocketEngine, Round};
use crate::domain::{
    merkle_root, ConsensusError, ConsensusResult, DocketProposal, PeerMessage, SignatureCollector,
};
use crate::metrics;
use dc_01_registry::ConsensusConfig;
use dc_03_chain_validation::{validate, BatchLookup};
use dc_04_leader_election::LeaderElectionState;
use shared_bus::ConsensusEvent;
use shared_types::{
    short_hex, ConsensusMetadata, Docket, DocketSignature, RegisterId, Transaction, TxId,
};
use std::collections::HashSet;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Result of one build cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum DocketOutcome {
    Committed(Docket),
    Abandoned { docket: Docket, reason: AbandonReason },
    Skipped(SkipReason),
}

impl DocketOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Committed(_) => "committed",
            Self::Abandoned { .. } => "abandoned",
            Self::Skipped(_) => "skipped",
        }
    }

    pub fn docket(&self) -> Option<&Docket> {
        match self {
            Self::Committed(docket) | Self::Abandoned { docket, .. } => Some(docket),
            Self::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    /// Threshold not reached within the docket timeout.
    Timeout,
    /// The term moved on or another validator leads it.
    LeadershipLost,
    LedgerFailure(String),
}

impl AbandonReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::LeadershipLost => "leadership_lost",
            Self::LedgerFailure(_) => "ledger_failure",
        }
    }
}

impl std::fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LedgerFailure(detail) => write!(f, "ledger failure: {detail}"),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotLeader,
    AlreadyBuilding,
    EmptyMempool,
    NoValidTransactions,
}

/// How signature collection ended.
enum Collection {
    Complete,
    TimedOut,
    LeadershipLost,
}

/// Marks a register as building for as long as it lives.
struct BuildGuard<'a> {
    engine: &'a DocketEngine,
    register_id: RegisterId,
}

impl<'a> BuildGuard<'a> {
    fn acquire(engine: &'a DocketEngine, register_id: &str) -> Option<Self> {
        if !engine.building.lock().insert(register_id.to_string()) {
            return None;
        }
        Some(Self {
            engine,
            register_id: register_id.to_string(),
        })
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.engine.rounds.lock().remove(&self.register_id);
        self.engine.building.lock().remove(&self.register_id);
    }
}

impl DocketEngine {
    /// Run one build cycle for a register this validator leads.
    pub async fn run_build_cycle(&self, register_id: &str) -> ConsensusResult<DocketOutcome> {
        if !self.election.is_leader(register_id) {
            return Ok(DocketOutcome::Skipped(SkipReason::NotLeader));
        }
        let Some(_guard) = BuildGuard::acquire(self, register_id) else {
            return Ok(DocketOutcome::Skipped(SkipReason::AlreadyBuilding));
        };
        let Some(mut leadership) = self.election.watch(register_id) else {
            return Ok(DocketOutcome::Skipped(SkipReason::NotLeader));
        };
        let term = {
            let state = leadership.borrow_and_update();
            if !state.is_leader(&self.config.validator_id) {
                return Ok(DocketOutcome::Skipped(SkipReason::NotLeader));
            }
            state.current_term
        };

        let config = self.configs.get(register_id).await?.config;
        let tip = self.chain_tip(register_id).await?;
        let sequence = tip.next_sequence();

        let batch = self
            .mempool
            .dequeue_batch(register_id, config.max_transactions_per_docket, sequence);
        if batch.is_empty() {
            return Ok(DocketOutcome::Skipped(SkipReason::EmptyMempool));
        }
        let transactions = self.select_valid(register_id, batch).await;
        if transactions.is_empty() {
            return Ok(DocketOutcome::Skipped(SkipReason::NoValidTransactions));
        }

        let now = self.time_source.now();
        let ids: Vec<TxId> = transactions.iter().map(|tx| tx.id).collect();
        let mut docket = Docket {
            id: [0u8; 32],
            register_id: register_id.to_string(),
            previous_docket_id: tip.previous_id(),
            sequence_number: sequence,
            merkle_root: merkle_root(&ids),
            transactions,
            initiator_id: self.config.validator_id.clone(),
            term,
            signatures: Vec::new(),
            created_at: now,
            consensus_metadata: ConsensusMetadata {
                threshold_required: config.signature_threshold_min,
                signatures_collected: 0,
                timeout_ms: config.docket_timeout.as_millis() as u64,
                completed_at: None,
            },
        };
        docket.id = docket.hash();

        let signature = match self.signer.sign(&docket.id) {
            Ok(signature) => signature,
            Err(e) => {
                self.mempool.requeue(&docket.transactions);
                return Err(ConsensusError::Signing(e));
            }
        };
        let initiator_signature = DocketSignature {
            validator_id: self.config.validator_id.clone(),
            signature,
            is_initiator: true,
            signed_at: now,
        };
        docket.signatures.push(initiator_signature.clone());

        info!(
            register = %register_id,
            sequence,
            term,
            docket = %short_hex(&docket.id),
            transactions = docket.transactions.len(),
            "[dc-05] Docket proposed"
        );

        let collector = SignatureCollector::new(
            docket.id,
            config.signature_threshold_min,
            config.signature_threshold_max,
            initiator_signature,
        );
        let (collector, collection) = self
            .collect(&mut docket, collector, &config, term, &mut leadership)
            .await;

        match collection {
            Collection::Complete => {
                docket.signatures = collector.into_signatures();
                Ok(self.commit(docket).await)
            }
            Collection::TimedOut => {
                docket.consensus_metadata.signatures_collected = collector.count();
                Ok(self.abandon(docket, AbandonReason::Timeout).await)
            }
            Collection::LeadershipLost => {
                docket.consensus_metadata.signatures_collected = collector.count();
                Ok(self.abandon(docket, AbandonReason::LeadershipLost).await)
            }
        }
    }

    /// Validate a dequeued batch in order, each transaction seeing the ones
    /// accepted before it. Invalid transactions are dead-lettered; those
    /// that cannot be judged right now go back to the mempool.
    pub(super) async fn select_valid(
        &self,
        register_id: &str,
        batch: Vec<Transaction>,
    ) -> Vec<Transaction> {
        let mut lookup = BatchLookup::new(self.chain.as_ref());
        let mut accepted = Vec::with_capacity(batch.len());
        let mut deferred = Vec::new();
        let mut seen = HashSet::with_capacity(batch.len());

        for transaction in batch {
            if !seen.insert(transaction.id) {
                continue;
            }
            if self.chain.get_transaction(&transaction.id).is_some() {
                self.mempool.commit(&[transaction.id]);
                continue;
            }
            let verdict = match self.definitions.definition_for(&transaction).await {
                Ok(definition) => validate(
                    &transaction,
                    definition.as_deref(),
                    &lookup,
                    self.verifier.as_ref(),
                ),
                Err(e) => Err(e),
            };
            match verdict {
                Ok(valid) => {
                    lookup.accept(valid.transaction().clone());
                    accepted.push(valid.into_inner());
                }
                Err(e) if e.is_transient() => {
                    debug!(
                        register = %register_id,
                        tx = %short_hex(&transaction.id),
                        error = %e,
                        "[dc-05] Transaction deferred"
                    );
                    deferred.push(transaction);
                }
                Err(e) => self.dead_letter(&transaction, e.to_string()).await,
            }
        }

        if !deferred.is_empty() {
            self.mempool.requeue(&deferred);
        }
        accepted
    }

    async fn dead_letter(&self, transaction: &Transaction, reason: String) {
        match self.mempool.reject(&transaction.id, reason) {
            Ok(letter) => {
                self.event_bus
                    .publish(ConsensusEvent::TransactionDeadLettered {
                        register_id: transaction.register_id.clone(),
                        tx_id: transaction.id,
                        reason: letter.reason.to_string(),
                    })
                    .await;
            }
            Err(e) => {
                warn!(tx = %short_hex(&transaction.id), error = %e, "[dc-05] Dead-letter failed")
            }
        }
    }

    /// Broadcast the proposal and gather signatures until the threshold, the
    /// timeout or a leadership change.
    async fn collect(
        &self,
        docket: &mut Docket,
        mut collector: SignatureCollector,
        config: &ConsensusConfig,
        term: u64,
        leadership: &mut watch::Receiver<LeaderElectionState>,
    ) -> (SignatureCollector, Collection) {
        let register_id = docket.register_id.clone();
        let capacity = config.signature_threshold_max.max(1) * 2;
        let (responses, mut inbox) = mpsc::channel(capacity);
        self.rounds.lock().insert(
            register_id.clone(),
            Round {
                docket_id: docket.id,
                responses,
            },
        );

        let started = Instant::now();
        let deadline = started + config.docket_timeout;
        if let Some(proposal) = DocketProposal::from_docket(docket) {
            let peers = self.peers(&register_id);
            let failures = self
                .transport
                .broadcast(&peers, PeerMessage::Proposal(proposal))
                .await;
            for (peer, error) in failures {
                debug!(
                    register = %register_id,
                    peer = %peer,
                    error = %error,
                    "[dc-05] Proposal not delivered"
                );
            }
        }

        let collection = loop {
            if collector.status().is_complete() {
                metrics::record_signature_collection_latency(started.elapsed().as_secs_f64());
                break Collection::Complete;
            }
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break Collection::TimedOut,
                changed = leadership.changed() => {
                    let still_leading = changed.is_ok() && {
                        let state = leadership.borrow_and_update();
                        state.current_term == term && state.is_leader(&self.config.validator_id)
                    };
                    if !still_leading {
                        break Collection::LeadershipLost;
                    }
                }
                Some(signature) = inbox.recv() => {
                    if signature.is_initiator
                        || !self.signature_valid(&register_id, &docket.id, &signature).await
                    {
                        debug!(
                            register = %register_id,
                            validator = %signature.validator_id,
                            "[dc-05] Invalid signature ignored"
                        );
                        continue;
                    }
                    collector.add(&docket.id, signature);
                }
            }
        };

        self.rounds.lock().remove(&register_id);
        docket.consensus_metadata.signatures_collected = collector.count();
        (collector, collection)
    }

    async fn commit(&self, mut docket: Docket) -> DocketOutcome {
        let register_id = docket.register_id.clone();
        docket.consensus_metadata.signatures_collected = docket.signatures.len();
        docket.consensus_metadata.completed_at = Some(self.time_source.now());

        if let Err(e) = self.ledger.submit_docket(docket.clone()).await {
            // The ledger may hold a head we have not seen.
            self.invalidate_tip(&register_id);
            return self
                .abandon(docket, AbandonReason::LedgerFailure(e.to_string()))
                .await;
        }

        let ids = docket.transaction_ids();
        self.mempool.commit(&ids);
        self.advance_tip(&register_id, docket.sequence_number, docket.id);

        let peers = self.peers(&register_id);
        self.transport
            .broadcast(&peers, PeerMessage::Committed(docket.clone()))
            .await;

        metrics::record_docket_committed();
        info!(
            register = %register_id,
            sequence = docket.sequence_number,
            docket = %short_hex(&docket.id),
            signatures = docket.signatures.len(),
            "[dc-05] Docket committed"
        );
        self.event_bus
            .publish(ConsensusEvent::DocketCommitted {
                register_id,
                docket_id: docket.id,
                sequence_number: docket.sequence_number,
                transaction_count: ids.len(),
                signatures: docket.signatures.len(),
            })
            .await;
        DocketOutcome::Committed(docket)
    }

    async fn abandon(&self, mut docket: Docket, reason: AbandonReason) -> DocketOutcome {
        docket.consensus_metadata.completed_at = Some(self.time_source.now());
        let requeued = self.mempool.requeue(&docket.transactions).returned();

        metrics::record_docket_abandoned(reason.label());
        warn!(
            register = %docket.register_id,
            sequence = docket.sequence_number,
            docket = %short_hex(&docket.id),
            signatures = docket.consensus_metadata.signatures_collected,
            required = docket.consensus_metadata.threshold_required,
            reason = %reason,
            "[dc-05] Docket abandoned"
        );
        self.event_bus
            .publish(ConsensusEvent::DocketAbandoned {
                register_id: docket.register_id.clone(),
                docket_id: docket.id,
                sequence_number: docket.sequence_number,
                reason: reason.to_string(),
                requeued,
            })
            .await;
        DocketOutcome::Abandoned { docket, reason }
    }
}
