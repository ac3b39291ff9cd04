//! Confirmer side: judge proposals, follow heartbeats and commits.
//!
//! A proposal is checked in a fixed order and the first failure is the
//! rejection reason:
//!
//! 1. term (stale terms are refused)
//! 2. initiator is the leader of the proposal's term
//! 3. sequence and previous docket against the committed tip
//! 4. no different docket signed for the same term and sequence
//! 5. transaction ids match the carried transactions
//! 6. docket id matches the header
//! 7. initiator signature
//! 8. every transaction, in order, as the initiator validated it
//! 9. merkle root
//!
//! A higher term is adopted only once the initiator signature verifies.
//! Confirmations of one register run one at a time.

use super::DocketEngine;
use crate::domain::{
    body_matches_header, ConsensusError, ConsensusResult, DocketProposal, PeerMessage, PriorVote,
    RejectionReason,
};
use crate::metrics;
use dc_01_registry::RegistryError;
use dc_03_chain_validation::{validate, BatchLookup};
use dc_04_leader_election::Heartbeat;
use shared_bus::ConsensusEvent;
use shared_types::{short_hex, Docket, DocketSignature, ValidatorId};
use std::collections::HashSet;
use tracing::{debug, info, warn};

fn unavailable(detail: impl ToString) -> RejectionReason {
    RejectionReason::Unavailable {
        detail: detail.to_string(),
    }
}

impl DocketEngine {
    /// Decide whether to sign a proposal.
    ///
    /// Signing the same docket twice returns the stored signature.
    pub async fn confirm(
        &self,
        proposal: &DocketProposal,
    ) -> Result<DocketSignature, RejectionReason> {
        let register_id = proposal.register_id.as_str();
        let slot = self.confirm_lock(register_id);
        let _confirming = slot.lock().await;
        let now = self.time_source.now();
        let config = self
            .configs
            .get(register_id)
            .await
            .map_err(unavailable)?
            .config;

        self.election
            .initialize(register_id, now)
            .await
            .map_err(unavailable)?;
        let current = self.election.current_term(register_id);
        if proposal.term < current {
            return Err(RejectionReason::StaleTerm {
                current,
                proposed: proposal.term,
            });
        }
        let expected = self.election.expected_leader(register_id, proposal.term);
        if expected.as_deref() != Some(proposal.initiator_id.as_str()) {
            return Err(RejectionReason::NotLeader { expected });
        }

        let mut tip = self.chain_tip(register_id).await.map_err(unavailable)?;
        if proposal.sequence_number > tip.next_sequence() {
            // We may have missed a commit notification.
            self.invalidate_tip(register_id);
            tip = self.chain_tip(register_id).await.map_err(unavailable)?;
        }
        let next = tip.next_sequence();
        if proposal.sequence_number < next {
            return Err(RejectionReason::StaleSequence {
                next,
                proposed: proposal.sequence_number,
            });
        }
        if proposal.sequence_number != next || proposal.previous_docket_id != tip.previous_id() {
            return Err(RejectionReason::PreviousDocketMismatch);
        }

        let timeout_ms = config.docket_timeout.as_millis() as u64;
        let prior = self
            .votes
            .lock()
            .entry(register_id.to_string())
            .or_default()
            .check(proposal.term, proposal.sequence_number, &proposal.id, now, timeout_ms);
        match prior {
            PriorVote::Same(signature) => return Ok(signature),
            PriorVote::Conflicting(_) => {
                return Err(RejectionReason::ConflictingProposal {
                    term: proposal.term,
                    sequence: proposal.sequence_number,
                })
            }
            PriorVote::None => {}
        }

        if !proposal.transaction_set_consistent() {
            return Err(RejectionReason::TransactionSetMismatch);
        }
        if proposal.header_hash() != proposal.id {
            return Err(RejectionReason::IdMismatch);
        }

        let initiator_key = match self
            .registry
            .active_public_key(register_id, &proposal.initiator_id)
            .await
        {
            Ok(key) => key,
            Err(
                RegistryError::UnknownValidator { .. } | RegistryError::InactiveValidator { .. },
            ) => return Err(RejectionReason::InvalidInitiatorSignature),
            Err(e) => return Err(unavailable(e)),
        };
        if !self
            .verifier
            .verify(&proposal.id, &proposal.initiator_signature, &initiator_key)
        {
            return Err(RejectionReason::InvalidInitiatorSignature);
        }
        if proposal.term > current
            && self
                .election
                .observe_term(register_id, proposal.term, now)
                .await
        {
            metrics::record_leader_change();
        }

        self.check_transactions(proposal).await?;

        if proposal.recomputed_merkle_root() != proposal.merkle_root {
            return Err(RejectionReason::InvalidMerkleRoot);
        }

        let signature = self.signer.sign(&proposal.id).map_err(unavailable)?;
        let signature = DocketSignature {
            validator_id: self.config.validator_id.clone(),
            signature,
            is_initiator: false,
            signed_at: now,
        };
        self.votes
            .lock()
            .entry(register_id.to_string())
            .or_default()
            .record(
                proposal.term,
                proposal.sequence_number,
                proposal.id,
                signature.clone(),
            );
        Ok(signature)
    }

    async fn check_transactions(&self, proposal: &DocketProposal) -> Result<(), RejectionReason> {
        let mut lookup = BatchLookup::new(self.chain.as_ref());
        for transaction in &proposal.transactions {
            let invalid = |reason: String| RejectionReason::InvalidTransaction {
                transaction_id: transaction.id,
                reason,
            };
            if transaction.register_id != proposal.register_id {
                return Err(invalid("Transaction belongs to another register".into()));
            }
            if self.chain.get_transaction(&transaction.id).is_some() {
                return Err(invalid("Transaction already committed".into()));
            }
            let verdict = match self.definitions.definition_for(transaction).await {
                Ok(definition) => validate(
                    transaction,
                    definition.as_deref(),
                    &lookup,
                    self.verifier.as_ref(),
                ),
                Err(e) => Err(e),
            };
            match verdict {
                Ok(valid) => lookup.accept(valid.into_inner()),
                Err(e) if e.is_transient() => return Err(unavailable(e)),
                Err(e) => return Err(invalid(e.to_string())),
            }
        }
        Ok(())
    }

    pub(super) async fn on_proposal(&self, from: &ValidatorId, proposal: DocketProposal) {
        let reply = match self.confirm(&proposal).await {
            Ok(signature) => {
                debug!(
                    register = %proposal.register_id,
                    sequence = proposal.sequence_number,
                    docket = %short_hex(&proposal.id),
                    "[dc-05] Proposal signed"
                );
                PeerMessage::SignatureResponse {
                    register_id: proposal.register_id.clone(),
                    docket_id: proposal.id,
                    sequence_number: proposal.sequence_number,
                    signature,
                }
            }
            Err(reason) => {
                self.record_rejection(&proposal, &reason).await;
                PeerMessage::Rejection {
                    register_id: proposal.register_id.clone(),
                    docket_id: proposal.id,
                    validator_id: self.config.validator_id.clone(),
                    term: self.election.current_term(&proposal.register_id),
                    reason,
                }
            }
        };
        if let Err(e) = self.transport.send(from, reply).await {
            debug!(to = %from, error = %e, "[dc-05] Confirmation reply not delivered");
        }
    }

    async fn record_rejection(&self, proposal: &DocketProposal, reason: &RejectionReason) {
        metrics::record_confirmation_rejected(reason.label());
        warn!(
            register = %proposal.register_id,
            sequence = proposal.sequence_number,
            initiator = %proposal.initiator_id,
            docket = %short_hex(&proposal.id),
            reason = %reason,
            "[dc-05] Proposal rejected"
        );
        self.event_bus
            .publish(ConsensusEvent::ConfirmationRejected {
                register_id: proposal.register_id.clone(),
                docket_id: proposal.id,
                initiator_id: proposal.initiator_id.clone(),
                reason: reason.to_string(),
            })
            .await;

        if !reason.is_attributable() {
            return;
        }
        let report = self.detector.lock().record(
            &proposal.register_id,
            &proposal.initiator_id,
            reason.clone(),
            self.time_source.now(),
        );
        if let Some(report) = report {
            warn!(
                register = %report.register_id,
                validator = %report.validator_id,
                rejections = report.rejections,
                "[dc-05] Bad actor reported"
            );
            self.event_bus
                .publish(ConsensusEvent::BadActorReported {
                    register_id: report.register_id,
                    validator_id: report.validator_id,
                    rejections: report.rejections,
                })
                .await;
        }
    }

    /// Adopt a docket another validator committed.
    ///
    /// Requires a matching id, a body the merkle root commits to and at
    /// least the minimum number of distinct signatures that verify against
    /// active registry keys. Returns false if the docket is already behind
    /// the local tip.
    pub async fn accept_committed(&self, docket: Docket) -> ConsensusResult<bool> {
        if docket.hash() != docket.id {
            return Err(ConsensusError::DocketIdMismatch);
        }
        if !body_matches_header(&docket) {
            return Err(ConsensusError::DocketBodyMismatch);
        }
        let register_id = docket.register_id.as_str();
        let config = self.configs.get(register_id).await?.config;
        let tip = self.chain_tip(register_id).await?;
        if docket.sequence_number < tip.next_sequence() {
            return Ok(false);
        }

        let mut signers = HashSet::new();
        for signature in &docket.signatures {
            if signers.contains(&signature.validator_id) {
                continue;
            }
            if self.signature_valid(register_id, &docket.id, signature).await {
                signers.insert(signature.validator_id.clone());
            }
        }
        if signers.len() < config.signature_threshold_min {
            return Err(ConsensusError::InsufficientSignatures {
                sequence: docket.sequence_number,
                valid: signers.len(),
                required: config.signature_threshold_min,
            });
        }

        let advanced = self.advance_tip(register_id, docket.sequence_number, docket.id);
        self.mempool.commit(&docket.transaction_ids());
        let now = self.time_source.now();
        if self.election.observe_term(register_id, docket.term, now).await {
            metrics::record_leader_change();
        }
        info!(
            register = %register_id,
            sequence = docket.sequence_number,
            docket = %short_hex(&docket.id),
            "[dc-05] Committed docket adopted"
        );
        Ok(advanced)
    }

    pub(super) async fn on_heartbeat(&self, heartbeat: Heartbeat) {
        let now = self.time_source.now();
        if let Err(e) = self.election.on_heartbeat(&heartbeat, now).await {
            debug!(
                register = %heartbeat.register_id,
                leader = %heartbeat.leader_id,
                error = %e,
                "[dc-05] Heartbeat refused"
            );
            return;
        }

        let local = self.tip(&heartbeat.register_id).and_then(|tip| tip.last_sequence);
        if heartbeat.latest_docket_sequence > local {
            self.invalidate_tip(&heartbeat.register_id);
            if let Err(e) = self.chain_tip(&heartbeat.register_id).await {
                debug!(register = %heartbeat.register_id, error = %e, "[dc-05] Tip resync failed");
            }
        }
    }
}
