//! Peer protocol messages.

use super::error::RejectionReason;
use super::proposal::DocketProposal;
use dc_04_leader_election::Heartbeat;
use serde::{Deserialize, Serialize};
use shared_types::{Docket, DocketId, DocketSignature, RegisterId, ValidatorId};

/// Messages exchanged between validators. No ordering is assumed and
/// duplicates are tolerated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PeerMessage {
    Heartbeat(Heartbeat),
    Proposal(DocketProposal),
    #[serde(rename_all = "camelCase")]
    SignatureResponse {
        register_id: RegisterId,
        docket_id: DocketId,
        sequence_number: u64,
        signature: DocketSignature,
    },
    /// Carries the confirmer's current term so a deposed leader learns of
    /// its demotion.
    #[serde(rename_all = "camelCase")]
    Rejection {
        register_id: RegisterId,
        docket_id: DocketId,
        validator_id: ValidatorId,
        term: u64,
        reason: RejectionReason,
    },
    Committed(Docket),
}

impl PeerMessage {
    pub fn register_id(&self) -> &str {
        match self {
            Self::Heartbeat(hb) => &hb.register_id,
            Self::Proposal(p) => &p.register_id,
            Self::SignatureResponse { register_id, .. } | Self::Rejection { register_id, .. } => {
                register_id
            }
            Self::Committed(docket) => &docket.register_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Heartbeat(_) => "heartbeat",
            Self::Proposal(_) => "proposal",
            Self::SignatureResponse { .. } => "signature_response",
            Self::Rejection { .. } => "rejection",
            Self::Committed(_) => "committed",
        }
    }
}

/// A message with its transport-level sender.
#[derive(Clone, Debug, PartialEq)]
pub struct PeerEnvelope {
    pub from: ValidatorId,
    pub message: PeerMessage,
}
