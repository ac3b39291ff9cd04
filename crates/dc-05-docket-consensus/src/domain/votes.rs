//! Confirmer-side record of signed proposals.
//!
//! A confirmer signs at most one docket per (term, sequence) while that
//! docket can still commit. Once the docket timeout has passed the
//! initiator has abandoned it, so a rebuilt docket for the same slot may
//! be signed.

use shared_types::{DocketId, DocketSignature, Timestamp};
use std::collections::BTreeMap;

/// What the log says about a new proposal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PriorVote {
    None,
    /// The same docket was already signed; reuse the signature.
    Same(DocketSignature),
    /// A different docket holds the slot.
    Conflicting(DocketId),
}

#[derive(Clone, Debug)]
struct Vote {
    docket_id: DocketId,
    signature: DocketSignature,
}

/// Signed proposals of one register keyed by (term, sequence).
#[derive(Debug, Default)]
pub struct VoteLog {
    votes: BTreeMap<(u64, u64), Vote>,
}

impl VoteLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(
        &self,
        term: u64,
        sequence: u64,
        docket_id: &DocketId,
        now: Timestamp,
        timeout_ms: u64,
    ) -> PriorVote {
        match self.votes.get(&(term, sequence)) {
            None => PriorVote::None,
            Some(vote) if vote.docket_id == *docket_id => PriorVote::Same(vote.signature.clone()),
            Some(vote) if now.saturating_sub(vote.signature.signed_at) >= timeout_ms => {
                PriorVote::None
            }
            Some(vote) => PriorVote::Conflicting(vote.docket_id),
        }
    }

    pub fn record(
        &mut self,
        term: u64,
        sequence: u64,
        docket_id: DocketId,
        signature: DocketSignature,
    ) {
        self.votes.insert((term, sequence), Vote { docket_id, signature });
    }

    /// Forget votes for sequences the committed tip has passed.
    pub fn prune_below(&mut self, next_sequence: u64) {
        self.votes.retain(|(_, sequence), _| *sequence >= next_sequence);
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}
