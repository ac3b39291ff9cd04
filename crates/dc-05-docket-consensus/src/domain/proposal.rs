//! Wire form of a docket awaiting confirmation.

use super::merkle::merkle_root;
use serde::{Deserialize, Serialize};
use shared_types::{
    docket_hash, Docket, DocketId, Hash, RegisterId, Timestamp, Transaction, TxId, ValidatorId,
};
use std::collections::HashSet;

/// Docket proposal broadcast by the initiator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocketProposal {
    pub id: DocketId,
    pub register_id: RegisterId,
    pub previous_docket_id: Option<DocketId>,
    pub sequence_number: u64,
    pub transaction_ids: Vec<TxId>,
    pub transactions: Vec<Transaction>,
    pub merkle_root: Hash,
    pub initiator_id: ValidatorId,
    pub initiator_signature: Vec<u8>,
    pub term: u64,
    pub created_at: Timestamp,
}

impl DocketProposal {
    /// Build from a docket that carries its initiator signature.
    pub fn from_docket(docket: &Docket) -> Option<Self> {
        let initiator = docket.initiator_signature()?;
        Some(Self {
            id: docket.id,
            register_id: docket.register_id.clone(),
            previous_docket_id: docket.previous_docket_id,
            sequence_number: docket.sequence_number,
            transaction_ids: docket.transaction_ids(),
            transactions: docket.transactions.clone(),
            merkle_root: docket.merkle_root,
            initiator_id: docket.initiator_id.clone(),
            initiator_signature: initiator.signature.clone(),
            term: docket.term,
            created_at: docket.created_at,
        })
    }

    /// Header hash recomputed from the proposal fields.
    pub fn header_hash(&self) -> Hash {
        docket_hash(
            &self.register_id,
            self.previous_docket_id.as_ref(),
            self.sequence_number,
            &self.merkle_root,
            &self.initiator_id,
            self.term,
            self.created_at,
        )
    }

    /// The id list names exactly the carried transactions, in order, each
    /// with a content-derived id and none twice.
    pub fn transaction_set_consistent(&self) -> bool {
        self.transaction_ids.len() == self.transactions.len()
            && self
                .transaction_ids
                .iter()
                .zip(&self.transactions)
                .all(|(id, tx)| *id == tx.id)
            && ids_intact(&self.transactions)
    }

    pub fn recomputed_merkle_root(&self) -> Hash {
        merkle_root(&self.transaction_ids)
    }
}

/// Every transaction carries its content-derived id and none appears twice.
fn ids_intact(transactions: &[Transaction]) -> bool {
    let mut seen = HashSet::with_capacity(transactions.len());
    transactions
        .iter()
        .all(|tx| tx.compute_id() == tx.id && seen.insert(tx.id))
}

/// The carried transactions are the ones the header's merkle root commits
/// to. The header hash covers the root but not the body.
pub fn body_matches_header(docket: &Docket) -> bool {
    ids_intact(&docket.transactions) && merkle_root(&docket.transaction_ids()) == docket.merkle_root
}
