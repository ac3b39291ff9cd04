//! Intra-docket lookup overlay.
//!
//! Transactions accepted earlier in the same docket are not yet on the
//! ledger, but later transactions in the batch may chain to them.

use crate::ports::ChainLookup;
use shared_types::{Transaction, TxId};
use std::collections::HashMap;

/// A [`ChainLookup`] that sees the batch built so far on top of the ledger.
pub struct BatchLookup<'a> {
    base: &'a dyn ChainLookup,
    accepted: HashMap<TxId, Transaction>,
}

impl<'a> BatchLookup<'a> {
    pub fn new(base: &'a dyn ChainLookup) -> Self {
        Self {
            base,
            accepted: HashMap::new(),
        }
    }

    /// Make an accepted transaction visible to later lookups.
    pub fn accept(&mut self, transaction: Transaction) {
        self.accepted.insert(transaction.id, transaction);
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }
}

impl ChainLookup for BatchLookup<'_> {
    fn get_transaction(&self, id: &TxId) -> Option<Transaction> {
        self.accepted
            .get(id)
            .cloned()
            .or_else(|| self.base.get_transaction(id))
    }

    fn sender_key(&self, register_id: &str, sender: &str) -> Option<Vec<u8>> {
        self.base.sender_key(register_id, sender)
    }
}
