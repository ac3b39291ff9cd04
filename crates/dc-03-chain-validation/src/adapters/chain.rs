//! In-memory committed chain view.

use crate::ports::ChainLookup;
use parking_lot::RwLock;
use shared_types::{Transaction, TxId};
use std::collections::HashMap;

/// Committed transactions and the register key directory, held in memory.
#[derive(Default)]
pub struct InMemoryChain {
    transactions: RwLock<HashMap<TxId, Transaction>>,
    /// (register, sender) -> public key
    sender_keys: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, transaction: Transaction) {
        self.transactions.write().insert(transaction.id, transaction);
    }

    pub fn extend(&self, transactions: impl IntoIterator<Item = Transaction>) {
        let mut map = self.transactions.write();
        for tx in transactions {
            map.insert(tx.id, tx);
        }
    }

    pub fn contains(&self, id: &TxId) -> bool {
        self.transactions.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }

    pub fn set_sender_key(&self, register_id: &str, sender: &str, key: Vec<u8>) {
        self.sender_keys
            .write()
            .insert((register_id.to_string(), sender.to_string()), key);
    }
}

impl ChainLookup for InMemoryChain {
    fn get_transaction(&self, id: &TxId) -> Option<Transaction> {
        self.transactions.read().get(id).cloned()
    }

    fn sender_key(&self, register_id: &str, sender: &str) -> Option<Vec<u8>> {
        self.sender_keys
            .read()
            .get(&(register_id.to_string(), sender.to_string()))
            .cloned()
    }
}
