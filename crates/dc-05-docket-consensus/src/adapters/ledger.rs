//! In-memory ledger.

use crate::ports::LedgerGateway;
use async_trait::async_trait;
use dc_03_chain_validation::{ChainLookup, InMemoryChain};
use parking_lot::RwLock;
use shared_types::{Docket, LedgerError, Transaction, TxId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Committed dockets per register plus the chain view of their
/// transactions.
///
/// Enforces the same append rule a durable ledger would: sequence numbers
/// start at 0 with no gaps and each docket names its predecessor.
#[derive(Default)]
pub struct InMemoryLedger {
    dockets: RwLock<HashMap<String, Vec<Docket>>>,
    chain: Arc<InMemoryChain>,
    failing: AtomicBool,
    submissions: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `submit_docket` calls, including rejected ones.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn dockets(&self, register_id: &str) -> Vec<Docket> {
        self.dockets
            .read()
            .get(register_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Seed a transaction committed outside of consensus (genesis data).
    pub fn insert_transaction(&self, transaction: Transaction) {
        self.chain.insert(transaction);
    }

    pub fn set_sender_key(&self, register_id: &str, sender: &str, key: Vec<u8>) {
        self.chain.set_sender_key(register_id, sender, key);
    }

    pub fn contains_transaction(&self, id: &TxId) -> bool {
        self.chain.contains(id)
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("ledger offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn submit_docket(&self, docket: Docket) -> Result<(), LedgerError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut dockets = self.dockets.write();
        let chain = dockets.entry(docket.register_id.clone()).or_default();

        // Resubmission of the committed head is a no-op.
        if chain.last().is_some_and(|last| last.id == docket.id) {
            return Ok(());
        }

        let expected = chain.len() as u64;
        if docket.sequence_number != expected {
            return Err(LedgerError::SequenceConflict {
                expected,
                actual: docket.sequence_number,
            });
        }
        if docket.previous_docket_id != chain.last().map(|last| last.id) {
            return Err(LedgerError::PreviousMismatch {
                sequence: docket.sequence_number,
            });
        }

        self.chain.extend(docket.transactions.iter().cloned());
        chain.push(docket);
        Ok(())
    }

    async fn get_latest_committed_docket(
        &self,
        register_id: &str,
    ) -> Result<Option<Docket>, LedgerError> {
        self.check_available()?;
        Ok(self
            .dockets
            .read()
            .get(register_id)
            .and_then(|chain| chain.last().cloned()))
    }
}

impl ChainLookup for InMemoryLedger {
    fn get_transaction(&self, id: &TxId) -> Option<Transaction> {
        self.chain.get_transaction(id)
    }

    fn sender_key(&self, register_id: &str, sender: &str) -> Option<Vec<u8>> {
        self.chain.sender_key(register_id, sender)
    }
}
