//! In-memory peer network.
//!
//! A hub of bounded channels, one inbox per validator. Partitions are
//! simulated by isolating a validator: nothing it sends or is sent
//! arrives.

use crate::domain::{PeerEnvelope, PeerMessage};
use crate::ports::PeerTransport;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{TransportError, ValidatorId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Default)]
pub struct InMemoryNetwork {
    inboxes: RwLock<HashMap<ValidatorId, mpsc::Sender<PeerEnvelope>>>,
    isolated: RwLock<HashSet<ValidatorId>>,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a validator and return its inbox.
    pub fn register(
        &self,
        validator_id: impl Into<ValidatorId>,
        capacity: usize,
    ) -> mpsc::Receiver<PeerEnvelope> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.inboxes.write().insert(validator_id.into(), tx);
        rx
    }

    /// Transport that sends as `validator_id`.
    pub fn transport(self: &Arc<Self>, validator_id: impl Into<ValidatorId>) -> NetworkTransport {
        NetworkTransport {
            local_id: validator_id.into(),
            network: Arc::clone(self),
        }
    }

    pub fn isolate(&self, validator_id: &str) {
        self.isolated.write().insert(validator_id.to_string());
    }

    pub fn heal(&self, validator_id: &str) {
        self.isolated.write().remove(validator_id);
    }

    pub fn heal_all(&self) {
        self.isolated.write().clear();
    }

    fn deliver(
        &self,
        from: &ValidatorId,
        to: &ValidatorId,
        message: PeerMessage,
    ) -> Result<(), TransportError> {
        {
            let isolated = self.isolated.read();
            if isolated.contains(from) || isolated.contains(to) {
                return Err(TransportError::Unreachable(to.clone()));
            }
        }
        let inbox = self
            .inboxes
            .read()
            .get(to)
            .cloned()
            .ok_or_else(|| TransportError::Unreachable(to.clone()))?;

        trace!(from = %from, to = %to, kind = message.kind(), "[dc-05] Delivering peer message");
        // A full inbox drops the message; delivery is best effort.
        inbox
            .try_send(PeerEnvelope {
                from: from.clone(),
                message,
            })
            .map_err(|_| TransportError::Unreachable(to.clone()))
    }
}

/// Per-validator handle onto an [`InMemoryNetwork`].
#[derive(Clone)]
pub struct NetworkTransport {
    local_id: ValidatorId,
    network: Arc<InMemoryNetwork>,
}

#[async_trait]
impl PeerTransport for NetworkTransport {
    async fn send(&self, to: &ValidatorId, message: PeerMessage) -> Result<(), TransportError> {
        self.network.deliver(&self.local_id, to, message)
    }
}
