//! Driven ports (Outbound dependencies)
//!
//! The engine reaches the ledger, the local signing key and its peers only
//! through these traits.

use crate::domain::PeerMessage;
use async_trait::async_trait;
use shared_types::{Docket, Hash, LedgerError, TransportError, ValidatorId};

/// Durable committed-docket storage.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Persist a docket that reached its signature threshold.
    ///
    /// Rejects dockets that do not extend the stored chain.
    async fn submit_docket(&self, docket: Docket) -> Result<(), LedgerError>;

    /// The highest committed docket of a register.
    async fn get_latest_committed_docket(
        &self,
        register_id: &str,
    ) -> Result<Option<Docket>, LedgerError>;
}

/// The local validator's signing key.
pub trait DocketSigner: Send + Sync {
    fn validator_id(&self) -> &ValidatorId;

    /// Sign a docket header hash.
    fn sign(&self, docket_hash: &Hash) -> Result<Vec<u8>, String>;
}

/// Point-to-point peer messaging.
///
/// Delivery is best effort; the engine never assumes ordering.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn send(&self, to: &ValidatorId, message: PeerMessage) -> Result<(), TransportError>;

    /// Send to every recipient, returning the failures.
    async fn broadcast(
        &self,
        recipients: &[ValidatorId],
        message: PeerMessage,
    ) -> Vec<(ValidatorId, TransportError)> {
        let mut failures = Vec::new();
        for recipient in recipients {
            if let Err(err) = self.send(recipient, message.clone()).await {
                failures.push((recipient.clone(), err));
            }
        }
        failures
    }
}
