//! # Persistent Mempool (Fast-Resume)
//!
//! On restart the pool is rebuilt from its last snapshot so that pending
//! work, dead letters and the committed-id cache survive. Entries that were
//! in flight come back as pending.

use super::entities::{DeadLetter, MempoolEntry, TxId};
use super::errors::MempoolError;
use serde::{Deserialize, Serialize};

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable image of a transaction pool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MempoolSnapshot {
    pub entries: Vec<MempoolEntry>,
    pub dead_letters: Vec<DeadLetter>,
    /// Most recently committed first.
    pub committed: Vec<TxId>,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    snapshot: MempoolSnapshot,
}

impl MempoolSnapshot {
    /// Encode as versioned JSON.
    pub fn encode(&self) -> Result<Vec<u8>, MempoolError> {
        serde_json::to_vec(&Envelope {
            version: SNAPSHOT_VERSION,
            snapshot: self.clone(),
        })
        .map_err(|e| MempoolError::Snapshot(e.to_string()))
    }

    /// Decode versioned JSON.
    pub fn decode(bytes: &[u8]) -> Result<Self, MempoolError> {
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|e| MempoolError::Snapshot(e.to_string()))?;
        if envelope.version != SNAPSHOT_VERSION {
            return Err(MempoolError::Snapshot(format!(
                "unsupported snapshot version {}",
                envelope.version
            )));
        }
        Ok(envelope.snapshot)
    }
}
