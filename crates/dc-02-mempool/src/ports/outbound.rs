//! Outbound (Driven) ports for the Mempool subsystem.

use async_trait::async_trait;

/// Durable storage for mempool snapshots.
#[async_trait]
pub trait MempoolStore: Send + Sync {
    /// Persist an encoded snapshot, replacing the previous one.
    async fn save(&self, snapshot: Vec<u8>) -> Result<(), String>;

    /// Load the last saved snapshot, if any.
    async fn load(&self) -> Result<Option<Vec<u8>>, String>;
}
