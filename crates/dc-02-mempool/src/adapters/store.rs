//! In-memory snapshot store

use crate::ports::MempoolStore;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Keeps the last snapshot in memory.
#[derive(Default)]
pub struct InMemoryMempoolStore {
    snapshot: Mutex<Option<Vec<u8>>>,
}

impl InMemoryMempoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.lock().is_some()
    }
}

#[async_trait]
impl MempoolStore for InMemoryMempoolStore {
    async fn save(&self, snapshot: Vec<u8>) -> Result<(), String> {
        *self.snapshot.lock() = Some(snapshot);
        Ok(())
    }

    async fn load(&self) -> Result<Option<Vec<u8>>, String> {
        Ok(self.snapshot.lock().clone())
    }
}
