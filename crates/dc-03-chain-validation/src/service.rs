//! # Definition Cache
//!
//! Sits in front of the [`DefinitionProvider`] port. Entries live for a
//! bounded TTL and the cache holds at most `capacity` definitions. When the
//! provider fails, a cached definition is served even if expired.

use crate::domain::{Definition, ValidationError};
use crate::ports::DefinitionProvider;
use lru::LruCache;
use parking_lot::Mutex;
use shared_types::{TimeSource, Timestamp, Transaction, TransactionKind};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

type CacheKey = (String, String);

struct CachedDefinition {
    definition: Arc<Definition>,
    fetched_at: Timestamp,
}

/// TTL cache of workflow definitions keyed by (register, definition id).
pub struct DefinitionCache {
    provider: Arc<dyn DefinitionProvider>,
    time_source: Arc<dyn TimeSource>,
    ttl: Duration,
    entries: Mutex<LruCache<CacheKey, CachedDefinition>>,
}

impl DefinitionCache {
    pub fn new(
        provider: Arc<dyn DefinitionProvider>,
        time_source: Arc<dyn TimeSource>,
        ttl: Duration,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            provider,
            time_source,
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Definition an action transaction must be validated against.
    ///
    /// Anchors and publications need none.
    pub async fn definition_for(
        &self,
        transaction: &Transaction,
    ) -> Result<Option<Arc<Definition>>, ValidationError> {
        if transaction.kind != TransactionKind::Action {
            return Ok(None);
        }
        self.get(&transaction.definition_id, &transaction.register_id)
            .await
    }

    /// Cached definition, fetched when absent or expired.
    pub async fn get(
        &self,
        definition_id: &str,
        register_id: &str,
    ) -> Result<Option<Arc<Definition>>, ValidationError> {
        let key = (register_id.to_string(), definition_id.to_string());
        let now = self.time_source.now();
        if let Some(cached) = self.entries.lock().get(&key) {
            if now.saturating_sub(cached.fetched_at) < self.ttl.as_millis() as u64 {
                return Ok(Some(cached.definition.clone()));
            }
        }
        self.fetch(key, now).await
    }

    /// Fetch from the provider regardless of cache state.
    pub async fn refresh(
        &self,
        definition_id: &str,
        register_id: &str,
    ) -> Result<Option<Arc<Definition>>, ValidationError> {
        let key = (register_id.to_string(), definition_id.to_string());
        self.fetch(key, self.time_source.now()).await
    }

    /// Drop a cached definition so the next `get` fetches it.
    pub fn invalidate(&self, definition_id: &str, register_id: &str) {
        self.entries
            .lock()
            .pop(&(register_id.to_string(), definition_id.to_string()));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    async fn fetch(
        &self,
        key: CacheKey,
        now: Timestamp,
    ) -> Result<Option<Arc<Definition>>, ValidationError> {
        let (register_id, definition_id) = (&key.0, &key.1);
        match self.provider.get_definition(definition_id, register_id).await {
            Ok(Some(fetched)) => {
                let mut entries = self.entries.lock();
                // Never step back to an older version.
                let definition = match entries.get(&key) {
                    Some(cached) if cached.definition.version > fetched.version => {
                        cached.definition.clone()
                    }
                    _ => Arc::new(fetched),
                };
                debug!(
                    register = %register_id,
                    definition = %definition_id,
                    version = definition.version,
                    "[dc-03] Definition cached"
                );
                entries.put(
                    key.clone(),
                    CachedDefinition {
                        definition: definition.clone(),
                        fetched_at: now,
                    },
                );
                Ok(Some(definition))
            }
            Ok(None) => {
                self.entries.lock().pop(&key);
                Ok(None)
            }
            Err(reason) => {
                if let Some(cached) = self.entries.lock().get(&key) {
                    warn!(
                        register = %register_id,
                        definition = %definition_id,
                        error = %reason,
                        "[dc-03] Definition refresh failed, serving cached version"
                    );
                    return Ok(Some(cached.definition.clone()));
                }
                Err(ValidationError::DefinitionUnavailable(reason))
            }
        }
    }
}
