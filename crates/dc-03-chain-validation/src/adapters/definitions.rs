//! Static definition provider.

use crate::domain::Definition;
use crate::ports::DefinitionProvider;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Definitions held in memory, keyed by (register, definition id).
#[derive(Default)]
pub struct StaticDefinitionProvider {
    definitions: RwLock<HashMap<(String, String), Definition>>,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl StaticDefinitionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace a definition version.
    pub fn publish(&self, definition: Definition) {
        self.definitions.write().insert(
            (definition.register_id.clone(), definition.id.clone()),
            definition,
        );
    }

    /// Make every fetch fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DefinitionProvider for StaticDefinitionProvider {
    async fn get_definition(
        &self,
        definition_id: &str,
        register_id: &str,
    ) -> Result<Option<Definition>, String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err("definition service unreachable".to_string());
        }
        Ok(self
            .definitions
            .read()
            .get(&(register_id.to_string(), definition_id.to_string()))
            .cloned())
    }
}
