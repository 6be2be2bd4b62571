use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::backend::{Batch, BatchOutcome, BackendError, Command, KvBackend};

// ============================================================================
// In-Memory Backend
// ============================================================================
//
// Same guarded-batch semantics as RedisBackend, with the whole batch running
// under one lock. Used by the test suite and for running the API without a
// Redis server (ORDERS_BACKEND=memory). Nothing is persisted.
//
// ============================================================================

#[derive(Default)]
struct MemoryState {
    values: HashMap<String, String>,
    sets: HashMap<String, HashSet<String>>,
}

impl MemoryState {
    fn key_exists(&self, key: &str) -> bool {
        self.values.contains_key(key) || self.sets.get(key).is_some_and(|s| !s.is_empty())
    }

    fn apply(&mut self, command: &Command) {
        match command {
            Command::SetIfAbsent { key, value } | Command::SetIfPresent { key, value } => {
                self.values.insert(key.clone(), value.clone());
            }
            Command::DeleteExisting { key } => {
                self.values.remove(key);
                self.sets.remove(key);
            }
            Command::SetAdd { key, member } => {
                self.sets.entry(key.clone()).or_default().insert(member.clone());
            }
            Command::SetRemove { key, member } => {
                if let Some(set) = self.sets.get_mut(key) {
                    set.remove(member);
                    if set.is_empty() {
                        self.sets.remove(key);
                    }
                }
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of plain string keys currently stored
    #[cfg(test)]
    pub async fn key_count(&self) -> usize {
        self.state.lock().await.values.len()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.state.lock().await.values.get(key).cloned())
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.state.lock().await.key_exists(key))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, BackendError> {
        let state = self.state.lock().await;
        Ok(state
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool, BackendError> {
        let state = self.state.lock().await;
        Ok(state.sets.get(key).is_some_and(|set| set.contains(member)))
    }

    async fn execute(&self, batch: Batch) -> Result<BatchOutcome, BackendError> {
        let mut state = self.state.lock().await;

        for (at, command) in batch.commands().iter().enumerate() {
            if !command.guard_holds(state.key_exists(command.key())) {
                return Ok(BatchOutcome::Aborted { at });
            }
        }

        for command in batch.commands() {
            state.apply(command);
        }

        Ok(BatchOutcome::Applied)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
