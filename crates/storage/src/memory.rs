use crate::backend::{DocumentStore, Precondition, PutOutcome, StoreError, StoredDocument};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local document store for tests and `memory://` deployments.
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<RwLock<HashMap<String, StoredDocument>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.docs.read().await.get(key).cloned())
    }

    async fn put(
        &self,
        key: &str,
        body: String,
        precondition: Precondition,
    ) -> Result<PutOutcome, StoreError> {
        let mut docs = self.docs.write().await;
        let current = docs.get(key).map(|d| d.version);
        let version = match (precondition, current) {
            (Precondition::Absent, None) => 1,
            (Precondition::Version(expected), Some(v)) if v == expected => v + 1,
            _ => return Ok(PutOutcome::Conflict),
        };
        docs.insert(key.to_string(), StoredDocument { body, version });
        Ok(PutOutcome::Written { version })
    }
}
