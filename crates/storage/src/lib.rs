mod backend;
mod documents;
mod error;
mod memory;
mod repo;
mod sqlite;

pub use backend::{DocumentStore, Precondition, PutOutcome, StoreError, StoredDocument};
pub use documents::{DocumentKind, SCHEMA_VERSION};
pub use error::RepoError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use domain::Partition;
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_WRITE_ATTEMPTS: u32 = 5;

/// Comment and reply repositories over a whole-document store.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn DocumentStore>,
    write_attempts: u32,
}

impl Store {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self {
            backend,
            write_attempts: DEFAULT_WRITE_ATTEMPTS,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        if url.starts_with("memory://") {
            return Ok(Self::in_memory());
        }
        if url.starts_with("sqlite:") {
            let db = SqliteStore::new(url).await?;
            return Ok(Self::new(Arc::new(db)));
        }
        Err(StoreError::UnsupportedUrl(url.to_string()))
    }

    pub fn with_write_attempts(mut self, attempts: u32) -> Self {
        self.write_attempts = attempts.max(1);
        self
    }

    pub(crate) async fn load<T: DeserializeOwned>(
        &self,
        partition: &Partition,
        kind: DocumentKind,
    ) -> Result<Vec<T>, StoreError> {
        let key = kind.key(partition);
        match self.backend.get(&key).await? {
            Some(doc) => {
                let items = documents::decode(&key, &doc.body)?;
                debug!("Loaded {} v{} ({} items)", key, doc.version, items.len());
                Ok(items)
            }
            None => Ok(Vec::new()),
        }
    }

    /// `f` may run several times, so it must only touch `items`. An `Err`
    /// from `f` aborts without writing.
    pub(crate) async fn mutate<T, R, F>(
        &self,
        partition: &Partition,
        kind: DocumentKind,
        mut f: F,
    ) -> Result<R, RepoError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut Vec<T>) -> Result<R, RepoError>,
    {
        let key = kind.key(partition);

        for attempt in 1..=self.write_attempts {
            let doc = self.backend.get(&key).await?;
            let mut items: Vec<T> = match &doc {
                Some(d) => documents::decode(&key, &d.body)?,
                None => Vec::new(),
            };

            let out = f(&mut items)?;

            let body = documents::encode(&key, &items)?;
            match self
                .backend
                .put(&key, body, Precondition::from_read(doc.as_ref()))
                .await?
            {
                PutOutcome::Written { version } => {
                    debug!("Saved {} v{} ({} items)", key, version, items.len());
                    return Ok(out);
                }
                PutOutcome::Conflict => {
                    warn!(
                        "Write conflict on {} (attempt {}/{}), retrying",
                        key, attempt, self.write_attempts
                    );
                    if attempt < self.write_attempts {
                        tokio::time::sleep(backoff(attempt)).await;
                    }
                }
            }
        }

        Err(RepoError::Conflict {
            key,
            attempts: self.write_attempts,
        })
    }
}

fn backoff(attempt: u32) -> Duration {
    let base = 5u64 << attempt.min(6);
    let jitter = rand::thread_rng().gen_range(0..=base);
    Duration::from_millis(base + jitter)
}
