use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    #[error("failed to encode document {key}: {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
    #[error("unsupported storage url: {0}")]
    UnsupportedUrl(String),
}

/// A whole document as last written, with the version it was written at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub body: String,
    pub version: u64,
}

/// Condition a write must satisfy to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Create only; fails if the key already holds a document.
    Absent,
    /// Compare-and-swap against the version that was read.
    Version(u64),
}

impl Precondition {
    pub fn from_read(doc: Option<&StoredDocument>) -> Self {
        match doc {
            Some(d) => Self::Version(d.version),
            None => Self::Absent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Written { version: u64 },
    Conflict,
}

/// Key/value blob store holding whole JSON documents. `put` replaces the
/// entire body; there is no partial update.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<StoredDocument>, StoreError>;

    async fn put(
        &self,
        key: &str,
        body: String,
        precondition: Precondition,
    ) -> Result<PutOutcome, StoreError>;
}
