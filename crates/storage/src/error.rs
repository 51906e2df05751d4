use crate::backend::StoreError;
use domain::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Comment not found")]
    CommentNotFound,
    #[error("Reply not found")]
    ReplyNotFound,
    #[error("write conflict on {key} persisted after {attempts} attempts")]
    Conflict { key: String, attempts: u32 },
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl RepoError {
    /// Validation and lookup failures are the caller's fault; everything else
    /// is an internal fault whose details stay server side.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::CommentNotFound | Self::ReplyNotFound
        )
    }
}
