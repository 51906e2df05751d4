use async_trait::async_trait;
use domain::protocol::{ApiResponse, DeletedId, PutRequest};
use domain::{Comment, CommentDraft, CommentWithReplies, PageName, ValidationError};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// 单次请求的默认超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Comments system not initialized")]
    NotInitialized,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The server answered with `success: false` or a non-2xx status.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Http(reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Preferences I/O error: {0}")]
    Prefs(#[from] std::io::Error),

    #[error("Preferences encoding error: {0}")]
    PrefsEncoding(#[from] serde_json::Error),
}

impl ClientError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }

    /// Worth trying again later without changing the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Text suitable for showing to the person who triggered `op`
    /// (e.g. `"add reply"`). Field errors keep their own wording.
    pub fn user_message(&self, op: &str) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::NotInitialized => self.to_string(),
            _ => format!("Failed to {}. Please try again.", op),
        }
    }
}

/// The four calls the comment resource accepts.
#[async_trait]
pub trait CommentsApi: Send + Sync {
    async fn fetch_page(&self, page: &PageName) -> Result<Vec<CommentWithReplies>, ClientError>;

    async fn create_comment(
        &self,
        page: &PageName,
        draft: &CommentDraft,
    ) -> Result<Comment, ClientError>;

    async fn put(&self, page: &PageName, request: &PutRequest) -> Result<Value, ClientError>;

    async fn delete_comment(
        &self,
        page: &PageName,
        comment_id: &str,
    ) -> Result<DeletedId, ClientError>;
}

#[async_trait]
impl<T: CommentsApi + ?Sized> CommentsApi for std::sync::Arc<T> {
    async fn fetch_page(&self, page: &PageName) -> Result<Vec<CommentWithReplies>, ClientError> {
        (**self).fetch_page(page).await
    }

    async fn create_comment(
        &self,
        page: &PageName,
        draft: &CommentDraft,
    ) -> Result<Comment, ClientError> {
        (**self).create_comment(page, draft).await
    }

    async fn put(&self, page: &PageName, request: &PutRequest) -> Result<Value, ClientError> {
        (**self).put(page, request).await
    }

    async fn delete_comment(
        &self,
        page: &PageName,
        comment_id: &str,
    ) -> Result<DeletedId, ClientError> {
        (**self).delete_comment(page, comment_id).await
    }
}

#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::from_reqwest)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, page: &PageName) -> String {
        format!("{}/api/comments/{}", self.base_url, page)
    }
}

#[async_trait]
impl CommentsApi for HttpApi {
    async fn fetch_page(&self, page: &PageName) -> Result<Vec<CommentWithReplies>, ClientError> {
        let resp = self
            .client
            .get(self.url(page))
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = resp.status();
        let text = resp.text().await.map_err(ClientError::from_reqwest)?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }
        serde_json::from_str(&text).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    async fn create_comment(
        &self,
        page: &PageName,
        draft: &CommentDraft,
    ) -> Result<Comment, ClientError> {
        let resp = self
            .client
            .post(self.url(page))
            .json(draft)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        let data = unwrap_envelope(resp).await?;
        decode(data)
    }

    async fn put(&self, page: &PageName, request: &PutRequest) -> Result<Value, ClientError> {
        let resp = self
            .client
            .put(self.url(page))
            .json(&request.to_json())
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        unwrap_envelope(resp).await
    }

    async fn delete_comment(
        &self,
        page: &PageName,
        comment_id: &str,
    ) -> Result<DeletedId, ClientError> {
        let resp = self
            .client
            .delete(self.url(page))
            .json(&json!({ "commentId": comment_id }))
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        let data = unwrap_envelope(resp).await?;
        decode(data)
    }
}

async fn unwrap_envelope(resp: reqwest::Response) -> Result<Value, ClientError> {
    let status = resp.status();
    let text = resp.text().await.map_err(ClientError::from_reqwest)?;
    debug!("Response {}: {}", status, text);

    let Ok(envelope) = serde_json::from_str::<ApiResponse<Value>>(&text) else {
        if status.is_success() {
            return Err(ClientError::InvalidResponse(text));
        }
        return Err(api_error(status.as_u16(), &text));
    };

    if !status.is_success() || !envelope.success {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: envelope
                .error
                .unwrap_or_else(|| format!("Request failed with status {}", status)),
        });
    }
    envelope
        .data
        .ok_or_else(|| ClientError::InvalidResponse("missing data".into()))
}

fn api_error(status: u16, body: &str) -> ClientError {
    let message = serde_json::from_str::<ApiResponse<Value>>(body)
        .ok()
        .and_then(|r| r.error)
        .unwrap_or_else(|| format!("Request failed with status {}", status));
    ClientError::Api { status, message }
}

pub(crate) fn decode<T: DeserializeOwned>(data: Value) -> Result<T, ClientError> {
    serde_json::from_value(data).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}
