use domain::protocol::{DeletedId, PutRequest};
use domain::{
    normalize_edit_text, Comment, CommentDraft, CommentStatus, CommentWithReplies, PageName,
    Reply, ReplyDraft, ReplyNode, ValidationError,
};
use tracing::{info, warn};

use crate::api::{decode, ClientError, CommentsApi};
use crate::overlay::PagePoint;
use crate::prefs::LocalPrefs;

/// Client-side view of one page's comments.
pub struct CommentsSession<A> {
    api: A,
    prefs: LocalPrefs,
    comments: Vec<CommentWithReplies>,
    page_name: Option<PageName>,
    is_initialized: bool,
}

fn is_stale(local_version: u64, incoming_version: u64) -> bool {
    incoming_version < local_version
}

fn parse_page(raw: &str) -> Result<PageName, ClientError> {
    PageName::new(raw).map_err(|_| ClientError::Validation(ValidationError::PageName))
}

fn require_id(id: &str) -> Result<(), ClientError> {
    if id.trim().is_empty() {
        return Err(ValidationError::CommentId.into());
    }
    Ok(())
}

impl<A: CommentsApi> CommentsSession<A> {
    pub fn new(api: A, prefs: LocalPrefs) -> Self {
        Self {
            api,
            prefs,
            comments: Vec::new(),
            page_name: None,
            is_initialized: false,
        }
    }

    pub fn active(&self) -> bool {
        self.prefs.active()
    }

    pub fn comments(&self) -> &[CommentWithReplies] {
        &self.comments
    }

    pub fn page_name(&self) -> Option<&PageName> {
        self.page_name.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    pub fn user_name(&self) -> &str {
        self.prefs.user_name()
    }

    /// Fetches the page and makes it current. A failed fetch leaves the
    /// session uninitialized with no comments; calling again retries.
    pub async fn initialize_page(&mut self, raw_page: &str) -> Result<(), ClientError> {
        let page = parse_page(raw_page)?;
        info!("Loading comments for page {}", page);

        match self.api.fetch_page(&page).await {
            Ok(comments) => {
                info!("Initialized {} comment(s) for page {}", comments.len(), page);
                self.comments = comments;
                self.page_name = Some(page);
                self.is_initialized = true;
                Ok(())
            }
            Err(e) => {
                warn!("Error loading comments for {}: {}", page, e);
                self.comments.clear();
                self.is_initialized = false;
                Err(e)
            }
        }
    }

    pub async fn load(&mut self, raw_page: &str) -> Result<(), ClientError> {
        let page = parse_page(raw_page)?;
        if !self.is_initialized || self.page_name.as_ref() != Some(&page) {
            return self.initialize_page(page.as_str()).await;
        }
        self.reload().await
    }

    /// Full reload of the current page. On failure the previous list stays.
    async fn reload(&mut self) -> Result<(), ClientError> {
        let page = self.current_page()?;
        match self.api.fetch_page(&page).await {
            Ok(comments) => {
                self.comments = comments;
                Ok(())
            }
            Err(e) => {
                warn!("Error reloading comments for {}: {}", page, e);
                Err(e)
            }
        }
    }

    fn current_page(&self) -> Result<PageName, ClientError> {
        match (&self.page_name, self.is_initialized) {
            (Some(page), true) => Ok(page.clone()),
            _ => Err(ClientError::NotInitialized),
        }
    }

    fn find_mut(&mut self, comment_id: &str) -> Option<&mut CommentWithReplies> {
        self.comments.iter_mut().find(|c| c.id() == comment_id)
    }

    fn merge_comment(&mut self, incoming: Comment) {
        let Some(local) = self.find_mut(&incoming.id) else {
            return;
        };
        if is_stale(local.comment.version, incoming.version) {
            warn!(
                "Ignoring stale echo of comment {} (v{} < v{})",
                incoming.id, incoming.version, local.comment.version
            );
            return;
        }
        local.comment = incoming;
    }

    fn merge_reply(&mut self, comment_id: &str, incoming: Reply) {
        let Some(local) = self
            .find_mut(comment_id)
            .and_then(|c| c.find_reply_mut(&incoming.id))
        else {
            return;
        };
        if is_stale(local.version, incoming.version) {
            warn!(
                "Ignoring stale echo of reply {} (v{} < v{})",
                incoming.id, incoming.version, local.version
            );
            return;
        }
        *local = incoming;
    }

    pub fn draft_at(&self, text: impl Into<String>, point: PagePoint) -> CommentDraft {
        CommentDraft::new(text, self.user_name(), point.x, point.y)
    }

    /// Validates locally, posts, then reloads the page. The created comment
    /// is returned even when the follow-up reload fails.
    pub async fn add(&mut self, draft: &CommentDraft) -> Result<CommentWithReplies, ClientError> {
        let page = self.current_page()?;
        let draft = draft.validate()?;

        info!("Adding comment for page {}", page);
        let created = CommentWithReplies::new(self.api.create_comment(&page, &draft).await?);
        self.comments.push(created.clone());

        // 以服务端为准，乐观追加的记录随即被整页刷新覆盖
        if let Err(e) = self.reload().await {
            warn!("Reload after adding {} failed: {}", created.id(), e);
        }
        Ok(created)
    }

    // 回复只在本地追加，不重新拉取
    pub async fn reply(&mut self, comment_id: &str, draft: &ReplyDraft) -> Result<Reply, ClientError> {
        let page = self.current_page()?;
        require_id(comment_id)?;
        let draft = draft.validate()?;

        let request = PutRequest::AddReply {
            comment_id: comment_id.to_string(),
            draft,
        };
        let reply: Reply = decode(self.api.put(&page, &request).await?)?;

        if let Some(comment) = self.find_mut(comment_id) {
            comment.replies.push(ReplyNode {
                reply: reply.clone(),
                replies: Vec::new(),
            });
        }
        Ok(reply)
    }

    /// On failure the page is reloaded so local state matches the server
    /// again; the edit error is still returned.
    pub async fn edit_reply(
        &mut self,
        comment_id: &str,
        reply_id: &str,
        text: &str,
    ) -> Result<Reply, ClientError> {
        let page = self.current_page()?;
        require_id(comment_id)?;
        require_id(reply_id)?;
        let text = normalize_edit_text(text, ValidationError::ReplyText)?;

        let request = PutRequest::EditReply {
            comment_id: Some(comment_id.to_string()),
            reply_id: reply_id.to_string(),
            text,
        };
        let result = match self.api.put(&page, &request).await {
            Ok(data) => decode::<Reply>(data),
            Err(e) => Err(e),
        };

        match result {
            Ok(reply) => {
                self.merge_reply(comment_id, reply.clone());
                Ok(reply)
            }
            Err(e) => {
                warn!("Failed to edit reply {}: {}", reply_id, e);
                self.resync().await;
                Err(e)
            }
        }
    }

    pub async fn edit_comment(&mut self, comment_id: &str, text: &str) -> Result<Comment, ClientError> {
        let page = self.current_page()?;
        require_id(comment_id)?;
        let text = normalize_edit_text(text, ValidationError::CommentText)?;

        let request = PutRequest::EditComment {
            comment_id: comment_id.to_string(),
            text,
        };
        let result = match self.api.put(&page, &request).await {
            Ok(data) => decode::<Comment>(data),
            Err(e) => Err(e),
        };

        match result {
            Ok(comment) => {
                self.merge_comment(comment.clone());
                Ok(comment)
            }
            Err(e) => {
                warn!("Failed to edit comment {}: {}", comment_id, e);
                self.resync().await;
                Err(e)
            }
        }
    }

    async fn resync(&mut self) {
        if let Err(e) = self.reload().await {
            warn!("Resync after failed edit did not succeed: {}", e);
        }
    }

    /// The local status flips before the request goes out. A failed request
    /// is neither retried nor rolled back; the next reload corrects it.
    pub async fn set_status(
        &mut self,
        comment_id: &str,
        status: CommentStatus,
    ) -> Result<Comment, ClientError> {
        let page = self.current_page()?;
        require_id(comment_id)?;

        if let Some(local) = self.find_mut(comment_id) {
            local.comment.status = status;
        }

        let request = PutRequest::SetStatus {
            comment_id: comment_id.to_string(),
            status,
        };
        let comment: Comment = decode(self.api.put(&page, &request).await?)?;
        self.merge_comment(comment.clone());
        Ok(comment)
    }

    pub async fn soft_delete(&mut self, comment_id: &str) -> Result<Comment, ClientError> {
        self.set_status(comment_id, CommentStatus::Deleted).await
    }

    /// Hard delete, replies included. Local state only changes on success.
    pub async fn delete_comment(&mut self, comment_id: &str) -> Result<DeletedId, ClientError> {
        let page = self.current_page()?;
        require_id(comment_id)?;

        info!("Deleting comment {} on {}", comment_id, page);
        let deleted = self.api.delete_comment(&page, comment_id).await?;
        self.comments.retain(|c| c.id() != comment_id);
        Ok(deleted)
    }

    pub fn toggle(&mut self) -> Result<bool, ClientError> {
        let next = !self.active();
        self.set_active(next)?;
        Ok(next)
    }

    pub fn set_active(&mut self, active: bool) -> Result<(), ClientError> {
        self.prefs.set_active(active)
    }

    pub fn set_user_name(&mut self, name: &str) -> Result<(), ClientError> {
        self.prefs.set_user_name(name)
    }

    pub fn teardown(&mut self) {
        self.comments.clear();
        self.page_name = None;
        self.is_initialized = false;
    }
}
