use crate::{DocumentKind, RepoError, Store};
use chrono::Utc;
use domain::{
    build_reply_tree, next_id, normalize_edit_text, Partition, Reply, ReplyDraft, ReplyNode,
    ValidationError,
};
use tracing::info;

impl Store {
    pub async fn get_replies(
        &self,
        partition: &Partition,
        comment_id: Option<&str>,
    ) -> Result<Vec<Reply>, RepoError> {
        let replies: Vec<Reply> = self.load(partition, DocumentKind::Replies).await?;
        Ok(match comment_id {
            Some(id) => replies.into_iter().filter(|r| r.comment_id == id).collect(),
            None => replies,
        })
    }

    /// Same selection as [`Store::get_replies`], nested by `parent_id`.
    pub async fn get_reply_tree(
        &self,
        partition: &Partition,
        comment_id: Option<&str>,
    ) -> Result<Vec<ReplyNode>, RepoError> {
        Ok(build_reply_tree(self.get_replies(partition, comment_id).await?))
    }

    /// `parent_id` defaults to `comment_id` (a top-level reply).
    ///
    /// The parent comment is checked with a plain read; a concurrent delete can
    /// still leave an orphan reply behind, which readers tolerate.
    pub async fn add_reply(
        &self,
        partition: &Partition,
        comment_id: &str,
        parent_id: Option<&str>,
        draft: &ReplyDraft,
    ) -> Result<Reply, RepoError> {
        if comment_id.trim().is_empty() {
            return Err(ValidationError::CommentId.into());
        }
        let draft = draft.validate()?;

        match self.get_comment(partition, comment_id).await? {
            Some(c) if !c.status.is_deleted() => {}
            _ => return Err(RepoError::CommentNotFound),
        }

        let parent_id = parent_id.unwrap_or(comment_id).to_string();
        let reply = self
            .mutate(partition, DocumentKind::Replies, |items: &mut Vec<Reply>| {
                let now = Utc::now();
                let id = next_id('r', now, |candidate| items.iter().any(|r| r.id == candidate));
                let reply = Reply {
                    id,
                    comment_id: comment_id.to_string(),
                    parent_id: Some(parent_id.clone()),
                    text: draft.text.clone(),
                    user: draft.user.clone(),
                    page_name: partition.page.clone(),
                    site_id: partition.site_id.clone(),
                    created_at: now,
                    updated_at: now,
                    version: 1,
                };
                items.push(reply.clone());
                Ok(reply)
            })
            .await?;

        info!(
            "Reply {} added to comment {} on {}",
            reply.id, comment_id, partition
        );
        Ok(reply)
    }

    /// Looks the reply up by id. When `comment_id` is given the reply must
    /// also belong to that comment.
    pub async fn update_reply(
        &self,
        partition: &Partition,
        reply_id: &str,
        comment_id: Option<&str>,
        text: Option<&str>,
    ) -> Result<Reply, RepoError> {
        let text = text
            .map(|t| normalize_edit_text(t, ValidationError::ReplyText))
            .transpose()?;

        let updated = self
            .mutate(partition, DocumentKind::Replies, |items: &mut Vec<Reply>| {
                let reply = items
                    .iter_mut()
                    .find(|r| r.id == reply_id && comment_id.map_or(true, |c| r.comment_id == c))
                    .ok_or(RepoError::ReplyNotFound)?;
                if let Some(text) = &text {
                    reply.text = text.clone();
                }
                reply.updated_at = Utc::now();
                reply.version += 1;
                Ok(reply.clone())
            })
            .await?;

        info!("Reply {} updated on {}", updated.id, partition);
        Ok(updated)
    }

    pub async fn delete_replies_for_comment(
        &self,
        partition: &Partition,
        comment_id: &str,
    ) -> Result<usize, RepoError> {
        let removed = self
            .mutate(partition, DocumentKind::Replies, |items: &mut Vec<Reply>| {
                let before = items.len();
                items.retain(|r| r.comment_id != comment_id);
                Ok(before - items.len())
            })
            .await?;

        info!(
            "Deleted {} repl(ies) of comment {} on {}",
            removed, comment_id, partition
        );
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CommentDraft, CommentStatus, PageName, SiteId};

    fn home() -> Partition {
        Partition::new(SiteId::new("S").unwrap(), PageName::new("home").unwrap())
    }

    async fn seeded() -> (Store, String) {
        let store = Store::in_memory();
        let c = store
            .add_comment(&home(), &CommentDraft::new("Hi", "Alice", 10.5, 20.25))
            .await
            .unwrap();
        (store, c.id)
    }

    #[tokio::test]
    async fn reply_is_visible_filtered_and_unfiltered() {
        let (store, cid) = seeded().await;
        let reply = store
            .add_reply(&home(), &cid, None, &ReplyDraft::new(" Hello back ", "Bob"))
            .await
            .unwrap();
        assert_eq!(reply.comment_id, cid);
        assert_eq!(reply.parent_id.as_deref(), Some(cid.as_str()));
        assert_eq!(reply.text, "Hello back");
        assert_eq!(reply.created_at, reply.updated_at);

        let filtered = store.get_replies(&home(), Some(cid.as_str())).await.unwrap();
        assert_eq!(filtered, vec![reply.clone()]);
        let all = store.get_replies(&home(), None).await.unwrap();
        assert!(all.contains(&reply));
        assert!(store.get_replies(&home(), Some("c0")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn nested_replies_form_a_tree() {
        let (store, cid) = seeded().await;
        let top = store
            .add_reply(&home(), &cid, None, &ReplyDraft::new("top", "Bob"))
            .await
            .unwrap();
        let nested = store
            .add_reply(&home(), &cid, Some(top.id.as_str()), &ReplyDraft::new("nested", "Carol"))
            .await
            .unwrap();

        let tree = store.get_reply_tree(&home(), Some(cid.as_str())).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].reply.id, top.id);
        assert_eq!(tree[0].replies[0].reply.id, nested.id);
    }

    #[tokio::test]
    async fn replying_to_missing_or_soft_deleted_comment_fails() {
        let (store, cid) = seeded().await;
        assert!(matches!(
            store
                .add_reply(&home(), "c404", None, &ReplyDraft::new("x", "Bob"))
                .await,
            Err(RepoError::CommentNotFound)
        ));

        store
            .update_comment(&home(), &cid, None, Some(CommentStatus::Deleted))
            .await
            .unwrap();
        assert!(matches!(
            store
                .add_reply(&home(), &cid, None, &ReplyDraft::new("x", "Bob"))
                .await,
            Err(RepoError::CommentNotFound)
        ));
        assert!(store.get_replies(&home(), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reply_validation_runs_before_storage() {
        let (store, cid) = seeded().await;
        assert!(matches!(
            store
                .add_reply(&home(), &cid, None, &ReplyDraft::new("  ", "Bob"))
                .await,
            Err(RepoError::Validation(ValidationError::ReplyText))
        ));
        assert!(matches!(
            store
                .add_reply(&home(), "", None, &ReplyDraft::new("x", "Bob"))
                .await,
            Err(RepoError::Validation(ValidationError::CommentId))
        ));
    }

    #[tokio::test]
    async fn update_reply_scopes_by_comment_when_given() {
        let (store, cid) = seeded().await;
        let reply = store
            .add_reply(&home(), &cid, None, &ReplyDraft::new("typo", "Bob"))
            .await
            .unwrap();

        let fixed = store
            .update_reply(&home(), &reply.id, Some(cid.as_str()), Some(" fixed "))
            .await
            .unwrap();
        assert_eq!(fixed.text, "fixed");
        assert_eq!(fixed.version, reply.version + 1);

        assert!(matches!(
            store
                .update_reply(&home(), &reply.id, Some("c-other"), Some("x"))
                .await,
            Err(RepoError::ReplyNotFound)
        ));
        assert!(matches!(
            store.update_reply(&home(), "r404", None, Some("x")).await,
            Err(RepoError::ReplyNotFound)
        ));
    }

    #[tokio::test]
    async fn delete_cascade_clears_only_matching_replies() {
        let (store, cid) = seeded().await;
        let other = store
            .add_comment(&home(), &CommentDraft::new("Other", "Dan", 0.0, 0.0))
            .await
            .unwrap();
        for text in ["one", "two"] {
            store
                .add_reply(&home(), &cid, None, &ReplyDraft::new(text, "Bob"))
                .await
                .unwrap();
        }
        let kept = store
            .add_reply(&home(), &other.id, None, &ReplyDraft::new("kept", "Bob"))
            .await
            .unwrap();

        store.delete_comment(&home(), &cid).await.unwrap();
        let removed = store.delete_replies_for_comment(&home(), &cid).await.unwrap();
        assert_eq!(removed, 2);

        assert!(store.get_replies(&home(), Some(cid.as_str())).await.unwrap().is_empty());
        assert!(store
            .get_comments(&home())
            .await
            .unwrap()
            .iter()
            .all(|c| c.id != cid));
        assert_eq!(store.get_replies(&home(), None).await.unwrap(), vec![kept]);
    }
}
