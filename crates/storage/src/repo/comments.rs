use crate::{DocumentKind, RepoError, Store};
use chrono::Utc;
use domain::{
    next_id, normalize_edit_text, Comment, CommentDraft, CommentStatus, Partition,
    ValidationError,
};
use tracing::info;

impl Store {
    /// The stored array as-is; soft-deleted comments are included.
    pub async fn get_comments(&self, partition: &Partition) -> Result<Vec<Comment>, RepoError> {
        Ok(self.load(partition, DocumentKind::Comments).await?)
    }

    pub async fn get_comment(
        &self,
        partition: &Partition,
        comment_id: &str,
    ) -> Result<Option<Comment>, RepoError> {
        let comments = self.get_comments(partition).await?;
        Ok(comments.into_iter().find(|c| c.id == comment_id))
    }

    pub async fn add_comment(
        &self,
        partition: &Partition,
        draft: &CommentDraft,
    ) -> Result<Comment, RepoError> {
        // 校验失败时不触碰存储
        let draft = draft.validate()?;

        let comment = self
            .mutate(partition, DocumentKind::Comments, |items: &mut Vec<Comment>| {
                let now = Utc::now();
                let id = next_id('c', now, |candidate| items.iter().any(|c| c.id == candidate));
                let comment = Comment {
                    id,
                    text: draft.text.clone(),
                    user: draft.user.clone(),
                    x: draft.x,
                    y: draft.y,
                    page_name: partition.page.clone(),
                    site_id: partition.site_id.clone(),
                    status: CommentStatus::Open,
                    created_at: now,
                    updated_at: now,
                    version: 1,
                };
                items.push(comment.clone());
                Ok(comment)
            })
            .await?;

        info!("Comment {} added on {}", comment.id, partition);
        Ok(comment)
    }

    /// `text` and `status` are replaced independently; passing neither only
    /// bumps `updated_at`.
    pub async fn update_comment(
        &self,
        partition: &Partition,
        comment_id: &str,
        text: Option<&str>,
        status: Option<CommentStatus>,
    ) -> Result<Comment, RepoError> {
        if comment_id.trim().is_empty() {
            return Err(ValidationError::CommentId.into());
        }
        let text = text
            .map(|t| normalize_edit_text(t, ValidationError::CommentText))
            .transpose()?;

        let updated = self
            .mutate(partition, DocumentKind::Comments, |items: &mut Vec<Comment>| {
                let comment = items
                    .iter_mut()
                    .find(|c| c.id == comment_id)
                    .ok_or(RepoError::CommentNotFound)?;
                if let Some(text) = &text {
                    comment.text = text.clone();
                }
                if let Some(status) = status {
                    comment.status = status;
                }
                comment.updated_at = Utc::now();
                comment.version += 1;
                Ok(comment.clone())
            })
            .await?;

        info!(
            "Comment {} updated on {} (status={})",
            updated.id, partition, updated.status
        );
        Ok(updated)
    }

    /// Hard delete: the record is removed from the array. Replies are left to
    /// [`Store::delete_replies_for_comment`].
    pub async fn delete_comment(
        &self,
        partition: &Partition,
        comment_id: &str,
    ) -> Result<String, RepoError> {
        self.mutate(partition, DocumentKind::Comments, |items: &mut Vec<Comment>| {
            let before = items.len();
            items.retain(|c| c.id != comment_id);
            if items.len() == before {
                return Err(RepoError::CommentNotFound);
            }
            Ok(())
        })
        .await?;

        info!("Comment {} deleted from {}", comment_id, partition);
        Ok(comment_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{PageName, SiteId};

    fn home() -> Partition {
        Partition::new(SiteId::new("S").unwrap(), PageName::new("home").unwrap())
    }

    #[tokio::test]
    async fn add_then_get_round_trips_fields() {
        let store = Store::in_memory();
        let draft = CommentDraft::new(" Hi ", "Alice", 10.5, 20.25);

        let created = store.add_comment(&home(), &draft).await.unwrap();
        assert!(created.id.starts_with('c'));
        assert_eq!(created.status, CommentStatus::Open);
        assert_eq!(created.created_at, created.updated_at);

        let stored = store.get_comments(&home()).await.unwrap();
        assert_eq!(stored, vec![created.clone()]);
        assert_eq!(stored[0].text, "Hi");
        assert_eq!((stored[0].x, stored[0].y), (10.5, 20.25));
        assert_eq!(stored[0].page_name.as_str(), "home");
        assert_eq!(stored[0].site_id.as_str(), "S");
    }

    #[tokio::test]
    async fn ids_stay_unique_within_a_partition() {
        let store = Store::in_memory();
        let mut ids = std::collections::HashSet::new();
        for i in 0..20 {
            let c = store
                .add_comment(&home(), &CommentDraft::new(format!("n{}", i), "A", 1.0, 1.0))
                .await
                .unwrap();
            assert!(ids.insert(c.id));
        }
    }

    #[tokio::test]
    async fn invalid_draft_leaves_array_untouched() {
        let store = Store::in_memory();
        store
            .add_comment(&home(), &CommentDraft::new("first", "A", 1.0, 1.0))
            .await
            .unwrap();

        let err = store
            .add_comment(&home(), &CommentDraft::new("Hi", "Alice", f64::NAN, 2.0))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(ValidationError::Coordinates)));
        assert!(err.is_client_error());
        assert_eq!(store.get_comments(&home()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_update_leaves_text_and_siblings_alone() {
        let store = Store::in_memory();
        let a = store
            .add_comment(&home(), &CommentDraft::new("A", "Alice", 1.0, 1.0))
            .await
            .unwrap();
        let b = store
            .add_comment(&home(), &CommentDraft::new("B", "Bob", 2.0, 2.0))
            .await
            .unwrap();

        let updated = store
            .update_comment(&home(), &a.id, None, Some(CommentStatus::Resolved))
            .await
            .unwrap();
        assert_eq!(updated.status, CommentStatus::Resolved);
        assert_eq!(updated.text, "A");
        assert!(updated.updated_at >= a.updated_at);
        assert_eq!(updated.version, a.version + 1);

        let stored = store.get_comments(&home()).await.unwrap();
        assert_eq!(stored[1], b);
    }

    #[tokio::test]
    async fn text_edit_is_trimmed_and_blank_edit_rejected() {
        let store = Store::in_memory();
        let a = store
            .add_comment(&home(), &CommentDraft::new("A", "Alice", 1.0, 1.0))
            .await
            .unwrap();

        let edited = store
            .update_comment(&home(), &a.id, Some("  better  "), None)
            .await
            .unwrap();
        assert_eq!(edited.text, "better");
        assert_eq!(edited.status, CommentStatus::Open);

        let err = store
            .update_comment(&home(), &a.id, Some("   "), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(ValidationError::CommentText)));
    }

    #[tokio::test]
    async fn empty_update_only_touches_timestamp() {
        let store = Store::in_memory();
        let a = store
            .add_comment(&home(), &CommentDraft::new("A", "Alice", 1.0, 1.0))
            .await
            .unwrap();

        let touched = store
            .update_comment(&home(), &a.id, None, None)
            .await
            .unwrap();
        assert_eq!(touched.text, "A");
        assert_eq!(touched.status, CommentStatus::Open);
        assert!(touched.updated_at >= a.updated_at);
        assert_eq!(touched.version, a.version + 1);
        assert_eq!(store.get_comments(&home()).await.unwrap(), vec![touched]);
    }

    #[tokio::test]
    async fn soft_delete_keeps_record() {
        let store = Store::in_memory();
        let a = store
            .add_comment(&home(), &CommentDraft::new("A", "Alice", 1.0, 1.0))
            .await
            .unwrap();
        store
            .update_comment(&home(), &a.id, None, Some(CommentStatus::Deleted))
            .await
            .unwrap();

        let stored = store.get_comments(&home()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].status.is_deleted());
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let store = Store::in_memory();
        assert!(matches!(
            store.update_comment(&home(), "c404", Some("x"), None).await,
            Err(RepoError::CommentNotFound)
        ));
        assert!(matches!(
            store.delete_comment(&home(), "c404").await,
            Err(RepoError::CommentNotFound)
        ));
    }

    #[tokio::test]
    async fn hard_delete_removes_record() {
        let store = Store::in_memory();
        let a = store
            .add_comment(&home(), &CommentDraft::new("A", "Alice", 1.0, 1.0))
            .await
            .unwrap();
        assert_eq!(store.delete_comment(&home(), &a.id).await.unwrap(), a.id);
        assert!(store.get_comments(&home()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partitions_are_isolated() {
        let store = Store::in_memory();
        let other = Partition::new(SiteId::new("T").unwrap(), PageName::new("home").unwrap());
        store
            .add_comment(&home(), &CommentDraft::new("A", "Alice", 1.0, 1.0))
            .await
            .unwrap();
        assert!(store.get_comments(&other).await.unwrap().is_empty());
    }
}
