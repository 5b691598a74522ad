use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::Comment;
use crate::store::{Collection, Filter, RecordId, RecordQuery, RecordStore};

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub author_id: RecordId,
    pub post_id: RecordId,
    pub parent_id: Option<RecordId>,
}

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn RecordStore>,
}

impl CommentService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn get_all(&self) -> Vec<Comment> {
        match self.try_get_all().await {
            Ok(comments) => comments,
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch comments");
                Vec::new()
            }
        }
    }

    /// Comments of one post in ascending creation order - the order the
    /// thread assembler expects.
    pub async fn get_by_post(&self, post_id: RecordId) -> Vec<Comment> {
        match self.try_get_by_post(post_id).await {
            Ok(comments) => comments,
            Err(err) => {
                tracing::error!(post_id, error = %err, "failed to fetch comments for post");
                Vec::new()
            }
        }
    }

    pub async fn get_by_id(&self, id: RecordId) -> Option<Comment> {
        match self.try_get_by_id(id).await {
            Ok(comment) => comment,
            Err(err) => {
                tracing::error!(comment_id = id, error = %err, "failed to fetch comment");
                None
            }
        }
    }

    pub async fn create(&self, new: NewComment) -> Option<Comment> {
        match self.try_create(new).await {
            Ok(comment) => Some(comment),
            Err(err) => {
                tracing::error!(error = %err, "failed to create comment");
                None
            }
        }
    }

    /// Reply to an existing comment. The parent must resolve; replying
    /// to a missing parent creates nothing. No depth limit is enforced.
    pub async fn reply_to_comment(&self, parent_id: RecordId, new: NewComment) -> Option<Comment> {
        match self.try_reply(parent_id, new).await {
            Ok(comment) => Some(comment),
            Err(err) => {
                tracing::error!(parent_id, error = %err, "failed to reply to comment");
                None
            }
        }
    }

    pub async fn update_content(&self, id: RecordId, content: &str) -> Option<Comment> {
        match self.try_update(id, json!({ "content": content })).await {
            Ok(comment) => Some(comment),
            Err(err) => {
                tracing::error!(comment_id = id, error = %err, "failed to update comment");
                None
            }
        }
    }

    pub async fn delete(&self, id: RecordId) -> bool {
        match self.try_delete(id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::error!(comment_id = id, error = %err, "failed to delete comment");
                false
            }
        }
    }

    async fn try_get_all(&self) -> AppResult<Vec<Comment>> {
        let records = self
            .store
            .fetch(
                Collection::Comments,
                RecordQuery::new().order_desc("created_at").page(100, 0),
            )
            .await?;
        records.iter().map(|r| r.decode()).collect()
    }

    async fn try_get_by_post(&self, post_id: RecordId) -> AppResult<Vec<Comment>> {
        let records = self
            .store
            .fetch(
                Collection::Comments,
                RecordQuery::new()
                    .filter(Filter::eq("post_id", post_id))
                    .order_asc("created_at")
                    .page(100, 0),
            )
            .await?;
        records.iter().map(|r| r.decode()).collect()
    }

    async fn try_get_by_id(&self, id: RecordId) -> AppResult<Option<Comment>> {
        let record = self.store.get_by_id(Collection::Comments, id).await?;
        record.as_ref().map(|r| r.decode()).transpose()
    }

    async fn try_create(&self, new: NewComment) -> AppResult<Comment> {
        let record = self
            .store
            .create(
                Collection::Comments,
                json!({
                    "content": new.content,
                    "author_id": new.author_id,
                    "post_id": new.post_id,
                    "parent_id": new.parent_id,
                    "likes": [],
                }),
            )
            .await?;
        let comment: Comment = record.decode()?;

        // Best-effort counter maintenance; a failed bump leaves the
        // counter stale, not the comment missing.
        if let Err(err) = self.bump_comment_count(new.post_id, 1).await {
            tracing::warn!(post_id = new.post_id, error = %err, "comment created but counter not bumped");
        }

        Ok(comment)
    }

    async fn try_reply(&self, parent_id: RecordId, new: NewComment) -> AppResult<Comment> {
        let parent = self.try_get_by_id(parent_id).await?;
        let Some(parent) = parent else {
            return Err(AppError::NotFound(format!(
                "parent comment {} not found",
                parent_id
            )));
        };

        self.try_create(NewComment {
            parent_id: Some(parent.id),
            ..new
        })
        .await
    }

    async fn try_update(&self, id: RecordId, patch: Value) -> AppResult<Comment> {
        let record = self.store.update(Collection::Comments, id, patch).await?;
        record.decode()
    }

    async fn try_delete(&self, id: RecordId) -> AppResult<bool> {
        let comment = self.try_get_by_id(id).await?;
        let deleted = self.store.delete(Collection::Comments, id).await?;
        if deleted {
            if let Some(comment) = comment {
                if let Err(err) = self.bump_comment_count(comment.post_id, -1).await {
                    tracing::warn!(post_id = comment.post_id, error = %err, "comment deleted but counter not bumped");
                }
            }
        }
        Ok(deleted)
    }

    async fn bump_comment_count(&self, post_id: RecordId, delta: i64) -> AppResult<()> {
        let post = self
            .store
            .get_by_id(Collection::Posts, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        let current = post
            .fields
            .get("comment_count")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let next = (current + delta).max(0);

        self.store
            .update(Collection::Posts, post_id, json!({ "comment_count": next }))
            .await?;
        Ok(())
    }
}
