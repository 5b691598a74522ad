use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{LikeState, Post, SavedPost};
use crate::store::{Collection, Filter, RecordId, RecordQuery, RecordStore};

#[derive(Debug, Clone)]
pub struct NewPost {
    pub content: String,
    pub image_url: Option<String>,
    pub author_id: RecordId,
}

/// Updateable post fields; absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub content: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn RecordStore>,
}

impl PostService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Newest-first feed. Friend filtering is a backend concern this
    /// client does not own yet; the feed is simply the latest posts.
    pub async fn feed(&self, limit: usize) -> Vec<Post> {
        match self
            .try_fetch(RecordQuery::new().order_desc("created_at").page(limit, 0))
            .await
        {
            Ok(posts) => posts,
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch feed");
                Vec::new()
            }
        }
    }

    pub async fn get_by_user(&self, user_id: RecordId) -> Vec<Post> {
        match self
            .try_fetch(
                RecordQuery::new()
                    .filter(Filter::eq("author_id", user_id))
                    .order_desc("created_at")
                    .page(100, 0),
            )
            .await
        {
            Ok(posts) => posts,
            Err(err) => {
                tracing::error!(user_id, error = %err, "failed to fetch user posts");
                Vec::new()
            }
        }
    }

    pub async fn get_by_id(&self, id: RecordId) -> Option<Post> {
        match self.try_get_by_id(id).await {
            Ok(post) => post,
            Err(err) => {
                tracing::error!(post_id = id, error = %err, "failed to fetch post");
                None
            }
        }
    }

    pub async fn create(&self, new: NewPost) -> Option<Post> {
        match self.try_create(new).await {
            Ok(post) => Some(post),
            Err(err) => {
                tracing::error!(error = %err, "failed to create post");
                None
            }
        }
    }

    pub async fn update(&self, id: RecordId, update: PostUpdate) -> Option<Post> {
        let mut patch = Map::new();
        if let Some(content) = update.content {
            patch.insert("content".to_string(), Value::String(content));
        }
        if let Some(image_url) = update.image_url {
            patch.insert("image_url".to_string(), Value::String(image_url));
        }

        match self.try_update(id, Value::Object(patch)).await {
            Ok(post) => Some(post),
            Err(err) => {
                tracing::error!(post_id = id, error = %err, "failed to update post");
                None
            }
        }
    }

    pub async fn delete(&self, id: RecordId) -> bool {
        match self.store.delete(Collection::Posts, id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::error!(post_id = id, error = %err, "failed to delete post");
                false
            }
        }
    }

    /// Toggle the viewer's membership in the post's inline like list.
    /// Read-modify-write on the stored array; not atomic.
    pub async fn toggle_like(&self, post_id: RecordId, viewer: RecordId) -> Option<LikeState> {
        match self.try_toggle_like(post_id, viewer).await {
            Ok(state) => Some(state),
            Err(err) => {
                tracing::error!(post_id, viewer, error = %err, "failed to toggle post like");
                None
            }
        }
    }

    /// Set the user's reaction on a post. A user holds at most one emoji
    /// per post: they are removed from every other emoji's set first,
    /// and emptied sets are pruned.
    pub async fn add_reaction(&self, post_id: RecordId, user_id: RecordId, emoji: &str) -> Option<Post> {
        match self.try_set_reaction(post_id, user_id, Some(emoji)).await {
            Ok(post) => Some(post),
            Err(err) => {
                tracing::error!(post_id, user_id, error = %err, "failed to add reaction");
                None
            }
        }
    }

    pub async fn remove_reaction(&self, post_id: RecordId, user_id: RecordId) -> Option<Post> {
        match self.try_set_reaction(post_id, user_id, None).await {
            Ok(post) => Some(post),
            Err(err) => {
                tracing::error!(post_id, user_id, error = %err, "failed to remove reaction");
                None
            }
        }
    }

    pub async fn save_post(&self, post_id: RecordId, user_id: RecordId) -> Option<SavedPost> {
        match self.try_save(post_id, user_id).await {
            Ok(saved) => Some(saved),
            Err(err) => {
                tracing::error!(post_id, user_id, error = %err, "failed to save post");
                None
            }
        }
    }

    pub async fn unsave_post(&self, post_id: RecordId, user_id: RecordId) -> bool {
        match self.try_unsave(post_id, user_id).await {
            Ok(removed) => removed,
            Err(err) => {
                tracing::error!(post_id, user_id, error = %err, "failed to unsave post");
                false
            }
        }
    }

    pub async fn is_saved(&self, post_id: RecordId, user_id: RecordId) -> bool {
        match self.try_find_saved(post_id, user_id).await {
            Ok(found) => found.is_some(),
            Err(err) => {
                tracing::error!(post_id, user_id, error = %err, "failed to check save status");
                false
            }
        }
    }

    async fn try_fetch(&self, query: RecordQuery) -> AppResult<Vec<Post>> {
        let records = self.store.fetch(Collection::Posts, query).await?;
        records.iter().map(|r| r.decode()).collect()
    }

    async fn try_get_by_id(&self, id: RecordId) -> AppResult<Option<Post>> {
        let record = self.store.get_by_id(Collection::Posts, id).await?;
        record.as_ref().map(|r| r.decode()).transpose()
    }

    async fn try_create(&self, new: NewPost) -> AppResult<Post> {
        let record = self
            .store
            .create(
                Collection::Posts,
                json!({
                    "content": new.content,
                    "image_url": new.image_url.unwrap_or_default(),
                    "author_id": new.author_id,
                    "comment_count": 0,
                    "likes": [],
                    "reactions": {},
                }),
            )
            .await?;
        record.decode()
    }

    async fn try_update(&self, id: RecordId, patch: Value) -> AppResult<Post> {
        let record = self.store.update(Collection::Posts, id, patch).await?;
        record.decode()
    }

    async fn try_toggle_like(&self, post_id: RecordId, viewer: RecordId) -> AppResult<LikeState> {
        let post = self
            .try_get_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        let token = viewer.to_string();
        let mut likes = post.likes;
        let liked = if likes.contains(&token) {
            likes.retain(|id| *id != token);
            false
        } else {
            likes.push(token);
            true
        };
        let count = likes.len();

        self.try_update(post_id, json!({ "likes": likes })).await?;
        Ok(LikeState { liked, count })
    }

    async fn try_set_reaction(
        &self,
        post_id: RecordId,
        user_id: RecordId,
        emoji: Option<&str>,
    ) -> AppResult<Post> {
        let post = self
            .try_get_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        let token = user_id.to_string();
        let mut reactions = post.reactions;

        for users in reactions.values_mut() {
            users.retain(|id| *id != token);
        }
        reactions.retain(|_, users| !users.is_empty());

        if let Some(emoji) = emoji {
            let users = reactions.entry(emoji.to_string()).or_default();
            if !users.contains(&token) {
                users.push(token);
            }
        }

        self.try_update(post_id, json!({ "reactions": reactions }))
            .await
    }

    async fn try_find_saved(
        &self,
        post_id: RecordId,
        user_id: RecordId,
    ) -> AppResult<Option<SavedPost>> {
        let records = self
            .store
            .fetch(
                Collection::SavedPosts,
                RecordQuery::new()
                    .filter(Filter::eq("post_id", post_id))
                    .filter(Filter::eq("user_id", user_id)),
            )
            .await?;
        records.first().map(|r| r.decode()).transpose()
    }

    async fn try_save(&self, post_id: RecordId, user_id: RecordId) -> AppResult<SavedPost> {
        if let Some(existing) = self.try_find_saved(post_id, user_id).await? {
            return Ok(existing);
        }
        let record = self
            .store
            .create(
                Collection::SavedPosts,
                json!({ "post_id": post_id, "user_id": user_id }),
            )
            .await?;
        record.decode()
    }

    async fn try_unsave(&self, post_id: RecordId, user_id: RecordId) -> AppResult<bool> {
        match self.try_find_saved(post_id, user_id).await? {
            Some(saved) => self.store.delete(Collection::SavedPosts, saved.id).await,
            None => Ok(false),
        }
    }
}
