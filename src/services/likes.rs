use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::threads::LikeSnapshot;
use crate::error::AppResult;
use crate::models::{Like, LikeState};
use crate::store::{Collection, Filter, RecordId, RecordQuery, RecordStore};

/// Like rows for comments. At most one row per (comment, user) pair is
/// the intended invariant, enforced here by check-then-create - the
/// store itself does not enforce it, and concurrent togglers can race.
#[derive(Clone)]
pub struct LikeService {
    store: Arc<dyn RecordStore>,
}

impl LikeService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn likes_by_comment(&self, comment_id: RecordId) -> Vec<Like> {
        match self.try_likes_by_comment(comment_id).await {
            Ok(likes) => likes,
            Err(err) => {
                tracing::error!(comment_id, error = %err, "failed to fetch likes for comment");
                Vec::new()
            }
        }
    }

    pub async fn like_for(&self, comment_id: RecordId, user_id: RecordId) -> Option<Like> {
        match self.try_like_for(comment_id, user_id).await {
            Ok(like) => like,
            Err(err) => {
                tracing::error!(comment_id, user_id, error = %err, "failed to check user like");
                None
            }
        }
    }

    pub async fn create_like(&self, comment_id: RecordId, user_id: RecordId) -> Option<Like> {
        match self.try_create_like(comment_id, user_id).await {
            Ok(like) => Some(like),
            Err(err) => {
                tracing::error!(comment_id, user_id, error = %err, "failed to create like");
                None
            }
        }
    }

    pub async fn delete_like(&self, like_id: RecordId) -> bool {
        match self.store.delete(Collection::Likes, like_id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::error!(like_id, error = %err, "failed to delete like");
                false
            }
        }
    }

    /// Toggle the viewer's like on a comment: delete the existing row if
    /// present, create one otherwise, then recount from a fresh fetch.
    ///
    /// Fail-soft: any backend error yields `None` and the caller keeps
    /// its prior state. The read-modify-write is not atomic; a failure
    /// partway through leaves whatever half completed.
    pub async fn toggle(&self, comment_id: RecordId, viewer: RecordId) -> Option<LikeState> {
        match self.try_toggle(comment_id, viewer).await {
            Ok(state) => Some(state),
            Err(err) => {
                tracing::error!(comment_id, viewer, error = %err, "failed to toggle like");
                None
            }
        }
    }

    /// Like sets for a batch of comments, as the thread assembler wants
    /// them. Derived fresh on every call; no snapshot is cached.
    pub async fn snapshot_for(&self, comment_ids: &[RecordId]) -> LikeSnapshot {
        match self.try_snapshot_for(comment_ids).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(error = %err, "failed to snapshot likes");
                LikeSnapshot::new()
            }
        }
    }

    async fn try_likes_by_comment(&self, comment_id: RecordId) -> AppResult<Vec<Like>> {
        let records = self
            .store
            .fetch(
                Collection::Likes,
                RecordQuery::new()
                    .filter(Filter::eq("comment_id", comment_id))
                    .order_desc("created_at"),
            )
            .await?;
        records.iter().map(|r| r.decode()).collect()
    }

    async fn try_like_for(
        &self,
        comment_id: RecordId,
        user_id: RecordId,
    ) -> AppResult<Option<Like>> {
        let records = self
            .store
            .fetch(
                Collection::Likes,
                RecordQuery::new()
                    .filter(Filter::eq("comment_id", comment_id))
                    .filter(Filter::eq("user_id", user_id)),
            )
            .await?;
        records.first().map(|r| r.decode()).transpose()
    }

    async fn try_create_like(&self, comment_id: RecordId, user_id: RecordId) -> AppResult<Like> {
        let record = self
            .store
            .create(
                Collection::Likes,
                json!({ "comment_id": comment_id, "user_id": user_id }),
            )
            .await?;
        record.decode()
    }

    async fn try_toggle(&self, comment_id: RecordId, viewer: RecordId) -> AppResult<LikeState> {
        match self.try_like_for(comment_id, viewer).await? {
            Some(like) => {
                self.store.delete(Collection::Likes, like.id).await?;
            }
            None => {
                self.try_create_like(comment_id, viewer).await?;
            }
        }

        let likes = self.try_likes_by_comment(comment_id).await?;
        Ok(LikeState {
            liked: likes.iter().any(|l| l.user_id == viewer),
            count: likes.len(),
        })
    }

    async fn try_snapshot_for(&self, comment_ids: &[RecordId]) -> AppResult<LikeSnapshot> {
        if comment_ids.is_empty() {
            return Ok(LikeSnapshot::new());
        }

        let records = self
            .store
            .fetch(
                Collection::Likes,
                RecordQuery::new().filter(Filter::any_of(
                    "comment_id",
                    comment_ids.iter().map(|id| Value::from(*id)).collect(),
                )),
            )
            .await?;

        let mut snapshot = LikeSnapshot::new();
        for record in &records {
            let like: Like = record.decode()?;
            snapshot.entry(like.comment_id).or_default().insert(like.user_id);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::UnavailableStore;
    use crate::store::SqliteStore;

    async fn service() -> LikeService {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.init().await.unwrap();
        LikeService::new(Arc::new(store))
    }

    #[tokio::test]
    async fn toggle_twice_returns_to_original_state() {
        let service = service().await;

        let liked = service.toggle(1, 7).await.unwrap();
        assert_eq!(
            liked,
            LikeState {
                liked: true,
                count: 1
            }
        );

        let unliked = service.toggle(1, 7).await.unwrap();
        assert_eq!(
            unliked,
            LikeState {
                liked: false,
                count: 0
            }
        );
    }

    #[tokio::test]
    async fn toggle_counts_other_likers() {
        let service = service().await;

        service.toggle(1, 3).await.unwrap();
        let state = service.toggle(1, 7).await.unwrap();

        assert_eq!(
            state,
            LikeState {
                liked: true,
                count: 2
            }
        );

        // 7 backs out; 3's like stays
        let state = service.toggle(1, 7).await.unwrap();
        assert_eq!(
            state,
            LikeState {
                liked: false,
                count: 1
            }
        );
    }

    #[tokio::test]
    async fn at_most_one_row_per_user() {
        let service = service().await;

        service.toggle(1, 7).await.unwrap();
        let like = service.like_for(1, 7).await.unwrap();
        assert_eq!(like.user_id, 7);

        let likes = service.likes_by_comment(1).await;
        assert_eq!(likes.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_groups_by_comment() {
        let service = service().await;

        service.toggle(1, 3).await.unwrap();
        service.toggle(1, 7).await.unwrap();
        service.toggle(2, 3).await.unwrap();

        let snapshot = service.snapshot_for(&[1, 2, 3]).await;
        assert_eq!(snapshot[&1].len(), 2);
        assert_eq!(snapshot[&2].len(), 1);
        assert!(!snapshot.contains_key(&3));
    }

    #[tokio::test]
    async fn toggle_is_a_no_op_when_store_is_down() {
        let service = LikeService::new(Arc::new(UnavailableStore));
        assert!(service.toggle(1, 7).await.is_none());
        assert!(service.snapshot_for(&[1]).await.is_empty());
    }
}
