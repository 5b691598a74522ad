use serde_json::json;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::Notification;
use crate::store::{Collection, Filter, RecordId, RecordQuery, RecordStore};

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub message: String,
    pub kind: String,
    pub actor_id: RecordId,
    pub user_id: RecordId,
    pub target_id: Option<RecordId>,
}

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn RecordStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn get_for_user(&self, user_id: RecordId) -> Vec<Notification> {
        match self.try_get_for_user(user_id).await {
            Ok(notifications) => notifications,
            Err(err) => {
                tracing::error!(user_id, error = %err, "failed to fetch notifications");
                Vec::new()
            }
        }
    }

    pub async fn unread_count(&self, user_id: RecordId) -> usize {
        match self.try_unread(user_id).await {
            Ok(unread) => unread.len(),
            Err(err) => {
                tracing::error!(user_id, error = %err, "failed to count unread notifications");
                0
            }
        }
    }

    pub async fn notify(&self, new: NewNotification) -> Option<Notification> {
        match self.try_notify(new).await {
            Ok(notification) => Some(notification),
            Err(err) => {
                tracing::error!(error = %err, "failed to create notification");
                None
            }
        }
    }

    pub async fn mark_read(&self, id: RecordId) -> Option<Notification> {
        match self.try_mark_read(id).await {
            Ok(notification) => Some(notification),
            Err(err) => {
                tracing::error!(notification_id = id, error = %err, "failed to mark notification read");
                None
            }
        }
    }

    /// Mark all of a user's unread notifications read, one update per
    /// record. Returns the success count; failures are skipped.
    pub async fn mark_all_read(&self, user_id: RecordId) -> usize {
        let unread = match self.try_unread(user_id).await {
            Ok(unread) => unread,
            Err(err) => {
                tracing::error!(user_id, error = %err, "failed to fetch unread notifications");
                return 0;
            }
        };

        let mut marked = 0;
        for notification in &unread {
            match self
                .store
                .update(Collection::Notifications, notification.id, json!({ "read": true }))
                .await
            {
                Ok(_) => marked += 1,
                Err(err) => {
                    tracing::warn!(notification_id = notification.id, error = %err, "skipping notification that failed to mark read");
                }
            }
        }
        marked
    }

    pub async fn delete(&self, id: RecordId) -> bool {
        match self.store.delete(Collection::Notifications, id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::error!(notification_id = id, error = %err, "failed to delete notification");
                false
            }
        }
    }

    async fn try_get_for_user(&self, user_id: RecordId) -> AppResult<Vec<Notification>> {
        let records = self
            .store
            .fetch(
                Collection::Notifications,
                RecordQuery::new()
                    .filter(Filter::eq("user_id", user_id))
                    .order_desc("created_at")
                    .page(100, 0),
            )
            .await?;
        records.iter().map(|r| r.decode()).collect()
    }

    async fn try_unread(&self, user_id: RecordId) -> AppResult<Vec<Notification>> {
        let records = self
            .store
            .fetch(
                Collection::Notifications,
                RecordQuery::new()
                    .filter(Filter::eq("user_id", user_id))
                    .filter(Filter::eq("read", false)),
            )
            .await?;
        records.iter().map(|r| r.decode()).collect()
    }

    async fn try_notify(&self, new: NewNotification) -> AppResult<Notification> {
        let record = self
            .store
            .create(
                Collection::Notifications,
                json!({
                    "message": new.message,
                    "kind": new.kind,
                    "read": false,
                    "actor_id": new.actor_id,
                    "user_id": new.user_id,
                    "target_id": new.target_id,
                }),
            )
            .await?;
        record.decode()
    }

    async fn try_mark_read(&self, id: RecordId) -> AppResult<Notification> {
        let record = self
            .store
            .update(Collection::Notifications, id, json!({ "read": true }))
            .await?;
        record.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::UnavailableStore;
    use crate::store::SqliteStore;

    async fn service() -> NotificationService {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.init().await.unwrap();
        NotificationService::new(Arc::new(store))
    }

    fn liked_your_post(user_id: RecordId) -> NewNotification {
        NewNotification {
            message: "liked your post".to_string(),
            kind: "like".to_string(),
            actor_id: 3,
            user_id,
            target_id: Some(10),
        }
    }

    #[tokio::test]
    async fn unread_count_tracks_reads() {
        let service = service().await;

        let first = service.notify(liked_your_post(7)).await.unwrap();
        service.notify(liked_your_post(7)).await.unwrap();
        service.notify(liked_your_post(9)).await.unwrap();

        assert_eq!(service.unread_count(7).await, 2);

        service.mark_read(first.id).await.unwrap();
        assert_eq!(service.unread_count(7).await, 1);
    }

    #[tokio::test]
    async fn mark_all_read_returns_success_count() {
        let service = service().await;

        for _ in 0..3 {
            service.notify(liked_your_post(7)).await.unwrap();
        }

        assert_eq!(service.mark_all_read(7).await, 3);
        assert_eq!(service.unread_count(7).await, 0);
        // Nothing left to mark on a second pass.
        assert_eq!(service.mark_all_read(7).await, 0);
    }

    #[tokio::test]
    async fn unavailable_store_collapses_to_falsy_results() {
        let service = NotificationService::new(Arc::new(UnavailableStore));
        assert!(service.get_for_user(7).await.is_empty());
        assert_eq!(service.unread_count(7).await, 0);
        assert!(service.notify(liked_your_post(7)).await.is_none());
        assert_eq!(service.mark_all_read(7).await, 0);
    }
}
