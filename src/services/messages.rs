use serde_json::json;
use std::sync::Arc;

use crate::core::conversations::group_by_conversation;
use crate::error::AppResult;
use crate::models::{Conversation, Message};
use crate::store::{Collection, Filter, RecordId, RecordQuery, RecordStore};

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub conversation_id: String,
    pub sender_id: RecordId,
}

#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn RecordStore>,
}

impl MessageService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn get_all(&self) -> Vec<Message> {
        match self.try_fetch(RecordQuery::new().order_asc("created_at").page(1000, 0)).await {
            Ok(messages) => messages,
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch messages");
                Vec::new()
            }
        }
    }

    pub async fn get_by_conversation(&self, conversation_id: &str) -> Vec<Message> {
        match self.try_get_by_conversation(conversation_id).await {
            Ok(messages) => messages,
            Err(err) => {
                tracing::error!(conversation_id, error = %err, "failed to fetch conversation messages");
                Vec::new()
            }
        }
    }

    /// Conversation summaries for a viewer: fetch newest-first (the
    /// ordering the aggregation relies on), then group.
    pub async fn conversations_for(&self, viewer: RecordId) -> Vec<Conversation> {
        let messages = match self
            .try_fetch(RecordQuery::new().order_desc("created_at").page(1000, 0))
            .await
        {
            Ok(messages) => messages,
            Err(err) => {
                tracing::error!(viewer, error = %err, "failed to fetch messages for conversations");
                return Vec::new();
            }
        };

        group_by_conversation(&messages, viewer)
    }

    pub async fn send(&self, new: NewMessage) -> Option<Message> {
        match self.try_send(new).await {
            Ok(message) => Some(message),
            Err(err) => {
                tracing::error!(error = %err, "failed to send message");
                None
            }
        }
    }

    pub async fn mark_read(&self, id: RecordId) -> Option<Message> {
        match self.try_mark_read(id).await {
            Ok(message) => Some(message),
            Err(err) => {
                tracing::error!(message_id = id, error = %err, "failed to mark message read");
                None
            }
        }
    }

    /// Mark every unread peer message of a conversation as read, one
    /// update per message - the store offers no batch primitive here.
    /// Returns the number of successful updates; a failed update is
    /// skipped, not retried or rolled back, so partial completion is a
    /// possible end state.
    pub async fn mark_conversation_read(&self, conversation_id: &str, viewer: RecordId) -> usize {
        let messages = match self.try_get_by_conversation(conversation_id).await {
            Ok(messages) => messages,
            Err(err) => {
                tracing::error!(conversation_id, error = %err, "failed to fetch conversation for read-marking");
                return 0;
            }
        };

        let mut marked = 0;
        for message in messages.iter().filter(|m| m.sender_id != viewer && !m.read) {
            match self
                .store
                .update(Collection::Messages, message.id, json!({ "read": true }))
                .await
            {
                Ok(_) => marked += 1,
                Err(err) => {
                    tracing::warn!(message_id = message.id, error = %err, "skipping message that failed to mark read");
                }
            }
        }
        marked
    }

    pub async fn delete(&self, id: RecordId) -> bool {
        match self.store.delete(Collection::Messages, id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::error!(message_id = id, error = %err, "failed to delete message");
                false
            }
        }
    }

    async fn try_fetch(&self, query: RecordQuery) -> AppResult<Vec<Message>> {
        let records = self.store.fetch(Collection::Messages, query).await?;
        records.iter().map(|r| r.decode()).collect()
    }

    async fn try_get_by_conversation(&self, conversation_id: &str) -> AppResult<Vec<Message>> {
        self.try_fetch(
            RecordQuery::new()
                .filter(Filter::eq("conversation_id", conversation_id))
                .order_asc("created_at")
                .page(1000, 0),
        )
        .await
    }

    async fn try_send(&self, new: NewMessage) -> AppResult<Message> {
        let record = self
            .store
            .create(
                Collection::Messages,
                json!({
                    "content": new.content,
                    "conversation_id": new.conversation_id,
                    "sender_id": new.sender_id,
                    "read": false,
                }),
            )
            .await?;
        record.decode()
    }

    async fn try_mark_read(&self, id: RecordId) -> AppResult<Message> {
        let record = self
            .store
            .update(Collection::Messages, id, json!({ "read": true }))
            .await?;
        record.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::UnavailableStore;
    use crate::store::SqliteStore;

    async fn service() -> MessageService {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.init().await.unwrap();
        MessageService::new(Arc::new(store))
    }

    fn new_message(conversation_id: &str, sender_id: RecordId, content: &str) -> NewMessage {
        NewMessage {
            content: content.to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id,
        }
    }

    #[tokio::test]
    async fn send_creates_unread_messages() {
        let service = service().await;

        let message = service.send(new_message("3-7", 3, "hey")).await.unwrap();
        assert!(!message.read);
        assert_eq!(message.conversation_id, "3-7");
    }

    #[tokio::test]
    async fn conversations_are_scoped_to_the_viewer() {
        let service = service().await;

        service.send(new_message("3-7", 3, "to seven")).await.unwrap();
        service.send(new_message("5-9", 5, "elsewhere")).await.unwrap();

        let conversations = service.conversations_for(7).await;
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].conversation_id, "3-7");
        assert_eq!(conversations[0].unread_count, 1);

        assert!(service.conversations_for(2).await.is_empty());
    }

    #[tokio::test]
    async fn mark_conversation_read_counts_peer_messages_only() {
        let service = service().await;

        // 3 unread from the peer, 1 already read, 1 own unread message.
        for content in ["a", "b", "c"] {
            service.send(new_message("3-7", 3, content)).await.unwrap();
        }
        let read = service.send(new_message("3-7", 3, "d")).await.unwrap();
        service.mark_read(read.id).await.unwrap();
        service.send(new_message("3-7", 7, "mine")).await.unwrap();

        let marked = service.mark_conversation_read("3-7", 7).await;
        assert_eq!(marked, 3);

        let conversations = service.conversations_for(7).await;
        assert_eq!(conversations[0].unread_count, 0);

        // Own message is untouched by read-marking for the viewer.
        let own = service
            .get_by_conversation("3-7")
            .await
            .into_iter()
            .find(|m| m.sender_id == 7)
            .unwrap();
        assert!(!own.read);
    }

    #[tokio::test]
    async fn mark_conversation_read_is_zero_when_store_is_down() {
        let service = MessageService::new(Arc::new(UnavailableStore));
        assert_eq!(service.mark_conversation_read("3-7", 7).await, 0);
        assert!(service.conversations_for(7).await.is_empty());
        assert!(service.send(new_message("3-7", 3, "x")).await.is_none());
    }
}
