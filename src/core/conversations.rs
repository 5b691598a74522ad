// Conversation aggregation: fold a flat message list into per-viewer
// conversation summaries (last message, unread count), newest first.

use std::collections::HashMap;

use crate::models::{Conversation, ConversationKey, Message};
use crate::store::RecordId;

/// Group a message batch into conversation summaries for one viewer.
///
/// A message qualifies when the viewer's decimal form is one of the
/// `-`-separated tokens of its conversation id; the id itself is treated
/// as an opaque composite key and is not validated here. Buckets keep
/// arrival order.
///
/// The input is expected pre-sorted by `created_at` descending; the
/// first message seen per bucket is taken as the last message. That
/// precondition is not re-verified - unsorted input picks the wrong
/// last message.
pub fn group_by_conversation(messages: &[Message], viewer: RecordId) -> Vec<Conversation> {
    let mut bucket_order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<&Message>> = HashMap::new();

    for message in messages {
        let key = ConversationKey::from_raw(message.conversation_id.as_str());
        if !key.involves(viewer) {
            continue;
        }
        let bucket = buckets.entry(message.conversation_id.clone()).or_default();
        if bucket.is_empty() {
            bucket_order.push(message.conversation_id.clone());
        }
        bucket.push(message);
    }

    let mut conversations: Vec<Conversation> = bucket_order
        .into_iter()
        .map(|conversation_id| {
            let bucket = &buckets[&conversation_id];
            let last_message = bucket[0].clone();
            let unread_count = bucket
                .iter()
                .filter(|m| m.sender_id != viewer && !m.read)
                .count();
            let updated_at = last_message.created_at;
            Conversation {
                conversation_id,
                last_message,
                unread_count,
                updated_at,
            }
        })
        .collect();

    conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    conversations
}
