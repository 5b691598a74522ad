// Domain records as stored in the backend collections, plus the derived
// view types (Conversation, LikeState, CommentThread) that are computed
// fresh on every call and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AppError, AppResult};
use crate::store::RecordId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_picture: String,
    #[serde(default)]
    pub cover_photo: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub friends_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A post carries its like list inline (user ids in string form, as the
/// backend stores them) and a reaction map keyed by emoji. Counters are
/// best-effort mirrors of the related records, not transactional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: RecordId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: String,
    pub author_id: RecordId,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub reactions: BTreeMap<String, Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: RecordId,
    #[serde(default)]
    pub content: String,
    pub author_id: RecordId,
    pub post_id: RecordId,
    /// Absent for top-level comments. If present it must reference a
    /// comment on the same post; that is an application-level invariant,
    /// the store does not enforce it.
    #[serde(default)]
    pub parent_id: Option<RecordId>,
    /// Legacy inline like list. Comment like state is derived from the
    /// like collection; this field is kept for record compatibility.
    #[serde(default)]
    pub likes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// One like row per (comment, user) pair - intended invariant, enforced
/// by check-then-create in the service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: RecordId,
    pub comment_id: RecordId,
    pub user_id: RecordId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: RecordId,
    #[serde(default)]
    pub content: String,
    pub conversation_id: String,
    pub sender_id: RecordId,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: RecordId,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub read: bool,
    pub actor_id: RecordId,
    pub user_id: RecordId,
    #[serde(default)]
    pub target_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPost {
    pub id: RecordId,
    pub post_id: RecordId,
    pub user_id: RecordId,
    pub created_at: DateTime<Utc>,
}

/// Derived per-viewer conversation summary. Computed fresh on every
/// aggregation call; never stored.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub last_message: Message,
    pub unread_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Like state of one comment for one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub count: usize,
}

/// A top-level comment with its flat, input-ordered reply list.
/// Render depth is 1: replies-to-replies are flattened into the
/// top-level ancestor's list.
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

/// Two-party conversation key. Writers construct the canonical
/// `"<a>-<b>"` form (smaller id first) through `between`, which validates
/// the pair; readers stay lenient and treat the id as an opaque composite
/// key, so malformed legacy ids still aggregate by token membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn between(a: RecordId, b: RecordId) -> AppResult<Self> {
        if a <= 0 || b <= 0 {
            return Err(AppError::Validation(format!(
                "conversation participants must be positive ids, got {} and {}",
                a, b
            )));
        }
        if a == b {
            return Err(AppError::Validation(
                "a conversation needs two distinct participants".to_string(),
            ));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self(format!("{}-{}", low, high)))
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn participants(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.split('-')
    }

    /// String-membership test: the viewer's decimal form must be one of
    /// the `-`-separated tokens. Not a numeric comparison.
    pub fn involves(&self, viewer: RecordId) -> bool {
        let token = viewer.to_string();
        self.participants().any(|p| p == token)
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_key_is_canonical() {
        let key = ConversationKey::between(7, 3).unwrap();
        assert_eq!(key.as_str(), "3-7");
        assert_eq!(key, ConversationKey::between(3, 7).unwrap());
    }

    #[test]
    fn conversation_key_rejects_bad_pairs() {
        assert!(ConversationKey::between(3, 3).is_err());
        assert!(ConversationKey::between(0, 7).is_err());
        assert!(ConversationKey::between(-1, 7).is_err());
    }

    #[test]
    fn involvement_is_token_membership() {
        let key = ConversationKey::from_raw("3-7");
        assert!(key.involves(3));
        assert!(key.involves(7));
        assert!(!key.involves(9));
        // "37" is not a token even though the digits appear in the key
        assert!(!key.involves(37));

        // Malformed keys stay usable on the read path
        let odd = ConversationKey::from_raw("3-7-9");
        assert!(odd.involves(9));
    }
}
