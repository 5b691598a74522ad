// Record store - the only external interface the client core depends on.
// Every data operation is a CRUD call against a named collection; the
// concrete backend is swappable behind the RecordStore trait.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

pub use sqlite::SqliteStore;

/// Record ID type - the store assigns integer identities.
pub type RecordId = i64;

/// The named collections the backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Users,
    Posts,
    Comments,
    Likes,
    Messages,
    Notifications,
    SavedPosts,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "user_c",
            Collection::Posts => "post_c",
            Collection::Comments => "comment_c",
            Collection::Likes => "like_c",
            Collection::Messages => "message_c",
            Collection::Notifications => "notification_c",
            Collection::SavedPosts => "saved_post_c",
        }
    }
}

/// A raw record as returned by the store: store-assigned identity and
/// creation time, plus the caller-owned field map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

impl StoredRecord {
    /// Decode this record into a typed model. `id` and `created_at` are
    /// merged into the field map so models carry them as plain fields.
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        let mut object = self.fields.clone();
        object.insert("id".to_string(), Value::from(self.id));
        object.insert(
            "created_at".to_string(),
            Value::String(self.created_at.to_rfc3339()),
        );
        serde_json::from_value(Value::Object(object)).map_err(AppError::from)
    }

    pub fn field(&self, name: &str) -> Value {
        match name {
            "id" => Value::from(self.id),
            "created_at" => Value::String(self.created_at.to_rfc3339()),
            _ => self.fields.get(name).cloned().unwrap_or(Value::Null),
        }
    }
}

/// Equality filter: the record's field value must match one of `values`.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub values: Vec<Value>,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            values: vec![value.into()],
        }
    }

    pub fn any_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            values,
        }
    }

    pub fn matches(&self, record: &StoredRecord) -> bool {
        let value = record.field(&self.field);
        self.values.iter().any(|candidate| *candidate == value)
    }
}

#[derive(Debug, Clone)]
pub struct Order {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

/// Query parameters for `fetch`: equality filters, single-field ordering,
/// limit/offset paging.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub page: Option<Page>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_asc(mut self, field: impl Into<String>) -> Self {
        self.order = Some(Order {
            field: field.into(),
            descending: false,
        });
        self
    }

    pub fn order_desc(mut self, field: impl Into<String>) -> Self {
        self.order = Some(Order {
            field: field.into(),
            descending: true,
        });
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.page = Some(Page { limit, offset });
        self
    }

    pub fn matches(&self, record: &StoredRecord) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }
}

/// Per-record result of a batch write.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Created(StoredRecord),
    Failed(String),
}

/// Outcome of a batch call. The store accepts the call as a whole but
/// individual records may still fail.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchOutcome {
    pub fn successes(&self) -> Vec<&StoredRecord> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                RecordOutcome::Created(record) => Some(record),
                RecordOutcome::Failed(_) => None,
            })
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Failed(_)))
            .count()
    }

    pub fn is_partial_failure(&self) -> bool {
        let failed = self.failed_count();
        failed > 0 && failed < self.outcomes.len()
    }

    /// Collapse into a result, treating any per-record failure as a
    /// `PartialBatch` error.
    pub fn into_result(self) -> AppResult<Vec<StoredRecord>> {
        let total = self.outcomes.len();
        let failed = self.failed_count();
        if failed > 0 {
            return Err(AppError::PartialBatch(format!(
                "{} of {} records failed",
                failed, total
            )));
        }
        Ok(self
            .outcomes
            .into_iter()
            .filter_map(|o| match o {
                RecordOutcome::Created(record) => Some(record),
                RecordOutcome::Failed(_) => None,
            })
            .collect())
    }
}

/// The record-store capability contract. The store is reliable-eventually
/// but fallible-per-call; no transactions, no schema management, no query
/// planning is owned on this side of the seam.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch(&self, collection: Collection, query: RecordQuery)
        -> AppResult<Vec<StoredRecord>>;

    async fn get_by_id(&self, collection: Collection, id: RecordId)
        -> AppResult<Option<StoredRecord>>;

    async fn create(&self, collection: Collection, fields: Value) -> AppResult<StoredRecord>;

    async fn create_many(
        &self,
        collection: Collection,
        records: Vec<Value>,
    ) -> AppResult<BatchOutcome>;

    /// Partial update: keys present in `patch` overwrite the stored fields.
    async fn update(
        &self,
        collection: Collection,
        id: RecordId,
        patch: Value,
    ) -> AppResult<StoredRecord>;

    async fn delete(&self, collection: Collection, id: RecordId) -> AppResult<bool>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A store whose every call fails, for pinning down the fail-soft
    /// service boundary.
    pub struct UnavailableStore;

    fn unavailable() -> AppError {
        AppError::StoreUnavailable("store client not available".to_string())
    }

    #[async_trait]
    impl RecordStore for UnavailableStore {
        async fn fetch(
            &self,
            _collection: Collection,
            _query: RecordQuery,
        ) -> AppResult<Vec<StoredRecord>> {
            Err(unavailable())
        }

        async fn get_by_id(
            &self,
            _collection: Collection,
            _id: RecordId,
        ) -> AppResult<Option<StoredRecord>> {
            Err(unavailable())
        }

        async fn create(&self, _collection: Collection, _fields: Value) -> AppResult<StoredRecord> {
            Err(unavailable())
        }

        async fn create_many(
            &self,
            _collection: Collection,
            _records: Vec<Value>,
        ) -> AppResult<BatchOutcome> {
            Err(unavailable())
        }

        async fn update(
            &self,
            _collection: Collection,
            _id: RecordId,
            _patch: Value,
        ) -> AppResult<StoredRecord> {
            Err(unavailable())
        }

        async fn delete(&self, _collection: Collection, _id: RecordId) -> AppResult<bool> {
            Err(unavailable())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: RecordId, fields: Value) -> StoredRecord {
        StoredRecord {
            id,
            created_at: Utc::now(),
            fields: fields.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn filter_matches_field_and_id() {
        let rec = record(7, json!({"post_id": 3, "read": false}));

        assert!(Filter::eq("post_id", 3).matches(&rec));
        assert!(!Filter::eq("post_id", 4).matches(&rec));
        assert!(Filter::eq("read", false).matches(&rec));
        assert!(Filter::eq("id", 7).matches(&rec));
        assert!(Filter::any_of("post_id", vec![json!(1), json!(3)]).matches(&rec));
    }

    #[test]
    fn missing_field_only_matches_null() {
        let rec = record(1, json!({"content": "hi"}));
        assert!(!Filter::eq("parent_id", 5).matches(&rec));
        assert!(Filter::eq("parent_id", Value::Null).matches(&rec));
    }

    #[test]
    fn batch_outcome_partial_failure() {
        let outcome = BatchOutcome {
            outcomes: vec![
                RecordOutcome::Created(record(1, json!({}))),
                RecordOutcome::Failed("boom".to_string()),
            ],
        };
        assert!(outcome.is_partial_failure());
        assert_eq!(outcome.successes().len(), 1);
        assert!(matches!(
            outcome.into_result(),
            Err(AppError::PartialBatch(_))
        ));
    }

    #[test]
    fn batch_outcome_all_ok() {
        let outcome = BatchOutcome {
            outcomes: vec![RecordOutcome::Created(record(1, json!({})))],
        };
        assert!(!outcome.is_partial_failure());
        assert_eq!(outcome.into_result().unwrap().len(), 1);
    }
}
