// SqliteStore - local stand-in for the vendor record backend.
// One generic `records` table holds every collection as a JSON document;
// filters, ordering and paging are applied over the decoded records, the
// way the real backend applies them server-side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::store::{BatchOutcome, Collection, RecordId, RecordOutcome, RecordQuery, RecordStore, StoredRecord};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?
            .create_if_missing(true);

        // A single connection keeps `sqlite::memory:` databases coherent
        // across calls and serializes writes, matching the sequential
        // call model of the client core.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(Self { pool })
    }

    pub async fn init(&self) -> AppResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY,
                collection TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn decode_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<StoredRecord> {
        let id: RecordId = row.get("id");
        let data: String = row.get("data");
        let created_at: String = row.get("created_at");

        let fields: Map<String, Value> = serde_json::from_str(&data)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| AppError::Serialization(e.to_string()))?
            .with_timezone(&Utc);

        Ok(StoredRecord {
            id,
            created_at,
            fields,
        })
    }

    async fn load_collection(&self, collection: Collection) -> AppResult<Vec<StoredRecord>> {
        let rows = sqlx::query("SELECT id, data, created_at FROM records WHERE collection = ? ORDER BY id")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::decode_row).collect()
    }

    fn require_object(fields: Value) -> AppResult<Map<String, Value>> {
        match fields {
            Value::Object(map) => Ok(map),
            other => Err(AppError::Validation(format!(
                "record fields must be a JSON object, got {}",
                other
            ))),
        }
    }
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn fetch(
        &self,
        collection: Collection,
        query: RecordQuery,
    ) -> AppResult<Vec<StoredRecord>> {
        let mut records = self.load_collection(collection).await?;

        records.retain(|record| query.matches(record));

        if let Some(order) = &query.order {
            records.sort_by(|a, b| {
                let ordering = match order.field.as_str() {
                    "id" => a.id.cmp(&b.id),
                    "created_at" => a.created_at.cmp(&b.created_at),
                    field => cmp_values(
                        a.fields.get(field).unwrap_or(&Value::Null),
                        b.fields.get(field).unwrap_or(&Value::Null),
                    ),
                };
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if let Some(page) = query.page {
            records = records
                .into_iter()
                .skip(page.offset)
                .take(page.limit)
                .collect();
        }

        Ok(records)
    }

    async fn get_by_id(
        &self,
        collection: Collection,
        id: RecordId,
    ) -> AppResult<Option<StoredRecord>> {
        let row = sqlx::query("SELECT id, data, created_at FROM records WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::decode_row).transpose()
    }

    async fn create(&self, collection: Collection, fields: Value) -> AppResult<StoredRecord> {
        let fields = Self::require_object(fields)?;
        let created_at = Utc::now();
        let data = serde_json::to_string(&fields)?;

        let result = sqlx::query("INSERT INTO records (collection, data, created_at) VALUES (?, ?, ?)")
            .bind(collection.as_str())
            .bind(&data)
            .bind(created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(StoredRecord {
            id: result.last_insert_rowid(),
            created_at,
            fields,
        })
    }

    async fn create_many(
        &self,
        collection: Collection,
        records: Vec<Value>,
    ) -> AppResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for fields in records {
            match self.create(collection, fields).await {
                Ok(record) => outcome.outcomes.push(RecordOutcome::Created(record)),
                Err(err) => {
                    tracing::warn!(collection = collection.as_str(), error = %err, "record rejected in batch create");
                    outcome.outcomes.push(RecordOutcome::Failed(err.to_string()));
                }
            }
        }
        Ok(outcome)
    }

    async fn update(
        &self,
        collection: Collection,
        id: RecordId,
        patch: Value,
    ) -> AppResult<StoredRecord> {
        let patch = Self::require_object(patch)?;

        let mut record = self
            .get_by_id(collection, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!(
                "record {} not found in {}",
                id,
                collection.as_str()
            )))?;

        for (key, value) in patch {
            record.fields.insert(key, value);
        }

        let data = serde_json::to_string(&record.fields)?;
        let result = sqlx::query("UPDATE records SET data = ? WHERE collection = ? AND id = ?")
            .bind(&data)
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "record {} not found in {}",
                id,
                collection.as_str()
            )));
        }

        Ok(record)
    }

    async fn delete(&self, collection: Collection, id: RecordId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Filter;
    use serde_json::json;

    async fn memory_store() -> SqliteStore {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn create_and_get_by_id() {
        let store = memory_store().await;

        let created = store
            .create(Collection::Posts, json!({"content": "hello", "author_id": 1}))
            .await
            .unwrap();

        let fetched = store
            .get_by_id(Collection::Posts, created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.fields["content"], json!("hello"));

        // Same id under another collection does not resolve
        assert!(store
            .get_by_id(Collection::Comments, created.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn fetch_with_filter_order_and_page() {
        let store = memory_store().await;

        for i in 0..5 {
            let post_id = if i < 3 { 1 } else { 2 };
            store
                .create(
                    Collection::Comments,
                    json!({"post_id": post_id, "content": format!("c{}", i)}),
                )
                .await
                .unwrap();
        }

        let records = store
            .fetch(
                Collection::Comments,
                RecordQuery::new()
                    .filter(Filter::eq("post_id", 1))
                    .order_desc("id")
                    .page(2, 0),
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields["content"], json!("c2"));
        assert_eq!(records[1].fields["content"], json!("c1"));
    }

    #[tokio::test]
    async fn update_merges_patch() {
        let store = memory_store().await;

        let created = store
            .create(Collection::Messages, json!({"content": "hi", "read": false}))
            .await
            .unwrap();

        let updated = store
            .update(Collection::Messages, created.id, json!({"read": true}))
            .await
            .unwrap();

        assert_eq!(updated.fields["read"], json!(true));
        assert_eq!(updated.fields["content"], json!("hi"));

        let missing = store
            .update(Collection::Messages, 9999, json!({"read": true}))
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_reports_whether_row_existed() {
        let store = memory_store().await;

        let created = store
            .create(Collection::Likes, json!({"comment_id": 1, "user_id": 2}))
            .await
            .unwrap();

        assert!(store.delete(Collection::Likes, created.id).await.unwrap());
        assert!(!store.delete(Collection::Likes, created.id).await.unwrap());
    }

    #[tokio::test]
    async fn create_many_reports_per_record_outcomes() {
        let store = memory_store().await;

        let outcome = store
            .create_many(
                Collection::Users,
                vec![json!({"username": "ana"}), json!("not an object")],
            )
            .await
            .unwrap();

        assert_eq!(outcome.outcomes.len(), 2);
        assert_eq!(outcome.failed_count(), 1);
        assert!(outcome.is_partial_failure());
    }

    #[tokio::test]
    async fn reopens_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}/records.db", dir.path().display());

        {
            let store = SqliteStore::connect(&url).await.unwrap();
            store.init().await.unwrap();
            store
                .create(Collection::Users, json!({"username": "ana"}))
                .await
                .unwrap();
        }

        let store = SqliteStore::connect(&url).await.unwrap();
        store.init().await.unwrap();
        let users = store
            .fetch(Collection::Users, RecordQuery::new())
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].fields["username"], json!("ana"));
    }
}
