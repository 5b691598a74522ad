use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::User;
use crate::store::{Collection, Filter, RecordId, RecordQuery, RecordStore};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub cover_photo: Option<String>,
    pub location: Option<String>,
    pub online: Option<bool>,
    pub friends_count: Option<i64>,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn RecordStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn get_all(&self) -> Vec<User> {
        match self
            .try_fetch(RecordQuery::new().order_asc("name").page(50, 0))
            .await
        {
            Ok(users) => users,
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch users");
                Vec::new()
            }
        }
    }

    pub async fn get_by_id(&self, id: RecordId) -> Option<User> {
        match self.try_get_by_id(id).await {
            Ok(user) => user,
            Err(err) => {
                tracing::error!(user_id = id, error = %err, "failed to fetch user");
                None
            }
        }
    }

    /// The session owner's profile, looked up by the email the identity
    /// provider reports. Identity itself is out of scope here.
    pub async fn profile_by_email(&self, email: &str) -> Option<User> {
        if email.is_empty() {
            return None;
        }
        match self
            .try_fetch(
                RecordQuery::new()
                    .filter(Filter::eq("email", email))
                    .page(1, 0),
            )
            .await
        {
            Ok(users) => users.into_iter().next(),
            Err(err) => {
                tracing::error!(email, error = %err, "failed to fetch profile by email");
                None
            }
        }
    }

    pub async fn create(&self, new: NewUser) -> Option<User> {
        match self.try_create(new).await {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::error!(error = %err, "failed to create user");
                None
            }
        }
    }

    pub async fn update(&self, id: RecordId, update: UserUpdate) -> Option<User> {
        match self.try_update(id, update).await {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::error!(user_id = id, error = %err, "failed to update user");
                None
            }
        }
    }

    pub async fn delete(&self, id: RecordId) -> bool {
        match self.store.delete(Collection::Users, id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::error!(user_id = id, error = %err, "failed to delete user");
                false
            }
        }
    }

    async fn try_fetch(&self, query: RecordQuery) -> AppResult<Vec<User>> {
        let records = self.store.fetch(Collection::Users, query).await?;
        records.iter().map(|r| r.decode()).collect()
    }

    async fn try_get_by_id(&self, id: RecordId) -> AppResult<Option<User>> {
        let record = self.store.get_by_id(Collection::Users, id).await?;
        record.as_ref().map(|r| r.decode()).transpose()
    }

    async fn try_create(&self, new: NewUser) -> AppResult<User> {
        let record = self
            .store
            .create(
                Collection::Users,
                json!({
                    "name": new.name,
                    "username": new.username,
                    "email": new.email,
                    "bio": new.bio.unwrap_or_default(),
                    "profile_picture": new.profile_picture.unwrap_or_default(),
                    "cover_photo": "",
                    "location": new.location.unwrap_or_default(),
                    "online": true,
                    "friends_count": 0,
                }),
            )
            .await?;
        record.decode()
    }

    async fn try_update(&self, id: RecordId, update: UserUpdate) -> AppResult<User> {
        let mut patch = Map::new();
        if let Some(name) = update.name {
            patch.insert("name".to_string(), Value::String(name));
        }
        if let Some(username) = update.username {
            patch.insert("username".to_string(), Value::String(username));
        }
        if let Some(bio) = update.bio {
            patch.insert("bio".to_string(), Value::String(bio));
        }
        if let Some(profile_picture) = update.profile_picture {
            patch.insert("profile_picture".to_string(), Value::String(profile_picture));
        }
        if let Some(cover_photo) = update.cover_photo {
            patch.insert("cover_photo".to_string(), Value::String(cover_photo));
        }
        if let Some(location) = update.location {
            patch.insert("location".to_string(), Value::String(location));
        }
        if let Some(online) = update.online {
            patch.insert("online".to_string(), Value::Bool(online));
        }
        if let Some(friends_count) = update.friends_count {
            patch.insert("friends_count".to_string(), Value::from(friends_count));
        }

        let record = self
            .store
            .update(Collection::Users, id, Value::Object(patch))
            .await?;
        record.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    async fn service() -> UserService {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.init().await.unwrap();
        UserService::new(Arc::new(store))
    }

    fn new_user(name: &str, username: &str, email: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            bio: None,
            profile_picture: None,
            location: None,
        }
    }

    #[tokio::test]
    async fn new_users_start_online_with_no_friends() {
        let service = service().await;

        let user = service
            .create(new_user("Ana", "ana", "ana@example.com"))
            .await
            .unwrap();
        assert!(user.online);
        assert_eq!(user.friends_count, 0);
    }

    #[tokio::test]
    async fn profile_lookup_by_email() {
        let service = service().await;

        service
            .create(new_user("Ana", "ana", "ana@example.com"))
            .await
            .unwrap();

        let profile = service.profile_by_email("ana@example.com").await.unwrap();
        assert_eq!(profile.username, "ana");

        assert!(service.profile_by_email("nobody@example.com").await.is_none());
        assert!(service.profile_by_email("").await.is_none());
    }

    #[tokio::test]
    async fn listing_is_ordered_by_name() {
        let service = service().await;

        service.create(new_user("Zoe", "zoe", "z@example.com")).await.unwrap();
        service.create(new_user("Ana", "ana", "a@example.com")).await.unwrap();

        let users = service.get_all().await;
        assert_eq!(
            users.iter().map(|u| u.name.as_str()).collect::<Vec<_>>(),
            vec!["Ana", "Zoe"]
        );
    }

    #[tokio::test]
    async fn update_touches_only_given_fields() {
        let service = service().await;

        let user = service
            .create(new_user("Ana", "ana", "ana@example.com"))
            .await
            .unwrap();

        let updated = service
            .update(
                user.id,
                UserUpdate {
                    bio: Some("hello".to_string()),
                    online: Some(false),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.bio, "hello");
        assert!(!updated.online);
        assert_eq!(updated.username, "ana");
    }
}
