// HTTP surface over the service layer. Handlers translate the services'
// fail-soft results into status codes at this boundary: a None becomes
// 404, everything else is returned as-is.

use axum::{
    extract::{Path as AxumPath, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    app_state::AppState,
    error::AppError,
    models::{Conversation, ConversationKey, Message, Post, User},
    services::{NewComment, NewMessage, NewNotification, NewPost, PostThread},
    store::RecordId,
};

#[derive(Deserialize)]
pub struct ViewerQuery {
    pub viewer: RecordId,
}

#[derive(Deserialize)]
pub struct UserScopeQuery {
    pub user: RecordId,
}

#[derive(Deserialize)]
pub struct UserLookupQuery {
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    pub image_url: Option<String>,
    pub author_id: RecordId,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub author_id: RecordId,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub content: String,
    pub author_id: RecordId,
    pub post_id: RecordId,
}

#[derive(Deserialize)]
pub struct ReactionRequest {
    pub viewer: RecordId,
    pub emoji: String,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub sender_id: RecordId,
    /// Either an existing conversation id or a recipient to start a
    /// conversation with; the latter derives the canonical two-party key.
    pub conversation_id: Option<String>,
    pub recipient_id: Option<RecordId>,
}

#[derive(Deserialize)]
pub struct NotifyRequest {
    pub message: String,
    pub kind: String,
    pub actor_id: RecordId,
    pub user_id: RecordId,
    pub target_id: Option<RecordId>,
}

async fn feed_handler(State(state): State<AppState>) -> Json<Vec<Post>> {
    Json(state.posts.feed(state.config.feed.page_size).await)
}

async fn create_post_handler(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    state
        .posts
        .create(NewPost {
            content: req.content,
            image_url: req.image_url,
            author_id: req.author_id,
        })
        .await
        .map(Json)
        .ok_or_else(|| AppError::Unknown("post was not created".to_string()))
}

async fn get_post_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<RecordId>,
) -> Result<Json<Post>, AppError> {
    state
        .posts
        .get_by_id(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("post {} not found", id)))
}

async fn user_posts_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<RecordId>,
) -> Json<Vec<Post>> {
    Json(state.posts.get_by_user(id).await)
}

async fn thread_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<RecordId>,
    Query(query): Query<ViewerQuery>,
) -> Json<PostThread> {
    Json(state.threads.thread_for_post(id, query.viewer).await)
}

async fn create_comment_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<RecordId>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<Json<Value>, AppError> {
    let comment = state
        .comments
        .create(NewComment {
            content: req.content,
            author_id: req.author_id,
            post_id: id,
            parent_id: None,
        })
        .await
        .ok_or_else(|| AppError::Unknown("comment was not created".to_string()))?;
    Ok(Json(json!(comment)))
}

async fn reply_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<RecordId>,
    Json(req): Json<ReplyRequest>,
) -> Result<Json<Value>, AppError> {
    let reply = state
        .comments
        .reply_to_comment(
            id,
            NewComment {
                content: req.content,
                author_id: req.author_id,
                post_id: req.post_id,
                parent_id: None,
            },
        )
        .await
        .ok_or_else(|| AppError::NotFound(format!("parent comment {} not found", id)))?;
    Ok(Json(json!(reply)))
}

async fn toggle_comment_like_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<RecordId>,
    Json(req): Json<ViewerQuery>,
) -> Result<Json<Value>, AppError> {
    let like_state = state
        .likes
        .toggle(id, req.viewer)
        .await
        .ok_or_else(|| AppError::Unknown("like toggle did not apply".to_string()))?;
    Ok(Json(json!(like_state)))
}

async fn toggle_post_like_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<RecordId>,
    Json(req): Json<ViewerQuery>,
) -> Result<Json<Value>, AppError> {
    let like_state = state
        .posts
        .toggle_like(id, req.viewer)
        .await
        .ok_or_else(|| AppError::NotFound(format!("post {} not found", id)))?;
    Ok(Json(json!(like_state)))
}

async fn add_reaction_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<RecordId>,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<Post>, AppError> {
    state
        .posts
        .add_reaction(id, req.viewer, &req.emoji)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("post {} not found", id)))
}

async fn remove_reaction_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<RecordId>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<Post>, AppError> {
    state
        .posts
        .remove_reaction(id, query.viewer)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("post {} not found", id)))
}

async fn save_post_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<RecordId>,
    Json(req): Json<ViewerQuery>,
) -> Result<Json<Value>, AppError> {
    let saved = state
        .posts
        .save_post(id, req.viewer)
        .await
        .ok_or_else(|| AppError::Unknown("post was not saved".to_string()))?;
    Ok(Json(json!(saved)))
}

async fn unsave_post_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<RecordId>,
    Query(query): Query<ViewerQuery>,
) -> Json<Value> {
    let removed = state.posts.unsave_post(id, query.viewer).await;
    Json(json!({ "removed": removed }))
}

async fn conversations_handler(
    State(state): State<AppState>,
    Query(query): Query<ViewerQuery>,
) -> Json<Vec<Conversation>> {
    Json(state.messages.conversations_for(query.viewer).await)
}

async fn conversation_messages_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Json<Vec<Message>> {
    Json(state.messages.get_by_conversation(&id).await)
}

async fn mark_conversation_read_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<ViewerQuery>,
) -> Json<Value> {
    let marked = state.messages.mark_conversation_read(&id, req.viewer).await;
    Json(json!({ "marked": marked }))
}

async fn send_message_handler(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Message>, AppError> {
    let conversation_id = match (req.conversation_id, req.recipient_id) {
        (Some(id), _) => id,
        (None, Some(recipient)) => ConversationKey::between(req.sender_id, recipient)?
            .as_str()
            .to_string(),
        (None, None) => {
            return Err(AppError::Validation(
                "either conversation_id or recipient_id is required".to_string(),
            ))
        }
    };

    state
        .messages
        .send(NewMessage {
            content: req.content,
            conversation_id,
            sender_id: req.sender_id,
        })
        .await
        .map(Json)
        .ok_or_else(|| AppError::Unknown("message was not sent".to_string()))
}

async fn notifications_handler(
    State(state): State<AppState>,
    Query(query): Query<UserScopeQuery>,
) -> Json<Value> {
    let notifications = state.notifications.get_for_user(query.user).await;
    let unread = state.notifications.unread_count(query.user).await;
    Json(json!({ "notifications": notifications, "unread": unread }))
}

async fn notify_handler(
    State(state): State<AppState>,
    Json(req): Json<NotifyRequest>,
) -> Result<Json<Value>, AppError> {
    let notification = state
        .notifications
        .notify(NewNotification {
            message: req.message,
            kind: req.kind,
            actor_id: req.actor_id,
            user_id: req.user_id,
            target_id: req.target_id,
        })
        .await
        .ok_or_else(|| AppError::Unknown("notification was not created".to_string()))?;
    Ok(Json(json!(notification)))
}

async fn mark_all_notifications_read_handler(
    State(state): State<AppState>,
    Json(req): Json<UserScopeQuery>,
) -> Json<Value> {
    let marked = state.notifications.mark_all_read(req.user).await;
    Json(json!({ "marked": marked }))
}

async fn list_users_handler(
    State(state): State<AppState>,
    Query(query): Query<UserLookupQuery>,
) -> Result<Json<Value>, AppError> {
    if let Some(email) = query.email {
        let user = state
            .users
            .profile_by_email(&email)
            .await
            .ok_or_else(|| AppError::NotFound(format!("no profile for {}", email)))?;
        return Ok(Json(json!(user)));
    }
    Ok(Json(json!(state.users.get_all().await)))
}

async fn get_user_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<RecordId>,
) -> Result<Json<User>, AppError> {
    state
        .users
        .get_by_id(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", id)))
}

pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        // Feed and posts
        .route("/feed", get(feed_handler))
        .route("/posts", post(create_post_handler))
        .route("/posts/{id}", get(get_post_handler))
        .route("/posts/{id}/like", post(toggle_post_like_handler))
        .route(
            "/posts/{id}/reactions",
            post(add_reaction_handler).delete(remove_reaction_handler),
        )
        .route(
            "/posts/{id}/save",
            post(save_post_handler).delete(unsave_post_handler),
        )
        // Comment threads
        .route("/posts/{id}/thread", get(thread_handler))
        .route("/posts/{id}/comments", post(create_comment_handler))
        .route("/comments/{id}/replies", post(reply_handler))
        .route("/comments/{id}/like", post(toggle_comment_like_handler))
        // Messaging
        .route("/messages", post(send_message_handler))
        .route("/conversations", get(conversations_handler))
        .route("/conversations/{id}/messages", get(conversation_messages_handler))
        .route("/conversations/{id}/read", post(mark_conversation_read_handler))
        // Notifications
        .route(
            "/notifications",
            get(notifications_handler).post(notify_handler),
        )
        .route(
            "/notifications/read-all",
            post(mark_all_notifications_read_handler),
        )
        // Users
        .route("/users", get(list_users_handler))
        .route("/users/{id}", get(get_user_handler))
        .route("/users/{id}/posts", get(user_posts_handler))
        .with_state(state)
}
