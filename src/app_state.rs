use std::sync::Arc;

use crate::{
    config::Config,
    services::{
        CommentService, LikeService, MessageService, NotificationService, PostService,
        ThreadService, UserService,
    },
    store::{RecordStore, SqliteStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub users: UserService,
    pub posts: PostService,
    pub comments: CommentService,
    pub likes: LikeService,
    pub messages: MessageService,
    pub notifications: NotificationService,
    pub threads: ThreadService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Initialize the local record store stand-in
        let store = SqliteStore::connect(&config.database.url).await?;
        store.init().await?;
        let store: Arc<dyn RecordStore> = Arc::new(store);

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn RecordStore>) -> Self {
        let comments = CommentService::new(store.clone());
        let likes = LikeService::new(store.clone());
        let threads = ThreadService::new(comments.clone(), likes.clone());

        Self {
            users: UserService::new(store.clone()),
            posts: PostService::new(store.clone()),
            messages: MessageService::new(store.clone()),
            notifications: NotificationService::new(store.clone()),
            comments,
            likes,
            threads,
            config,
            store,
        }
    }
}
