use serde::Serialize;
use std::collections::HashMap;

use crate::core::threads::{build_thread, like_state};
use crate::models::{CommentThread, LikeState};
use crate::services::{CommentService, LikeService};
use crate::store::RecordId;

/// The fully assembled comment section of one post, for one viewer.
#[derive(Debug, Clone, Serialize)]
pub struct PostThread {
    pub post_id: RecordId,
    pub threads: Vec<CommentThread>,
    pub like_states: HashMap<RecordId, LikeState>,
}

/// Facade that stitches comment records and like snapshots into the
/// display structure. Both underlying services are fail-soft, so the
/// worst case is an empty thread, never an error.
#[derive(Clone)]
pub struct ThreadService {
    comments: CommentService,
    likes: LikeService,
}

impl ThreadService {
    pub fn new(comments: CommentService, likes: LikeService) -> Self {
        Self { comments, likes }
    }

    pub async fn thread_for_post(&self, post_id: RecordId, viewer: RecordId) -> PostThread {
        let comments = self.comments.get_by_post(post_id).await;
        let ids: Vec<RecordId> = comments.iter().map(|c| c.id).collect();
        let snapshot = self.likes.snapshot_for(&ids).await;

        let threads = build_thread(&comments);
        let like_states = comments
            .iter()
            .map(|c| (c.id, like_state(&snapshot, c.id, viewer)))
            .collect();

        PostThread {
            post_id,
            threads,
            like_states,
        }
    }
}
