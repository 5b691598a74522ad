// Demo data seeding, for running the server against a fresh database.
// Enabled with SEED_DEMO_DATA=1; a store that already holds users is
// left untouched.

use rand::Rng;
use serde_json::json;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::ConversationKey;
use crate::store::{Collection, RecordId, RecordQuery, RecordStore};

const DEMO_USERS: [(&str, &str, &str); 4] = [
    ("Ana Moreau", "ana", "ana@example.com"),
    ("Ben Okafor", "ben", "ben@example.com"),
    ("Carla Reyes", "carla", "carla@example.com"),
    ("Dev Sharma", "dev", "dev@example.com"),
];

const DEMO_POSTS: [&str; 3] = [
    "Shipped the new profile page today. Feedback welcome!",
    "Weekend hike photos are up.",
    "Anyone else refactoring their message inbox this week?",
];

fn pick_likers(user_ids: &[RecordId]) -> Vec<RecordId> {
    let mut rng = rand::rng();
    user_ids
        .iter()
        .copied()
        .filter(|_| rng.random_bool(0.5))
        .collect()
}

pub async fn seed_demo(store: &Arc<dyn RecordStore>) -> AppResult<()> {
    let existing = store
        .fetch(Collection::Users, RecordQuery::new().page(1, 0))
        .await?;
    if !existing.is_empty() {
        tracing::info!("store already seeded, skipping demo data");
        return Ok(());
    }

    let users = store
        .create_many(
            Collection::Users,
            DEMO_USERS
                .iter()
                .map(|(name, username, email)| {
                    json!({
                        "name": name,
                        "username": username,
                        "email": email,
                        "bio": "",
                        "profile_picture": "",
                        "cover_photo": "",
                        "location": "",
                        "online": true,
                        "friends_count": 0,
                    })
                })
                .collect(),
        )
        .await?
        .into_result()?;
    let user_ids: Vec<RecordId> = users.iter().map(|u| u.id).collect();

    let posts = store
        .create_many(
            Collection::Posts,
            DEMO_POSTS
                .iter()
                .enumerate()
                .map(|(i, content)| {
                    json!({
                        "content": content,
                        "image_url": "",
                        "author_id": user_ids[i % user_ids.len()],
                        "comment_count": 0,
                        "likes": [],
                        "reactions": {},
                    })
                })
                .collect(),
        )
        .await?
        .into_result()?;

    // One commented post with a reply chain, so the thread view has
    // something to flatten.
    let post_id = posts[0].id;
    let top = store
        .create(
            Collection::Comments,
            json!({
                "content": "Looks great!",
                "author_id": user_ids[1],
                "post_id": post_id,
                "parent_id": null,
                "likes": [],
            }),
        )
        .await?;
    let reply = store
        .create(
            Collection::Comments,
            json!({
                "content": "Agreed, the cover photo pops.",
                "author_id": user_ids[2],
                "post_id": post_id,
                "parent_id": top.id,
                "likes": [],
            }),
        )
        .await?;
    store
        .create(
            Collection::Comments,
            json!({
                "content": "Thanks, both of you!",
                "author_id": user_ids[0],
                "post_id": post_id,
                "parent_id": reply.id,
                "likes": [],
            }),
        )
        .await?;
    store
        .update(Collection::Posts, post_id, json!({ "comment_count": 3 }))
        .await?;

    for liker in pick_likers(&user_ids) {
        store
            .create(
                Collection::Likes,
                json!({ "comment_id": top.id, "user_id": liker }),
            )
            .await?;
    }

    let key = ConversationKey::between(user_ids[0], user_ids[1])?;
    for (sender, content) in [
        (user_ids[0], "Hey, did you see the new feed?"),
        (user_ids[1], "Just now - looks fast."),
        (user_ids[0], "Wait until you try the thread view."),
    ] {
        store
            .create(
                Collection::Messages,
                json!({
                    "content": content,
                    "conversation_id": key.as_str(),
                    "sender_id": sender,
                    "read": false,
                }),
            )
            .await?;
    }

    store
        .create(
            Collection::Notifications,
            json!({
                "message": "commented on your post",
                "kind": "comment",
                "read": false,
                "actor_id": user_ids[1],
                "user_id": user_ids[0],
                "target_id": post_id,
            }),
        )
        .await?;

    tracing::info!(
        users = user_ids.len(),
        posts = posts.len(),
        "seeded demo data"
    );
    Ok(())
}
