// Thread assembly: turn a flat, unordered comment batch for one post
// into the two-level display structure, and derive per-comment like
// state for a viewer.

use std::collections::{HashMap, HashSet};

use crate::models::{Comment, CommentThread, LikeState};
use crate::store::RecordId;

/// Like sets per comment, snapshotted from the like collection.
pub type LikeSnapshot = HashMap<RecordId, HashSet<RecordId>>;

/// Build the display structure for one post's comments.
///
/// Render depth is 1: every comment with a parent reference is attached
/// to the top-level ancestor reached by walking the `parent_id` chain,
/// as a flat reply list. A reply chain deeper than two levels therefore
/// stores fine but renders flattened under its top-level root.
///
/// Comments whose parent chain leaves the batch (orphans) or loops back
/// on itself are dropped; they never fail the assembly. Input order is
/// preserved for both top-level comments and reply lists.
pub fn build_thread(comments: &[Comment]) -> Vec<CommentThread> {
    let by_id: HashMap<RecordId, &Comment> = comments.iter().map(|c| (c.id, c)).collect();

    let mut threads: Vec<CommentThread> = Vec::new();
    let mut slot_by_root: HashMap<RecordId, usize> = HashMap::new();

    for comment in comments.iter().filter(|c| c.is_top_level()) {
        slot_by_root.insert(comment.id, threads.len());
        threads.push(CommentThread {
            comment: comment.clone(),
            replies: Vec::new(),
        });
    }

    for comment in comments.iter().filter(|c| !c.is_top_level()) {
        if let Some(root) = top_level_ancestor(comment, &by_id) {
            if let Some(&slot) = slot_by_root.get(&root) {
                threads[slot].replies.push(comment.clone());
            }
        }
    }

    threads
}

/// Walk the parent chain to the top-level root. `None` for orphans and
/// cycles.
fn top_level_ancestor(comment: &Comment, by_id: &HashMap<RecordId, &Comment>) -> Option<RecordId> {
    let mut seen: HashSet<RecordId> = HashSet::new();
    seen.insert(comment.id);

    let mut parent_id = comment.parent_id?;
    loop {
        if !seen.insert(parent_id) {
            return None;
        }
        let parent = by_id.get(&parent_id)?;
        match parent.parent_id {
            None => return Some(parent.id),
            Some(next) => parent_id = next,
        }
    }
}

/// Like state of one comment for one viewer, from an in-memory snapshot.
/// No caching: every toggle re-derives from a fresh like fetch.
pub fn like_state(snapshot: &LikeSnapshot, comment_id: RecordId, viewer: RecordId) -> LikeState {
    match snapshot.get(&comment_id) {
        Some(likers) => LikeState {
            liked: likers.contains(&viewer),
            count: likers.len(),
        },
        None => LikeState {
            liked: false,
            count: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn comment(id: RecordId, parent_id: Option<RecordId>) -> Comment {
        Comment {
            id,
            content: format!("comment {}", id),
            author_id: 1,
            post_id: 10,
            parent_id,
            likes: Vec::new(),
            created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        }
    }

    #[test]
    fn partitions_top_level_and_replies() {
        let comments = vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, None),
            comment(4, Some(3)),
            comment(5, Some(1)),
        ];

        let threads = build_thread(&comments);

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, 1);
        assert_eq!(
            threads[0].replies.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![2, 5]
        );
        assert_eq!(threads[1].comment.id, 3);
        assert_eq!(threads[1].replies[0].id, 4);
    }

    #[test]
    fn reply_to_reply_flattens_to_top_level_ancestor() {
        let comments = vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, Some(2)), // reply to a reply
            comment(4, Some(3)), // three levels down
        ];

        let threads = build_thread(&comments);

        assert_eq!(threads.len(), 1);
        assert_eq!(
            threads[0].replies.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
    }

    #[test]
    fn orphans_are_dropped_without_panicking() {
        let comments = vec![
            comment(1, None),
            comment(2, Some(99)), // parent not in batch
        ];

        let threads = build_thread(&comments);

        assert_eq!(threads.len(), 1);
        assert!(threads[0].replies.is_empty());
    }

    #[test]
    fn every_comment_lands_in_exactly_one_bucket() {
        let comments = vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, Some(2)),
            comment(4, None),
            comment(5, Some(77)), // orphan
        ];

        let threads = build_thread(&comments);

        let attached: usize = threads.iter().map(|t| 1 + t.replies.len()).sum();
        // 4 attached, 1 orphan dropped
        assert_eq!(attached, 4);

        let mut ids: Vec<RecordId> = threads
            .iter()
            .flat_map(|t| std::iter::once(t.comment.id).chain(t.replies.iter().map(|r| r.id)))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn parent_cycles_do_not_hang_or_panic() {
        // Corrupt data: 2 and 3 reference each other.
        let comments = vec![comment(1, None), comment(2, Some(3)), comment(3, Some(2))];

        let threads = build_thread(&comments);

        assert_eq!(threads.len(), 1);
        assert!(threads[0].replies.is_empty());
    }

    #[test]
    fn preserves_input_order() {
        let comments = vec![
            comment(5, None),
            comment(2, None),
            comment(9, Some(2)),
            comment(1, Some(2)),
        ];

        let threads = build_thread(&comments);

        assert_eq!(
            threads.iter().map(|t| t.comment.id).collect::<Vec<_>>(),
            vec![5, 2]
        );
        assert_eq!(
            threads[1].replies.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![9, 1]
        );
    }

    #[test]
    fn like_state_from_snapshot() {
        let mut snapshot = LikeSnapshot::new();
        snapshot.insert(1, [3, 7].into_iter().collect());

        assert_eq!(
            like_state(&snapshot, 1, 7),
            LikeState {
                liked: true,
                count: 2
            }
        );
        assert_eq!(
            like_state(&snapshot, 1, 9),
            LikeState {
                liked: false,
                count: 2
            }
        );
        // Unknown comment: empty state, not an error
        assert_eq!(
            like_state(&snapshot, 42, 7),
            LikeState {
                liked: false,
                count: 0
            }
        );
    }
}
