// tests/mutation_tests.rs

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde_json::json;

use common::{MemoryStore, post_row};
use feedsync::cache::FeedCache;
use feedsync::error::FeedError;
use feedsync::models::comment::NewComment;
use feedsync::models::post::{Author, NewPost, PostKind, Visibility};
use feedsync::models::reaction::{EntityKind, ReactionType};
use feedsync::mutation::MutationCoordinator;

fn viewer() -> Author {
    Author {
        id: "u1".to_string(),
        display_name: "Ada".to_string(),
        avatar_url: None,
    }
}

/// Helper: a feed with one post carrying the given raw reaction rows,
/// refreshed into a cache with a coordinator for viewer `u1`.
async fn setup(
    reactions: serde_json::Value,
) -> (Arc<MemoryStore>, Arc<FeedCache>, MutationCoordinator) {
    let store = Arc::new(MemoryStore::new());
    let mut row = post_row("p1", false, 10);
    row["reactions"] = reactions;
    store.set_feed(vec![row]);

    let cache = FeedCache::new(store.clone(), Some("u1".to_string()));
    cache.refresh().await.expect("refresh succeeds");

    let coordinator = MutationCoordinator::new(cache.clone(), store.clone(), viewer());
    (store, cache, coordinator)
}

#[tokio::test]
async fn toggle_twice_returns_to_baseline() {
    // Arrange: one existing like from another user.
    let (store, cache, coordinator) =
        setup(json!([{"user_id": "u2", "reaction_type": "like"}])).await;
    let baseline = cache.snapshot().posts[0].reactions.clone();

    // Act: toggle on, then off.
    coordinator
        .toggle_reaction("p1", EntityKind::Post, ReactionType::Like)
        .await
        .expect("first toggle");
    let after_first = cache.snapshot().posts[0].reactions.clone();
    coordinator
        .toggle_reaction("p1", EntityKind::Post, ReactionType::Like)
        .await
        .expect("second toggle");
    let after_second = cache.snapshot().posts[0].reactions.clone();

    // Assert
    assert_eq!(after_first.counts[&ReactionType::Like], 2);
    assert_eq!(after_first.viewer_reaction, Some(ReactionType::Like));
    assert_eq!(after_second, baseline);

    // One upsert then one delete reached the store.
    let log = store.write_log();
    assert_eq!(log.len(), 2);
    assert!(log[0].starts_with("upsert post p1 u1 like"));
    assert!(log[1].starts_with("delete post p1 u1"));
}

#[tokio::test]
async fn toggle_switches_reaction_type_in_one_update() {
    // Arrange: the viewer already reacted with like.
    let (_store, cache, coordinator) =
        setup(json!([{"user_id": "u1", "reaction_type": "like"}])).await;

    // Act
    coordinator
        .toggle_reaction("p1", EntityKind::Post, ReactionType::Love)
        .await
        .expect("switch succeeds");

    // Assert: like decremented away, love incremented, in a single applied
    // summary.
    let summary = cache.snapshot().posts[0].reactions.clone();
    assert!(!summary.counts.contains_key(&ReactionType::Like));
    assert_eq!(summary.counts[&ReactionType::Love], 1);
    assert_eq!(summary.viewer_reaction, Some(ReactionType::Love));
}

#[tokio::test]
async fn failed_toggle_rolls_back_exactly() {
    // Arrange
    let (store, cache, coordinator) =
        setup(json!([{"user_id": "u2", "reaction_type": "love"}])).await;
    let baseline = cache.snapshot().posts[0].reactions.clone();
    store.fail_writes.store(true, Ordering::SeqCst);

    // Act
    let result = coordinator
        .toggle_reaction("p1", EntityKind::Post, ReactionType::Like)
        .await;

    // Assert: the final observed local state equals the pre-toggle state.
    assert!(matches!(result, Err(FeedError::Write(_))));
    assert_eq!(cache.snapshot().posts[0].reactions, baseline);
}

#[tokio::test]
async fn toggle_unknown_entity_is_not_found() {
    let (_store, _cache, coordinator) = setup(json!([])).await;

    let result = coordinator
        .toggle_reaction("missing", EntityKind::Post, ReactionType::Like)
        .await;

    assert!(matches!(result, Err(FeedError::NotFound(_))));
}

#[tokio::test]
async fn comment_reactions_are_independent_per_comment() {
    // Arrange: a loaded thread with two comments.
    let (store, cache, coordinator) = setup(json!([])).await;
    let store_rows = vec![
        json!({
            "id": "c1",
            "post_id": "p1",
            "content": "same words",
            "created_at": "2026-01-01T00:00:00Z",
            "author": {"id": "u2", "display_name": "B"},
        }),
        json!({
            "id": "c2",
            "post_id": "p1",
            "content": "same words",
            "created_at": "2026-01-02T00:00:00Z",
            "author": {"id": "u3", "display_name": "C"},
        }),
    ];
    store.set_comments("p1", store_rows);
    cache.load_thread("p1").await.expect("thread loads");

    // Act: react to c1 only.
    coordinator
        .toggle_reaction("c1", EntityKind::Comment, ReactionType::Insightful)
        .await
        .expect("comment toggle");

    // Assert
    let thread = cache.thread("p1").expect("thread cached");
    assert_eq!(
        thread[0].reactions.viewer_reaction,
        Some(ReactionType::Insightful)
    );
    assert!(thread[1].reactions.counts.is_empty());
}

#[tokio::test]
async fn added_comment_is_confirmed_under_server_id() {
    // Arrange
    let (store, cache, coordinator) = setup(json!([])).await;
    cache.load_thread("p1").await.expect("thread loads");
    store.set_insert_comment_response(json!({
        "id": "42",
        "post_id": "p1",
        "content": "hello",
        "created_at": "2026-01-05T12:00:00Z",
        "author": {"id": "u1", "display_name": "Ada"},
    }));

    // Act
    let confirmed = coordinator
        .add_comment(
            "p1",
            NewComment {
                content: "hello".to_string(),
                parent_id: None,
            },
        )
        .await
        .expect("comment succeeds");

    // Assert: exactly one comment, under the authoritative id, no tmp- left.
    assert_eq!(confirmed.id, "42");
    let thread = cache.thread("p1").expect("thread cached");
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].id, "42");
    assert!(thread.iter().all(|c| !c.is_pending()));

    // The post's comment count was bumped optimistically.
    assert_eq!(cache.snapshot().posts[0].comments_count, 1);
}

#[tokio::test]
async fn failed_comment_removes_pending_entry() {
    // Arrange
    let (store, cache, coordinator) = setup(json!([])).await;
    cache.load_thread("p1").await.expect("thread loads");
    store.fail_writes.store(true, Ordering::SeqCst);

    // Act
    let result = coordinator
        .add_comment(
            "p1",
            NewComment {
                content: "doomed".to_string(),
                parent_id: None,
            },
        )
        .await;

    // Assert: the temporary entry is gone and the count restored.
    assert!(matches!(result, Err(FeedError::Write(_))));
    assert!(cache.thread("p1").expect("thread cached").is_empty());
    assert_eq!(cache.snapshot().posts[0].comments_count, 0);
}

#[tokio::test]
async fn empty_comment_rejected_before_any_local_change() {
    let (store, cache, coordinator) = setup(json!([])).await;
    cache.load_thread("p1").await.expect("thread loads");

    let result = coordinator
        .add_comment(
            "p1",
            NewComment {
                content: String::new(),
                parent_id: None,
            },
        )
        .await;

    assert!(matches!(result, Err(FeedError::BadRequest(_))));
    assert!(cache.thread("p1").expect("thread cached").is_empty());
    assert!(store.write_log().is_empty());
}

#[tokio::test]
async fn reply_to_missing_parent_is_not_found() {
    let (store, cache, coordinator) = setup(json!([])).await;
    cache.load_thread("p1").await.expect("thread loads");

    let result = coordinator
        .add_comment(
            "p1",
            NewComment {
                content: "into the void".to_string(),
                parent_id: Some("ghost".to_string()),
            },
        )
        .await;

    assert!(matches!(result, Err(FeedError::NotFound(_))));
    assert!(store.write_log().is_empty());
}

#[tokio::test]
async fn concurrent_double_toggle_is_serialized_per_entity() {
    // Arrange
    let (store, cache, coordinator) = setup(json!([])).await;
    let coordinator = Arc::new(coordinator);

    // Act: two simultaneous same-type toggles on the same post. The second
    // must read the first's applied state, not the pre-mutation state.
    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move {
            coordinator
                .toggle_reaction("p1", EntityKind::Post, ReactionType::Like)
                .await
        }
    });
    let second = tokio::spawn({
        let coordinator = coordinator.clone();
        async move {
            coordinator
                .toggle_reaction("p1", EntityKind::Post, ReactionType::Like)
                .await
        }
    });
    first.await.expect("task").expect("first toggle");
    second.await.expect("task").expect("second toggle");

    // Assert: on then off, back at baseline, no lost update.
    let summary = cache.snapshot().posts[0].reactions.clone();
    assert!(summary.counts.is_empty());
    assert_eq!(summary.viewer_reaction, None);

    let log = store.write_log();
    assert_eq!(log.len(), 2);
    assert!(log[0].starts_with("upsert post p1 u1 like"));
    assert!(log[1].starts_with("delete post p1 u1"));

    // The per-entity lock entry is evicted once both toggles settle.
    assert_eq!(coordinator.entity_lock_count().await, 0);
}

#[tokio::test]
async fn entity_lock_entries_do_not_accumulate() {
    let (_store, cache, coordinator) = setup(json!([])).await;
    cache.load_thread("p1").await.expect("thread loads");

    coordinator
        .toggle_reaction("p1", EntityKind::Post, ReactionType::Like)
        .await
        .expect("post toggle");
    // A failed lookup releases its entry too.
    let _ = coordinator
        .toggle_reaction("missing", EntityKind::Comment, ReactionType::Like)
        .await;

    assert_eq!(coordinator.entity_lock_count().await, 0);
}

#[tokio::test]
async fn markup_only_comment_rejected_after_sanitization() {
    // Arrange: a body that strips to the empty string.
    let (store, cache, coordinator) = setup(json!([])).await;
    cache.load_thread("p1").await.expect("thread loads");

    // Act
    let result = coordinator
        .add_comment(
            "p1",
            NewComment {
                content: "<script>alert(1)</script>".to_string(),
                parent_id: None,
            },
        )
        .await;

    // Assert: rejected before any optimistic apply or write.
    assert!(matches!(result, Err(FeedError::BadRequest(_))));
    assert!(cache.thread("p1").expect("thread cached").is_empty());
    assert_eq!(cache.snapshot().posts[0].comments_count, 0);
    assert!(store.write_log().is_empty());
}

#[tokio::test]
async fn markup_only_post_rejected_after_sanitization() {
    let (store, cache, coordinator) = setup(json!([])).await;
    let baseline = cache.snapshot().posts.len();

    let result = coordinator
        .create_post(NewPost {
            content: "<script>alert(1)</script>".to_string(),
            kind: PostKind::Post,
            visibility: Visibility::Public,
            media: Vec::new(),
        })
        .await;

    assert!(matches!(result, Err(FeedError::BadRequest(_))));
    assert_eq!(cache.snapshot().posts.len(), baseline);
    assert!(store.write_log().is_empty());
}

#[tokio::test]
async fn comment_content_is_sanitized_before_apply_and_write() {
    // Arrange
    let (store, cache, coordinator) = setup(json!([])).await;
    cache.load_thread("p1").await.expect("thread loads");

    // Act
    coordinator
        .add_comment(
            "p1",
            NewComment {
                content: "<script>alert(1)</script><b>hi</b>".to_string(),
                parent_id: None,
            },
        )
        .await
        .expect("comment succeeds");

    // Assert: neither the store nor the local thread ever saw the script tag.
    let log = store.write_log();
    assert!(!log[0].contains("<script"));
    assert!(log[0].contains("<b>hi</b>"));
    let thread = cache.thread("p1").expect("thread cached");
    assert!(!thread[0].content.contains("<script"));
}

#[tokio::test]
async fn created_post_is_confirmed_in_feed() {
    // Arrange
    let (_store, cache, coordinator) = setup(json!([])).await;

    // Act
    let confirmed = coordinator
        .create_post(NewPost {
            content: "new idea".to_string(),
            kind: PostKind::Idea,
            visibility: Visibility::Public,
            media: Vec::new(),
        })
        .await
        .expect("post succeeds");

    // Assert
    assert!(confirmed.id.starts_with("srv-post-"));
    let snapshot = cache.snapshot();
    assert!(snapshot.posts.iter().any(|p| p.id == confirmed.id));
    assert!(snapshot.posts.iter().all(|p| !p.id.starts_with("tmp-")));
}

#[tokio::test]
async fn failed_post_creation_rolls_the_feed_back() {
    // Arrange
    let (store, cache, coordinator) = setup(json!([])).await;
    let baseline: Vec<String> = cache
        .snapshot()
        .posts
        .iter()
        .map(|p| p.id.clone())
        .collect();
    store.fail_writes.store(true, Ordering::SeqCst);

    // Act
    let result = coordinator
        .create_post(NewPost {
            content: "doomed".to_string(),
            kind: PostKind::Post,
            visibility: Visibility::Public,
            media: Vec::new(),
        })
        .await;

    // Assert
    assert!(matches!(result, Err(FeedError::Write(_))));
    let after: Vec<String> = cache
        .snapshot()
        .posts
        .iter()
        .map(|p| p.id.clone())
        .collect();
    assert_eq!(after, baseline);
}
