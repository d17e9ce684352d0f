//! The feed cache: owns the last known normalized, ordered post collection
//! and the loaded comment threads, refreshes them from the store, and
//! publishes snapshots to presentation subscribers.
//!
//! Refreshes carry a monotonic generation counter. Results are applied in
//! increasing issue order only: a slower, earlier-issued fetch that completes
//! after a later-issued one is silently discarded, so the cache can never
//! step backwards.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::FeedError;
use crate::models::comment::Comment;
use crate::models::post::Post;
use crate::models::reaction::ReactionSummary;
use crate::normalize::{normalize_comment_tree, normalize_posts};
use crate::ordering::order_posts;
use crate::store::FeedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

/// What subscribers see: the ordered posts plus loading/error flags.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub posts: Vec<Post>,
    pub status: FeedStatus,
    pub error: Option<String>,
}

struct FeedState {
    posts: Vec<Post>,
    status: FeedStatus,
    error: Option<String>,
    /// Generation of the refresh whose result is currently applied.
    applied_generation: u64,
    /// Loaded comment threads, keyed by post id.
    threads: HashMap<String, Vec<Comment>>,
}

pub struct FeedCache {
    store: Arc<dyn FeedStore>,
    viewer: Option<String>,
    state: Mutex<FeedState>,
    /// Generation of the most recently issued refresh.
    issued: AtomicU64,
    snapshot_tx: watch::Sender<FeedSnapshot>,
}

impl FeedCache {
    pub fn new(store: Arc<dyn FeedStore>, viewer: Option<String>) -> Arc<Self> {
        let initial = FeedSnapshot {
            posts: Vec::new(),
            status: FeedStatus::Idle,
            error: None,
        };
        let (snapshot_tx, _) = watch::channel(initial);

        Arc::new(Self {
            store,
            viewer,
            state: Mutex::new(FeedState {
                posts: Vec::new(),
                status: FeedStatus::Idle,
                error: None,
                applied_generation: 0,
                threads: HashMap::new(),
            }),
            issued: AtomicU64::new(0),
            snapshot_tx,
        })
    }

    pub fn viewer(&self) -> Option<&str> {
        self.viewer.as_deref()
    }

    /// Watch channel carrying the latest feed snapshot.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.lock().expect("feed state lock poisoned");
        FeedSnapshot {
            posts: state.posts.clone(),
            status: state.status,
            error: state.error.clone(),
        }
    }

    /// The loaded comment thread for a post, if any.
    pub fn thread(&self, post_id: &str) -> Option<Vec<Comment>> {
        let state = self.state.lock().expect("feed state lock poisoned");
        state.threads.get(post_id).cloned()
    }

    fn publish(&self, state: &FeedState) {
        self.snapshot_tx.send_replace(FeedSnapshot {
            posts: state.posts.clone(),
            status: state.status,
            error: state.error.clone(),
        });
    }

    /// Refetches, renormalizes and reorders the feed.
    ///
    /// Concurrent calls coalesce through the generation counter: each call
    /// claims the next generation, and only the result matching the latest
    /// issued generation is applied. A stale success is discarded without
    /// touching the cache; a failure keeps the previous posts alongside the
    /// error so consumers can keep showing the last good feed.
    pub async fn refresh(&self) -> Result<(), FeedError> {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut state = self.state.lock().expect("feed state lock poisoned");
            state.status = FeedStatus::Loading;
            self.publish(&state);
        }

        match self.store.fetch_feed().await {
            Ok(rows) => {
                let posts = order_posts(normalize_posts(&rows, self.viewer()));

                let mut state = self.state.lock().expect("feed state lock poisoned");
                if generation != self.issued.load(Ordering::SeqCst)
                    || generation <= state.applied_generation
                {
                    tracing::debug!(generation, "discarding superseded refresh result");
                    return Ok(());
                }
                state.posts = posts;
                state.status = FeedStatus::Ready;
                state.error = None;
                state.applied_generation = generation;
                self.publish(&state);
                tracing::debug!(generation, posts = state.posts.len(), "feed refreshed");
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.lock().expect("feed state lock poisoned");
                if generation == self.issued.load(Ordering::SeqCst) {
                    state.status = FeedStatus::Error;
                    state.error = Some(e.to_string());
                    self.publish(&state);
                }
                tracing::warn!(generation, error = %e, "feed refresh failed");
                Err(e)
            }
        }
    }

    /// Fetches and normalizes one post's comment thread, caching it for the
    /// mutation coordinator to write through.
    pub async fn load_thread(&self, post_id: &str) -> Result<Vec<Comment>, FeedError> {
        let rows = self.store.fetch_comments(post_id).await?;
        let thread = normalize_comment_tree(&rows, self.viewer());

        let mut state = self.state.lock().expect("feed state lock poisoned");
        state.threads.insert(post_id.to_string(), thread.clone());
        Ok(thread)
    }

    // ---- write-through accessors for the mutation coordinator ----

    pub(crate) fn post_reaction_summary(&self, post_id: &str) -> Option<ReactionSummary> {
        let mut state = self.state.lock().expect("feed state lock poisoned");
        find_post_mut(&mut state.posts, post_id).map(|post| post.reactions.clone())
    }

    pub(crate) fn set_post_reaction_summary(
        &self,
        post_id: &str,
        summary: ReactionSummary,
    ) -> bool {
        let mut state = self.state.lock().expect("feed state lock poisoned");
        let updated = match find_post_mut(&mut state.posts, post_id) {
            Some(post) => {
                post.reactions = summary;
                true
            }
            None => false,
        };
        if updated {
            self.publish(&state);
        }
        updated
    }

    pub(crate) fn comment_reaction_summary(&self, comment_id: &str) -> Option<ReactionSummary> {
        let mut state = self.state.lock().expect("feed state lock poisoned");
        for thread in state.threads.values_mut() {
            if let Some(comment) = find_comment_mut(thread, comment_id) {
                return Some(comment.reactions.clone());
            }
        }
        None
    }

    pub(crate) fn set_comment_reaction_summary(
        &self,
        comment_id: &str,
        summary: ReactionSummary,
    ) -> bool {
        let mut state = self.state.lock().expect("feed state lock poisoned");
        for thread in state.threads.values_mut() {
            if let Some(comment) = find_comment_mut(thread, comment_id) {
                comment.reactions = summary;
                return true;
            }
        }
        false
    }

    /// Appends a comment to a thread (top-level or under its parent) and
    /// bumps the owning post's comment count.
    pub(crate) fn append_comment(
        &self,
        post_id: &str,
        parent_id: Option<&str>,
        comment: Comment,
    ) -> bool {
        let mut state = self.state.lock().expect("feed state lock poisoned");
        let thread = state.threads.entry(post_id.to_string()).or_default();

        let appended = match parent_id {
            Some(parent) => match find_comment_mut(thread, parent) {
                Some(parent_comment) => {
                    parent_comment.replies.push(comment);
                    true
                }
                None => false,
            },
            None => {
                thread.push(comment);
                true
            }
        };

        if appended {
            if let Some(post) = find_post_mut(&mut state.posts, post_id) {
                post.comments_count += 1;
            }
            self.publish(&state);
        }
        appended
    }

    /// Removes a comment from a thread and restores the post's comment
    /// count. Used to roll a failed optimistic append back.
    pub(crate) fn remove_comment(&self, post_id: &str, comment_id: &str) -> bool {
        let mut state = self.state.lock().expect("feed state lock poisoned");
        let removed = match state.threads.get_mut(post_id) {
            Some(thread) => remove_comment_from(thread, comment_id),
            None => false,
        };

        if removed {
            if let Some(post) = find_post_mut(&mut state.posts, post_id) {
                post.comments_count = (post.comments_count - 1).max(0);
            }
            self.publish(&state);
        }
        removed
    }

    /// Replaces a pending comment with its server-confirmed value, in place.
    pub(crate) fn replace_comment(&self, post_id: &str, temp_id: &str, confirmed: Comment) -> bool {
        let mut state = self.state.lock().expect("feed state lock poisoned");
        let replaced = match state.threads.get_mut(post_id) {
            Some(thread) => match find_comment_mut(thread, temp_id) {
                Some(slot) => {
                    *slot = confirmed;
                    true
                }
                None => false,
            },
            None => false,
        };
        if replaced {
            self.publish(&state);
        }
        replaced
    }

    /// Prepends an optimistic post and reapplies the ordering policy.
    pub(crate) fn insert_post(&self, post: Post) {
        let mut state = self.state.lock().expect("feed state lock poisoned");
        let mut posts = std::mem::take(&mut state.posts);
        posts.insert(0, post);
        state.posts = order_posts(posts);
        self.publish(&state);
    }

    /// Removes a post by id (rollback of an optimistic insert).
    pub(crate) fn remove_post(&self, post_id: &str) -> bool {
        let mut state = self.state.lock().expect("feed state lock poisoned");
        let before = state.posts.len();
        state.posts.retain(|post| post.id != post_id);
        let removed = state.posts.len() != before;
        if removed {
            self.publish(&state);
        }
        removed
    }

    /// Replaces a pending post with its server-confirmed value.
    pub(crate) fn replace_post(&self, temp_id: &str, confirmed: Post) -> bool {
        let mut state = self.state.lock().expect("feed state lock poisoned");
        let replaced = match find_post_mut(&mut state.posts, temp_id) {
            Some(slot) => {
                *slot = confirmed;
                true
            }
            None => false,
        };
        if replaced {
            self.publish(&state);
        }
        replaced
    }
}

/// Finds a post by id, descending into embedded shared posts.
fn find_post_mut<'a>(posts: &'a mut [Post], id: &str) -> Option<&'a mut Post> {
    for post in posts {
        if post.id == id {
            return Some(post);
        }
        if let Some(shared) = post.shared_post.as_deref_mut() {
            if let Some(found) = find_post_in(shared, id) {
                return Some(found);
            }
        }
    }
    None
}

fn find_post_in<'a>(post: &'a mut Post, id: &str) -> Option<&'a mut Post> {
    if post.id == id {
        return Some(post);
    }
    match post.shared_post.as_deref_mut() {
        Some(shared) => find_post_in(shared, id),
        None => None,
    }
}

/// Finds a comment by id anywhere in a reply tree.
fn find_comment_mut<'a>(comments: &'a mut [Comment], id: &str) -> Option<&'a mut Comment> {
    for comment in comments {
        if comment.id == id {
            return Some(comment);
        }
        let found = find_comment_mut(&mut comment.replies, id);
        if found.is_some() {
            return found;
        }
    }
    None
}

fn remove_comment_from(comments: &mut Vec<Comment>, id: &str) -> bool {
    let before = comments.len();
    comments.retain(|comment| comment.id != id);
    if comments.len() != before {
        return true;
    }
    comments
        .iter_mut()
        .any(|comment| remove_comment_from(&mut comment.replies, id))
}
