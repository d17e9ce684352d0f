//! Optimistic mutations: apply the user-visible state change locally first,
//! then issue the remote write, then confirm or roll back.
//!
//! Each action is a two-phase commit in miniature. The local apply happens
//! synchronously under the feed-state lock, strictly before the write is
//! issued, so the UI never lags the action; on write failure the prior state
//! is restored exactly. The authoritative value wins on the next
//! change-stream-triggered refresh.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;

use crate::cache::FeedCache;
use crate::error::FeedError;
use crate::models::comment::{Comment, NewComment};
use crate::models::post::{Author, NewPost, Post};
use crate::models::reaction::{EntityKind, ReactionSummary, ReactionType};
use crate::normalize::{normalize_comment_tree, normalize_post};
use crate::store::FeedStore;
use crate::utils::html::clean_content;

pub struct MutationCoordinator {
    cache: Arc<FeedCache>,
    store: Arc<dyn FeedStore>,
    /// The signed-in viewer, resolved once by the auth collaborator.
    viewer: Author,
    /// Serializes mutations on the same entity by the same viewer, so a
    /// rapid double-toggle reads the first toggle's applied state rather
    /// than the pre-mutation state.
    entity_locks: Mutex<HashMap<(EntityKind, String), Arc<Mutex<()>>>>,
}

impl MutationCoordinator {
    pub fn new(cache: Arc<FeedCache>, store: Arc<dyn FeedStore>, viewer: Author) -> Self {
        Self {
            cache,
            store,
            viewer,
            entity_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn entity_lock(&self, key: &(EntityKind, String)) -> Arc<Mutex<()>> {
        let mut locks = self.entity_locks.lock().await;
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops an entity's lock entry once nobody else holds or waits on it,
    /// so the map does not retain one entry per entity ever toggled.
    async fn release_entity_lock(&self, key: &(EntityKind, String)) {
        let mut locks = self.entity_locks.lock().await;
        // Strong count 2 = the map entry plus our caller's handle; any
        // waiter would hold a third.
        if locks.get(key).is_some_and(|entry| Arc::strong_count(entry) == 2) {
            locks.remove(key);
        }
    }

    /// Number of entities with an in-flight serialized mutation.
    pub async fn entity_lock_count(&self) -> usize {
        self.entity_locks.lock().await.len()
    }

    /// Toggles the viewer's reaction on a post or comment.
    ///
    /// Requesting the type the viewer already has removes it; any other type
    /// sets or replaces it. Both count changes of a replace land in one
    /// local apply, so no intermediate state is observable.
    pub async fn toggle_reaction(
        &self,
        entity_id: &str,
        kind: EntityKind,
        reaction_type: ReactionType,
    ) -> Result<(), FeedError> {
        let key = (kind, entity_id.to_string());
        let lock = self.entity_lock(&key).await;
        let result = {
            let _serialized = lock.lock().await;
            self.toggle_serialized(entity_id, kind, reaction_type).await
        };
        self.release_entity_lock(&key).await;
        result
    }

    async fn toggle_serialized(
        &self,
        entity_id: &str,
        kind: EntityKind,
        reaction_type: ReactionType,
    ) -> Result<(), FeedError> {
        // 1. Read the current aggregated state from the normalized model.
        let current = match kind {
            EntityKind::Post => self.cache.post_reaction_summary(entity_id),
            EntityKind::Comment => self.cache.comment_reaction_summary(entity_id),
        }
        .ok_or_else(|| FeedError::NotFound(format!("Entity {} not loaded", entity_id)))?;

        // 2. Compute the next local state synchronously.
        let removing = current.viewer_reaction == Some(reaction_type);
        let next = next_summary(&current, reaction_type);

        // 3. Apply optimistically.
        self.apply_summary(kind, entity_id, next);

        // 4. Issue the remote write.
        let write = if removing {
            self.store
                .delete_reaction(entity_id, kind, &self.viewer.id)
                .await
        } else {
            self.store
                .upsert_reaction(entity_id, kind, &self.viewer.id, reaction_type)
                .await
        };

        // 5. Confirm or roll back. On success the next refresh corrects via
        //    authoritative aggregation; on failure restore the prior state
        //    exactly.
        if let Err(e) = write {
            tracing::warn!(entity_id, error = %e, "reaction write failed, rolling back");
            self.apply_summary(kind, entity_id, current);
            return Err(e);
        }
        Ok(())
    }

    fn apply_summary(&self, kind: EntityKind, entity_id: &str, summary: ReactionSummary) {
        let applied = match kind {
            EntityKind::Post => self.cache.set_post_reaction_summary(entity_id, summary),
            EntityKind::Comment => self.cache.set_comment_reaction_summary(entity_id, summary),
        };
        if !applied {
            // The entity vanished under a concurrent refresh; the refresh
            // carried authoritative state, so there is nothing to fix up.
            tracing::debug!(entity_id, "reaction target no longer in local model");
        }
    }

    /// Adds a comment to a post's thread, optimistically under a
    /// client-generated temporary id, replaced by the server-confirmed
    /// comment on success.
    pub async fn add_comment(
        &self,
        post_id: &str,
        request: NewComment,
    ) -> Result<Comment, FeedError> {
        // Validate the sanitized body, not the raw one: a comment that is
        // only markup strips to empty and must be rejected before any
        // optimistic apply or write.
        let content = clean_content(&request.content);
        let request = NewComment {
            content: content.clone(),
            parent_id: request.parent_id,
        };
        request
            .validate()
            .map_err(|e| FeedError::BadRequest(e.to_string()))?;

        let parent_id = request.parent_id.as_deref();

        let temp_id = format!("tmp-{}", Uuid::new_v4());
        let pending = Comment {
            id: temp_id.clone(),
            post_id: post_id.to_string(),
            author: self.viewer.clone(),
            content: content.clone(),
            media: Vec::new(),
            parent_id: request.parent_id.clone(),
            created_at: Utc::now(),
            reactions: ReactionSummary::default(),
            replies: Vec::new(),
        };

        if !self.cache.append_comment(post_id, parent_id, pending) {
            return Err(FeedError::NotFound(format!(
                "Parent comment {} not found",
                parent_id.unwrap_or("?")
            )));
        }

        match self
            .store
            .insert_comment(post_id, &self.viewer.id, &content, parent_id)
            .await
        {
            Ok(row) => {
                let confirmed = normalize_comment_tree(&[row], Some(&self.viewer.id))
                    .into_iter()
                    .next()
                    .ok_or_else(|| FeedError::Write("empty insert response".to_string()))?;
                self.cache.replace_comment(post_id, &temp_id, confirmed.clone());
                Ok(confirmed)
            }
            Err(e) => {
                tracing::warn!(post_id, error = %e, "comment write failed, removing pending entry");
                self.cache.remove_comment(post_id, &temp_id);
                Err(e)
            }
        }
    }

    /// Creates a post, optimistically prepended to the feed.
    pub async fn create_post(&self, request: NewPost) -> Result<Post, FeedError> {
        // Same ordering as add_comment: sanitize first, then validate.
        let content = clean_content(&request.content);
        let request = NewPost {
            content: content.clone(),
            ..request
        };
        request
            .validate()
            .map_err(|e| FeedError::BadRequest(e.to_string()))?;

        let temp_id = format!("tmp-{}", Uuid::new_v4());
        let pending = Post {
            id: temp_id.clone(),
            author: self.viewer.clone(),
            content: content.clone(),
            media: request.media.clone(),
            created_at: Utc::now(),
            updated_at: None,
            visibility: request.visibility,
            kind: request.kind,
            is_pinned: false,
            comments_count: 0,
            shares_count: 0,
            event: None,
            shared_post: None,
            reactions: ReactionSummary::default(),
        };
        self.cache.insert_post(pending);

        let row = json!({
            "content": content,
            "post_type": request.kind.as_str(),
            "visibility": request.visibility.as_str(),
            "media": request.media,
        });

        match self.store.insert_post(&self.viewer.id, row).await {
            Ok(confirmed_row) => {
                let confirmed = normalize_post(&confirmed_row, Some(&self.viewer.id));
                self.cache.replace_post(&temp_id, confirmed.clone());
                Ok(confirmed)
            }
            Err(e) => {
                tracing::warn!(error = %e, "post write failed, removing pending entry");
                self.cache.remove_post(&temp_id);
                Err(e)
            }
        }
    }
}

/// The reaction toggle's local state transition.
fn next_summary(current: &ReactionSummary, reaction_type: ReactionType) -> ReactionSummary {
    let mut next = current.clone();
    match current.viewer_reaction {
        Some(existing) if existing == reaction_type => {
            decrement(&mut next, existing);
            next.viewer_reaction = None;
        }
        Some(existing) => {
            decrement(&mut next, existing);
            increment(&mut next, reaction_type);
            next.viewer_reaction = Some(reaction_type);
        }
        None => {
            increment(&mut next, reaction_type);
            next.viewer_reaction = Some(reaction_type);
        }
    }
    next
}

fn increment(summary: &mut ReactionSummary, reaction_type: ReactionType) {
    *summary.counts.entry(reaction_type).or_insert(0) += 1;
}

/// Zero counts are removed rather than kept, matching the aggregator's
/// "absent means zero" convention.
fn decrement(summary: &mut ReactionSummary, reaction_type: ReactionType) {
    if let Some(count) = summary.counts.get_mut(&reaction_type) {
        *count -= 1;
        if *count <= 0 {
            summary.counts.remove(&reaction_type);
        }
    }
}
