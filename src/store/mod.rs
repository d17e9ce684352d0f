//! Narrow contracts for the external collaborators: the relational query
//! service and the realtime change-notification channel. The engine works
//! against these traits; concrete transports live in the submodules.

pub mod interval;
pub mod postgrest;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::FeedError;
use crate::models::reaction::{EntityKind, ReactionType};

/// Operation kind of a change-stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One table-level change notification. The reconciler never inspects
/// `payload`; every event is just a trigger to revalidate.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub table: String,
    pub op: ChangeOp,
    pub payload: Value,
}

/// The remote relational store. Rows come back as raw JSON values; the
/// normalizer tolerates any relationship subset being absent, so
/// implementations are free to join in one call or several.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Fetches the visible feed's joined post rows, newest first.
    async fn fetch_feed(&self) -> Result<Vec<Value>, FeedError>;

    /// Fetches the joined comment rows for one post, top-level rows with
    /// their reply trees embedded.
    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Value>, FeedError>;

    /// Sets or replaces the viewer's reaction on an entity. Upsert on the
    /// (entity, viewer) key: a different existing type is overwritten.
    async fn upsert_reaction(
        &self,
        entity_id: &str,
        entity_kind: EntityKind,
        user_id: &str,
        reaction_type: ReactionType,
    ) -> Result<(), FeedError>;

    /// Removes the viewer's reaction on an entity, if any.
    async fn delete_reaction(
        &self,
        entity_id: &str,
        entity_kind: EntityKind,
        user_id: &str,
    ) -> Result<(), FeedError>;

    /// Inserts a comment and returns the authoritative row (server id and
    /// server timestamp included).
    async fn insert_comment(
        &self,
        post_id: &str,
        user_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<Value, FeedError>;

    /// Inserts a post and returns the authoritative row.
    async fn insert_post(&self, user_id: &str, row: Value) -> Result<Value, FeedError>;
}

/// The realtime change-notification channel.
#[async_trait]
pub trait ChangeStream: Send + Sync {
    /// Subscribes to change events for the given tables. Delivery stops when
    /// the receiver is dropped; implementations clean up on send failure.
    async fn subscribe(&self, tables: &[&str]) -> Result<mpsc::Receiver<ChangeEvent>, FeedError>;
}
