// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{Value, json};

use feedsync::error::FeedError;
use feedsync::models::reaction::{EntityKind, ReactionType};
use feedsync::store::FeedStore;

/// In-memory `FeedStore` fake with failure injection and scripted, delayed
/// fetches for testing generation-counter behavior.
#[derive(Default)]
pub struct MemoryStore {
    pub feed_rows: Mutex<Vec<Value>>,
    pub comment_rows: Mutex<HashMap<String, Vec<Value>>>,

    pub fail_fetch: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fetch_count: AtomicUsize,

    /// Scripted (delay, rows) responses consumed in call order before
    /// falling back to `feed_rows`.
    pub scripted_fetches: Mutex<VecDeque<(Duration, Vec<Value>)>>,

    /// Log of reaction/comment writes, for asserting what reached the store.
    pub writes: Mutex<Vec<String>>,

    /// Server row returned by `insert_comment`; when unset the fake echoes
    /// the inserted content under a generated `srv-` id.
    pub insert_comment_response: Mutex<Option<Value>>,
    insert_seq: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_feed(&self, rows: Vec<Value>) {
        *self.feed_rows.lock().unwrap() = rows;
    }

    pub fn set_comments(&self, post_id: &str, rows: Vec<Value>) {
        self.comment_rows
            .lock()
            .unwrap()
            .insert(post_id.to_string(), rows);
    }

    pub fn script_fetch(&self, delay: Duration, rows: Vec<Value>) {
        self.scripted_fetches
            .lock()
            .unwrap()
            .push_back((delay, rows));
    }

    pub fn set_insert_comment_response(&self, row: Value) {
        *self.insert_comment_response.lock().unwrap() = Some(row);
    }

    pub fn write_log(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn fetch_feed(&self) -> Result<Vec<Value>, FeedError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(FeedError::Fetch("store unavailable".to_string()));
        }

        let scripted = self.scripted_fetches.lock().unwrap().pop_front();
        if let Some((delay, rows)) = scripted {
            tokio::time::sleep(delay).await;
            return Ok(rows);
        }

        Ok(self.feed_rows.lock().unwrap().clone())
    }

    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Value>, FeedError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(FeedError::Fetch("store unavailable".to_string()));
        }
        Ok(self
            .comment_rows
            .lock()
            .unwrap()
            .get(post_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_reaction(
        &self,
        entity_id: &str,
        entity_kind: EntityKind,
        user_id: &str,
        reaction_type: ReactionType,
    ) -> Result<(), FeedError> {
        // Suspend once so concurrent callers genuinely overlap.
        tokio::task::yield_now().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FeedError::Write("write rejected".to_string()));
        }
        self.writes.lock().unwrap().push(format!(
            "upsert {} {} {} {}",
            entity_kind.as_str(),
            entity_id,
            user_id,
            reaction_type.as_str()
        ));
        Ok(())
    }

    async fn delete_reaction(
        &self,
        entity_id: &str,
        entity_kind: EntityKind,
        user_id: &str,
    ) -> Result<(), FeedError> {
        tokio::task::yield_now().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FeedError::Write("write rejected".to_string()));
        }
        self.writes.lock().unwrap().push(format!(
            "delete {} {} {}",
            entity_kind.as_str(),
            entity_id,
            user_id
        ));
        Ok(())
    }

    async fn insert_comment(
        &self,
        post_id: &str,
        user_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<Value, FeedError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FeedError::Write("write rejected".to_string()));
        }
        self.writes
            .lock()
            .unwrap()
            .push(format!("comment {} {}: {}", post_id, user_id, content));

        if let Some(row) = self.insert_comment_response.lock().unwrap().clone() {
            return Ok(row);
        }
        let seq = self.insert_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({
            "id": format!("srv-{}", seq),
            "post_id": post_id,
            "content": content,
            "parent_id": parent_id,
            "author": {"id": user_id, "display_name": "User"},
            "created_at": "2026-01-01T00:00:00Z",
        }))
    }

    async fn insert_post(&self, user_id: &str, mut row: Value) -> Result<Value, FeedError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FeedError::Write("write rejected".to_string()));
        }
        let seq = self.insert_seq.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(object) = row.as_object_mut() {
            object.insert("id".to_string(), json!(format!("srv-post-{}", seq)));
            object.insert(
                "author".to_string(),
                json!({"id": user_id, "display_name": "User"}),
            );
            object.insert("created_at".to_string(), json!("2026-01-01T00:00:00Z"));
        }
        self.writes
            .lock()
            .unwrap()
            .push(format!("post {}", user_id));
        Ok(row)
    }
}

/// Builds a minimal raw post row the way the store would deliver it.
pub fn post_row(id: &str, pinned: bool, ts_secs: i64) -> Value {
    let created_at = DateTime::from_timestamp(ts_secs, 0)
        .expect("valid timestamp")
        .to_rfc3339();
    json!({
        "id": id,
        "post_type": "post",
        "visibility": "public",
        "is_pinned": pinned,
        "content": format!("post {}", id),
        "author": {"id": "u2", "display_name": "Someone"},
        "created_at": created_at,
        "reactions": [],
        "comments_count": [{"count": 0}],
        "shares_count": [{"count": 0}],
    })
}
