use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::post::{Author, MediaAttachment};
use super::reaction::ReactionSummary;

/// A normalized comment within a post's thread.
///
/// Replies form a tree: each node carries the same shape recursively. Reply
/// depth is bounded in practice but unspecified, so nothing here assumes a
/// limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author: Author,
    pub content: String,
    pub media: Vec<MediaAttachment>,

    /// The comment this one replies to, if it is not top-level.
    pub parent_id: Option<String>,

    pub created_at: DateTime<Utc>,

    pub reactions: ReactionSummary,
    pub replies: Vec<Comment>,
}

impl Comment {
    /// Whether this comment carries a client-generated id pending server
    /// confirmation.
    pub fn is_pending(&self) -> bool {
        self.id.starts_with("tmp-")
    }
}

/// DTO for creating a new comment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewComment {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,

    /// Optional: the ID of the comment being replied to.
    pub parent_id: Option<String>,
}
