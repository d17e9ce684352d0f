use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::reaction::ReactionSummary;

/// Discriminates what a post is, beyond plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Post,
    Idea,
    Poll,
    Event,
    ProjectShowcase,
    Shared,
}

impl PostKind {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "idea" => PostKind::Idea,
            "poll" => PostKind::Poll,
            "event" => PostKind::Event,
            "project_showcase" => PostKind::ProjectShowcase,
            "shared" => PostKind::Shared,
            _ => PostKind::Post,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Post => "post",
            PostKind::Idea => "idea",
            PostKind::Poll => "poll",
            PostKind::Event => "event",
            PostKind::ProjectShowcase => "project_showcase",
            PostKind::Shared => "shared",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    File,
}

impl MediaKind {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            "file" | "document" => MediaKind::File,
            _ => MediaKind::Image,
        }
    }
}

/// A media reference already uploaded to object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub url: String,
    pub kind: MediaKind,
}

/// Where an academic event takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Virtual,
    InPerson,
}

/// Academic-event payload embedded in event posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub title: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location_type: LocationType,
    pub location: Option<String>,
}

/// The author reference joined into every post and comment row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// A fully normalized feed post.
///
/// `shared_post` is the recursive case: a shared post embeds the original as
/// another normalized `Post`. Depth is 1 in practice but nothing here assumes
/// a limit. When `kind == Shared` it is only absent if the original was
/// deleted; consumers must degrade gracefully in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author: Author,
    pub content: String,
    pub media: Vec<MediaAttachment>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,

    pub visibility: Visibility,
    pub kind: PostKind,
    pub is_pinned: bool,

    pub comments_count: i64,
    pub shares_count: i64,

    pub event: Option<EventDetails>,
    pub shared_post: Option<Box<Post>>,

    pub reactions: ReactionSummary,
}

/// DTO for creating a new post.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPost {
    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content length must be between 1 and 10000 chars"
    ))]
    pub content: String,

    pub kind: PostKind,
    pub visibility: Visibility,

    /// URLs of media already uploaded to object storage.
    #[serde(default)]
    pub media: Vec<MediaAttachment>,
}
