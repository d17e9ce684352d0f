//! Row normalization: turns raw, relationally-joined rows from the store into
//! the canonical nested domain model.
//!
//! Every function here is total over any row shaped approximately like the
//! expected schema: missing or malformed fields degrade to empty/zero
//! defaults, never to a panic or an error, so a single bad row cannot blank
//! the whole feed. Shared posts and reply trees recurse without a depth
//! limit; the relational source is tree-shaped by construction (a share row
//! references an earlier post), so no cycle detection is needed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::comment::Comment;
use crate::models::post::{
    Author, EventDetails, LocationType, MediaAttachment, MediaKind, Post, PostKind, Visibility,
};
use crate::models::reaction::{EntityKind, ReactionRow, ReactionSummary};
use crate::reactions::{aggregate_reactions, summary_for};

/// Reads a field as a string, accepting string or numeric ids.
fn str_field(row: &Value, key: &str) -> String {
    match &row[key] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn opt_str_field(row: &Value, key: &str) -> Option<String> {
    match &row[key] {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn bool_field(row: &Value, key: &str) -> bool {
    row[key].as_bool().unwrap_or(false)
}

fn timestamp_field(row: &Value, key: &str) -> Option<DateTime<Utc>> {
    row[key]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Reads a count aggregate: the store delivers these as `[{"count": n}]`,
/// but a bare number is accepted too. Absent or malformed defaults to 0.
fn count_field(row: &Value, key: &str) -> i64 {
    match &row[key] {
        Value::Array(items) => items
            .first()
            .and_then(|item| item["count"].as_i64())
            .unwrap_or(0),
        Value::Number(n) => n.as_i64().unwrap_or(0),
        _ => 0,
    }
}

/// Accepts an embedded sub-row delivered either as a bare object or as a
/// one-element collection, which the store does inconsistently for to-one
/// relationships.
fn object_or_first(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(_) => Some(value),
        Value::Array(items) => items.first().filter(|item| item.is_object()),
        _ => None,
    }
}

fn normalize_author(value: &Value) -> Author {
    Author {
        id: str_field(value, "id"),
        display_name: str_field(value, "display_name"),
        avatar_url: opt_str_field(value, "avatar_url"),
    }
}

fn normalize_media(row: &Value) -> Vec<MediaAttachment> {
    match &row["media"] {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let url = opt_str_field(item, "url")?;
                let kind = MediaKind::from_raw(item["media_type"].as_str().unwrap_or("image"));
                Some(MediaAttachment { url, kind })
            })
            .collect(),
        // Older rows carry a single flat media_url/media_type pair.
        _ => opt_str_field(row, "media_url")
            .map(|url| MediaAttachment {
                url,
                kind: MediaKind::from_raw(row["media_type"].as_str().unwrap_or("image")),
            })
            .into_iter()
            .collect(),
    }
}

fn normalize_event(row: &Value) -> Option<EventDetails> {
    let event = object_or_first(&row["event_details"])?;
    let location_type = if bool_field(event, "is_virtual") {
        LocationType::Virtual
    } else {
        LocationType::InPerson
    };
    Some(EventDetails {
        title: str_field(event, "title"),
        starts_at: timestamp_field(event, "starts_at"),
        ends_at: timestamp_field(event, "ends_at"),
        location_type,
        location: opt_str_field(event, "location"),
    })
}

/// Collects the embedded `reactions` array of a row into flat fact rows for
/// the aggregator, keyed by the owning entity's id.
fn reaction_rows(row: &Value, entity_id: &str, entity_kind: EntityKind) -> Vec<ReactionRow> {
    match &row["reactions"] {
        Value::Array(items) => items
            .iter()
            .map(|item| ReactionRow {
                entity_id: entity_id.to_string(),
                entity_kind,
                user_id: str_field(item, "user_id"),
                reaction_type: str_field(item, "reaction_type"),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Normalizes one joined post row, recursing into an embedded shared post.
pub fn normalize_post(row: &Value, viewer: Option<&str>) -> Post {
    let id = str_field(row, "id");

    let visibility = match row["visibility"].as_str() {
        Some("private") => Visibility::Private,
        _ => Visibility::Public,
    };

    let shared_post = object_or_first(&row["shared_post"])
        .map(|shared| Box::new(normalize_post(shared, viewer)));

    let rows = reaction_rows(row, &id, EntityKind::Post);
    let reactions = summary_for(&aggregate_reactions(&rows, viewer), &id);

    Post {
        author: normalize_author(&row["author"]),
        content: str_field(row, "content"),
        media: normalize_media(row),
        created_at: timestamp_field(row, "created_at").unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        updated_at: timestamp_field(row, "updated_at"),
        visibility,
        kind: PostKind::from_raw(row["post_type"].as_str().unwrap_or("post")),
        is_pinned: bool_field(row, "is_pinned"),
        comments_count: count_field(row, "comments_count"),
        shares_count: count_field(row, "shares_count"),
        event: normalize_event(row),
        shared_post,
        reactions,
        id,
    }
}

/// Normalizes a batch of post rows, preserving input order. Ordering is the
/// ordering policy's concern, not the normalizer's.
pub fn normalize_posts(rows: &[Value], viewer: Option<&str>) -> Vec<Post> {
    rows.iter().map(|row| normalize_post(row, viewer)).collect()
}

/// Walks a raw comment and all of its descendants, collecting reaction fact
/// rows so the whole thread can be aggregated in one pass.
fn collect_thread_reactions(row: &Value, out: &mut Vec<ReactionRow>) {
    let id = str_field(row, "id");
    out.extend(reaction_rows(row, &id, EntityKind::Comment));
    if let Value::Array(replies) = &row["replies"] {
        for reply in replies {
            collect_thread_reactions(reply, out);
        }
    }
}

fn normalize_comment(row: &Value, summaries: &HashMap<String, ReactionSummary>) -> Comment {
    let id = str_field(row, "id");

    // Absent reply arrays mean a leaf, never an error.
    let replies = match &row["replies"] {
        Value::Array(items) => items
            .iter()
            .map(|reply| normalize_comment(reply, summaries))
            .collect(),
        _ => Vec::new(),
    };

    Comment {
        post_id: str_field(row, "post_id"),
        author: normalize_author(&row["author"]),
        content: str_field(row, "content"),
        media: normalize_media(row),
        parent_id: opt_str_field(row, "parent_id"),
        created_at: timestamp_field(row, "created_at").unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        reactions: summary_for(summaries, &id),
        replies,
        id,
    }
}

/// Normalizes a post's comment thread.
///
/// Reactions for every level of the tree are aggregated in a single pass over
/// the flat id set, then each node looks up its own id. Top-level comments
/// are ordered oldest first; reply order within a thread is preserved as
/// received, the store pre-orders replies.
pub fn normalize_comment_tree(rows: &[Value], viewer: Option<&str>) -> Vec<Comment> {
    let mut facts = Vec::new();
    for row in rows {
        collect_thread_reactions(row, &mut facts);
    }
    let summaries = aggregate_reactions(&facts, viewer);

    let mut comments: Vec<Comment> = rows
        .iter()
        .map(|row| normalize_comment(row, &summaries))
        .collect();
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    comments
}
