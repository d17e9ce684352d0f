use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The set of reaction types the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionType {
    Like,
    Love,
    Celebrate,
    Insightful,
    Curious,
}

impl ReactionType {
    /// Maps a raw reaction-type string from the store to a known type.
    ///
    /// The store contains legacy values written by older clients, so unknown
    /// strings are folded into the nearest current type instead of rejected:
    ///
    /// - `heart` -> `Love`
    /// - `clap`, `congrats` -> `Celebrate`
    /// - `+1`, `thumbsup`, `upvote` -> `Like`
    /// - `wow`, `surprised` -> `Curious`
    /// - `mind_blown` -> `Insightful`
    /// - anything else -> `Like` (the least specific positive signal)
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "like" | "+1" | "thumbsup" | "upvote" => ReactionType::Like,
            "love" | "heart" => ReactionType::Love,
            "celebrate" | "clap" | "congrats" => ReactionType::Celebrate,
            "insightful" | "mind_blown" => ReactionType::Insightful,
            "curious" | "wow" | "surprised" => ReactionType::Curious,
            _ => ReactionType::Like,
        }
    }

    /// The wire name written back to the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Like => "like",
            ReactionType::Love => "love",
            ReactionType::Celebrate => "celebrate",
            ReactionType::Insightful => "insightful",
            ReactionType::Curious => "curious",
        }
    }
}

/// Which kind of entity a reaction row points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Post,
    Comment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
        }
    }
}

/// One raw reaction fact row from the store.
///
/// At most one row exists per (entity_id, user_id) pair; toggling a reaction
/// replaces the row rather than adding a second one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionRow {
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub user_id: String,
    pub reaction_type: String,
}

/// Aggregated reaction state for one post or comment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReactionSummary {
    /// Count of reactions per type. Types with zero reactions are absent.
    pub counts: HashMap<ReactionType, i64>,

    /// The requesting viewer's own reaction, if any.
    pub viewer_reaction: Option<ReactionType>,
}

impl ReactionSummary {
    /// Total reactions across all types.
    pub fn total(&self) -> i64 {
        self.counts.values().sum()
    }
}
