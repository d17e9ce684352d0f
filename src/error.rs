// src/error.rs

use std::fmt;

/// Global feed-engine error enum.
/// Centralizes the error taxonomy so presentation code has a single
/// error-display path; no error here should crash the feed view.
#[derive(Debug)]
pub enum FeedError {
    /// The remote query collaborator reported an error. Surfaced on the
    /// feed state; the previous data is retained alongside it.
    Fetch(String),

    /// An optimistic mutation's remote write was rejected. Action-scoped
    /// and transient; triggers local rollback.
    Write(String),

    /// Invalid caller input (e.g. an empty comment), rejected before any
    /// optimistic apply.
    BadRequest(String),

    /// The targeted entity is not present in the local model.
    NotFound(String),

    /// The change-stream could not be established or disconnected. Non-fatal;
    /// the feed stays usable, only staler.
    Subscription(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for FeedError {}

/// Converts `reqwest::Error` into `FeedError::Fetch`.
/// Allows using `?` operator on store requests; write paths re-wrap
/// explicitly where the distinction matters.
impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Fetch(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::BadRequest(err.to_string())
    }
}
