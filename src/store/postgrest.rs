//! HTTP implementation of [`FeedStore`] against a PostgREST-style relational
//! endpoint: nested relationship selects, `eq.` filter predicates, upsert via
//! `Prefer: resolution=merge-duplicates`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use url::Url;

use super::FeedStore;
use crate::error::FeedError;
use crate::models::reaction::{EntityKind, ReactionType};

/// Joined selection for one feed page. Counts come back as count-aggregate
/// arrays; the shared post embeds one nested level with its own author,
/// reactions and event payload.
const POST_SELECT: &str = "*,author:profiles(id,display_name,avatar_url),\
reactions(user_id,reaction_type),\
comments_count:comments(count),\
shares_count:shares(count),\
event_details(*),\
shared_post:posts(*,author:profiles(id,display_name,avatar_url),\
reactions(user_id,reaction_type),comments_count:comments(count),event_details(*))";

/// Joined selection for a post's top-level comments with embedded replies.
/// The store pre-orders replies chronologically.
const COMMENT_SELECT: &str = "*,author:profiles(id,display_name,avatar_url),\
reactions(user_id,reaction_type),\
replies:comments(*,author:profiles(id,display_name,avatar_url),\
reactions(user_id,reaction_type))";

const FEED_PAGE_SIZE: u32 = 50;

pub struct PostgrestStore {
    client: reqwest::Client,
    base: Url,
}

impl PostgrestStore {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, FeedError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| FeedError::Fetch(format!("invalid store url: {}", e)))?;
        // Url::join drops the last path segment without this.
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| FeedError::Fetch(format!("invalid api key: {}", e)))?;
        headers.insert("apikey", key.clone());
        headers.insert("Authorization", {
            let bearer = format!("Bearer {}", api_key);
            HeaderValue::from_str(&bearer)
                .map_err(|e| FeedError::Fetch(format!("invalid api key: {}", e)))?
        });

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { client, base })
    }

    fn endpoint(&self, table: &str) -> Result<Url, FeedError> {
        self.base
            .join(table)
            .map_err(|e| FeedError::Fetch(e.to_string()))
    }
}

#[async_trait]
impl FeedStore for PostgrestStore {
    async fn fetch_feed(&self) -> Result<Vec<Value>, FeedError> {
        let mut url = self.endpoint("posts")?;
        url.query_pairs_mut()
            .append_pair("select", POST_SELECT)
            .append_pair("visibility", "eq.public")
            .append_pair("order", "created_at.desc")
            .append_pair("limit", &FEED_PAGE_SIZE.to_string());

        let rows = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Value>>()
            .await?;

        tracing::debug!(rows = rows.len(), "fetched feed page");
        Ok(rows)
    }

    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Value>, FeedError> {
        let mut url = self.endpoint("comments")?;
        url.query_pairs_mut()
            .append_pair("select", COMMENT_SELECT)
            .append_pair("post_id", &format!("eq.{}", post_id))
            .append_pair("parent_id", "is.null")
            .append_pair("order", "created_at.asc");

        let rows = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Value>>()
            .await?;

        Ok(rows)
    }

    async fn upsert_reaction(
        &self,
        entity_id: &str,
        entity_kind: EntityKind,
        user_id: &str,
        reaction_type: ReactionType,
    ) -> Result<(), FeedError> {
        let url = self.endpoint("reactions")?;

        // Upsert on the (entity, viewer) unique key: replacing an existing
        // reaction of a different type is a merge, not a conflict.
        self.client
            .post(url)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&json!({
                "entity_id": entity_id,
                "entity_kind": entity_kind.as_str(),
                "user_id": user_id,
                "reaction_type": reaction_type.as_str(),
            }))
            .send()
            .await
            .map_err(|e| FeedError::Write(e.to_string()))?
            .error_for_status()
            .map_err(|e| FeedError::Write(e.to_string()))?;

        Ok(())
    }

    async fn delete_reaction(
        &self,
        entity_id: &str,
        entity_kind: EntityKind,
        user_id: &str,
    ) -> Result<(), FeedError> {
        let mut url = self.endpoint("reactions")?;
        url.query_pairs_mut()
            .append_pair("entity_id", &format!("eq.{}", entity_id))
            .append_pair("entity_kind", &format!("eq.{}", entity_kind.as_str()))
            .append_pair("user_id", &format!("eq.{}", user_id));

        self.client
            .delete(url)
            .send()
            .await
            .map_err(|e| FeedError::Write(e.to_string()))?
            .error_for_status()
            .map_err(|e| FeedError::Write(e.to_string()))?;

        Ok(())
    }

    async fn insert_comment(
        &self,
        post_id: &str,
        user_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<Value, FeedError> {
        let mut url = self.endpoint("comments")?;
        url.query_pairs_mut().append_pair("select", COMMENT_SELECT);

        let rows = self
            .client
            .post(url)
            .header("Prefer", "return=representation")
            .json(&json!({
                "post_id": post_id,
                "user_id": user_id,
                "content": content,
                "parent_id": parent_id,
            }))
            .send()
            .await
            .map_err(|e| FeedError::Write(e.to_string()))?
            .error_for_status()
            .map_err(|e| FeedError::Write(e.to_string()))?
            .json::<Vec<Value>>()
            .await
            .map_err(|e| FeedError::Write(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| FeedError::Write("insert returned no row".to_string()))
    }

    async fn insert_post(&self, user_id: &str, mut row: Value) -> Result<Value, FeedError> {
        let mut url = self.endpoint("posts")?;
        url.query_pairs_mut().append_pair("select", POST_SELECT);

        if let Some(object) = row.as_object_mut() {
            object.insert("user_id".to_string(), json!(user_id));
        }

        let rows = self
            .client
            .post(url)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| FeedError::Write(e.to_string()))?
            .error_for_status()
            .map_err(|e| FeedError::Write(e.to_string()))?
            .json::<Vec<Value>>()
            .await
            .map_err(|e| FeedError::Write(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| FeedError::Write("insert returned no row".to_string()))
    }
}
