use serde_json::{json, Value};
use sw_core::config::StoreConfig;
use sw_core::types::{StoryId, StoryRecord};
use tracing::debug;

use crate::error::StoreError;
use crate::StoryStore;

/// PostgREST-style store client (Supabase-compatible): records are inserted
/// with `POST /rest/v1/{table}` and patched with
/// `PATCH /rest/v1/{table}?id=eq.{id}`.
pub struct HttpStoryStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl HttpStoryStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            table: table.into(),
        }
    }

    /// Build a client from config, reading the service key from the
    /// configured environment variable.
    pub fn from_config(cfg: &StoreConfig) -> Result<Self, StoreError> {
        if cfg.base_url.trim().is_empty() {
            return Err(StoreError::NotConfigured(
                "store.base_url is not set".to_string(),
            ));
        }
        let api_key = std::env::var(&cfg.api_key_env).map_err(|_| {
            StoreError::NotConfigured(format!(
                "environment variable {} is not set",
                cfg.api_key_env
            ))
        })?;
        Ok(Self::new(cfg.base_url.clone(), api_key, cfg.table.clone()))
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Api { status, body })
    }
}

#[async_trait::async_trait]
impl StoryStore for HttpStoryStore {
    async fn save(&self, record: &StoryRecord) -> Result<StoryId, StoreError> {
        let resp = self
            .authed(self.client.post(self.table_url()))
            .header("Prefer", "return=representation")
            .json(record)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let resp = Self::check(resp).await?;

        // PostgREST returns the inserted rows as a JSON array.
        let rows: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::BadResponse(e.to_string()))?;
        let id = rows[0]["id"]
            .as_str()
            .map(str::to_string)
            .or_else(|| rows[0]["id"].as_u64().map(|n| n.to_string()))
            .ok_or_else(|| StoreError::BadResponse("insert returned no id".to_string()))?;

        debug!(story_id = %id, "story record persisted");
        Ok(StoryId(id))
    }

    async fn attach_illustration(&self, id: &StoryId, url: &str) -> Result<(), StoreError> {
        let resp = self
            .authed(
                self.client
                    .patch(format!("{}?id=eq.{}", self.table_url(), id.0)),
            )
            .json(&json!({ "image_url": url }))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Self::check(resp).await?;

        debug!(story_id = %id, "illustration attached to story record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_requires_base_url() {
        let cfg = StoreConfig::default();
        assert!(matches!(
            HttpStoryStore::from_config(&cfg),
            Err(StoreError::NotConfigured(_))
        ));
    }

    #[test]
    fn table_url_shape() {
        let store = HttpStoryStore::new("https://example.supabase.co", "key", "stories");
        assert_eq!(store.table_url(), "https://example.supabase.co/rest/v1/stories");
    }
}
