//! OpenAI-compatible implementations of the provider traits.
//!
//! Text generation uses the chat completions endpoint with `stream: true`
//! and parses the server-sent-event framing (`data:` lines terminated by a
//! `[DONE]` marker); illustration generation uses the images endpoint and
//! expects a URL back.

use futures_util::StreamExt;
use serde_json::{json, Value};
use sw_core::config::ProvidersConfig;
use sw_core::prompts::TextPrompt;
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};
use crate::image::{ImageAsset, ImageProvider};
use crate::text::{TextStream, TextStreamProvider};

fn key_from_env(var: &str) -> Result<String> {
    std::env::var(var)
        .map_err(|_| ProviderError::NotConfigured(format!("environment variable {var} is not set")))
}

fn map_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Other(e.to_string())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = resp
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| secs * 1000)
            .unwrap_or(1000);
        return Err(ProviderError::RateLimited { retry_after_ms });
    }
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Api(format!("HTTP {status}: {body}")));
    }
    Ok(resp)
}

// ---------------------------------------------------------------------------
// OpenAiTextProvider
// ---------------------------------------------------------------------------

/// Streamed chat-completions client for one model. The orchestrator holds
/// two instances: one for the story model and one for the title model.
pub struct OpenAiTextProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiTextProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Build a provider for `model` from config, reading the API key from
    /// the configured environment variable.
    pub fn from_config(cfg: &ProvidersConfig, model: impl Into<String>) -> Result<Self> {
        let api_key = key_from_env(&cfg.api_key_env)?;
        Ok(Self::new(cfg.base_url.clone(), api_key, model))
    }
}

/// Extract the text delta from one parsed SSE payload, if it carries one.
fn parse_delta(value: &Value) -> Option<String> {
    value["choices"][0]["delta"]["content"]
        .as_str()
        .map(str::to_string)
}

/// Pop one complete line off the byte buffer, trimmed and without its
/// newline. Decoding happens per line rather than per network chunk so a
/// multi-byte character split across two chunks stays intact.
fn next_line(buffer: &mut Vec<u8>) -> Option<String> {
    let pos = buffer.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = buffer.drain(..=pos).collect();
    Some(String::from_utf8_lossy(&line[..pos]).trim().to_string())
}

#[async_trait::async_trait]
impl TextStreamProvider for OpenAiTextProvider {
    async fn stream(&self, prompt: &TextPrompt) -> Result<TextStream> {
        let body = json!({
            "model": self.model,
            "stream": true,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;
        let resp = check_status(resp).await?;

        // Forward parsed deltas through a channel; the receiver end is the
        // stream handed to the subtask runner.
        let (tx, rx) = flume::unbounded::<Result<String>>();
        let model = self.model.clone();
        tokio::spawn(async move {
            let mut bytes = resp.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::Other(e.to_string())));
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(line) = next_line(&mut buffer) {
                    if line == "data: [DONE]" {
                        return;
                    }
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    match serde_json::from_str::<Value>(data) {
                        Ok(value) => {
                            if let Some(delta) = parse_delta(&value) {
                                if tx.send(Ok(delta)).is_err() {
                                    // Receiver gone: the cycle was superseded.
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            debug!(model = %model, error = %e, "skipping unparseable sse line");
                        }
                    }
                }
            }
            warn!(model = %model, "sse stream ended without [DONE] marker");
        });

        Ok(rx.into_stream().boxed())
    }

    fn name(&self) -> &str {
        "openai-text"
    }
}

// ---------------------------------------------------------------------------
// OpenAiImageProvider
// ---------------------------------------------------------------------------

/// Single-shot images-endpoint client.
#[derive(Debug)]
pub struct OpenAiImageProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiImageProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_config(cfg: &ProvidersConfig) -> Result<Self> {
        let api_key = key_from_env(&cfg.api_key_env)?;
        Ok(Self::new(cfg.base_url.clone(), api_key, cfg.image_model.clone()))
    }
}

#[async_trait::async_trait]
impl ImageProvider for OpenAiImageProvider {
    async fn generate(&self, prompt: &str) -> Result<ImageAsset> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": "1024x1024",
            "response_format": "url",
        });

        let resp = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;
        let resp = check_status(resp).await?;

        let value: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("decode error: {e}")))?;

        // A well-formed response without a reference is still a failure.
        match value["data"][0]["url"].as_str() {
            Some(url) if !url.is_empty() => Ok(ImageAsset { url: url.to_string() }),
            _ => Err(ProviderError::EmptyResult),
        }
    }

    fn name(&self) -> &str {
        "openai-image"
    }
}
