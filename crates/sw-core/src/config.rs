use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::SavePolicy;

/// Top-level configuration loaded from `~/.storyweave/config.toml`.
///
/// **Security**: this struct never stores API keys or tokens. Each section
/// names the environment variable its credential is read from at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Orchestrator behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// When the combined record is persisted; see [`SavePolicy`].
    #[serde(default)]
    pub save_policy: SavePolicy,
    /// Escalate a subtask that has not terminated within this many seconds
    /// to `Failed`. Absent means no timeout: a stuck subtask leaves its
    /// cycle unsaved until a resubmission supersedes it.
    #[serde(default)]
    pub subtask_timeout_secs: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { save_policy: SavePolicy::default(), subtask_timeout_secs: None }
    }
}

/// The OpenAI-compatible generation endpoint and per-subtask models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_story_model")]
    pub story_model: String,
    #[serde(default = "default_title_model")]
    pub title_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_story_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_title_model() -> String {
    "gpt-4.1-nano".to_string()
}
fn default_image_model() -> String {
    "dall-e-3".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            story_model: default_story_model(),
            title_model: default_title_model(),
            image_model: default_image_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// The PostgREST-style endpoint stories are persisted to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_store_table")]
    pub table: String,
    /// Environment variable holding the service key.
    #[serde(default = "default_store_key_env")]
    pub api_key_env: String,
}

fn default_store_table() -> String {
    "stories".to_string()
}
fn default_store_key_env() -> String {
    "STORYWEAVE_STORE_KEY".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            table: default_store_table(),
            api_key_env: default_store_key_env(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Config {
    /// Load config from `~/.storyweave/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Semantic validation for settings not expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secs) = self.generation.subtask_timeout_secs {
            if secs == 0 {
                return Err(ConfigError::Invalid(
                    "generation.subtask_timeout_secs must be positive when set".to_string(),
                ));
            }
        }
        if self.providers.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "providers.base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".storyweave")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.generation.save_policy, SavePolicy::AwaitIllustration);
        assert_eq!(cfg.providers.story_model, "gpt-4o-mini");
        assert_eq!(cfg.store.table, "stories");
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: Config = toml::from_str(
            r#"
            [generation]
            save_policy = "save_then_patch"
            subtask_timeout_secs = 90

            [store]
            base_url = "https://example.supabase.co"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.generation.save_policy, SavePolicy::SaveThenPatch);
        assert_eq!(cfg.generation.subtask_timeout_secs, Some(90));
        assert_eq!(cfg.store.base_url, "https://example.supabase.co");
        // Untouched sections keep their defaults.
        assert_eq!(cfg.providers.image_model, "dall-e-3");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cfg: Config = toml::from_str(
            r#"
            [generation]
            subtask_timeout_secs = 0
            "#,
        )
        .unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }
}
