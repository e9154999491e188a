/*!
common/src/lib.rs

Shared configuration types for NEWSBot.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default file with an optional override file
- Default values for every optional setting

Secrets never live in the configuration file: sections only name the
environment variables that hold API keys.
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_COMPLETION_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_COMPLETION_KEY_ENV: &str = "GROQ_API_KEY";
pub const DEFAULT_COMPLETION_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_COMPLETION_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_COMPLETION_MAX_TOKENS: usize = 1024;
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_NEWS_URL: &str = "https://newsapi.org/v2/everything";
pub const DEFAULT_NEWS_KEY_ENV: &str = "NEWS_API_KEY";
pub const DEFAULT_NEWS_PAGE_SIZE: u32 = 10;
pub const DEFAULT_NEWS_LANGUAGE: &str = "en";
pub const DEFAULT_NEWS_SORT_BY: &str = "publishedAt";
pub const DEFAULT_NEWS_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 10;
/// Some news sites reject anything that does not look like a browser.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
pub const DEFAULT_MAX_ARTICLE_CHARS: usize = 15_000;

pub const DEFAULT_MAX_COMBINED_CHARS: usize = 60_000;

pub const DEFAULT_SESSION_IDLE_MINUTES: u64 = 120;

/// HTTP listener configuration, merged into the Rocket figment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// Sessions untouched for this long are dropped. `0` keeps them forever.
    pub session_idle_minutes: Option<u64>,
}

impl ServerConfig {
    pub fn session_idle_minutes(&self) -> Option<u64> {
        match self.session_idle_minutes.unwrap_or(DEFAULT_SESSION_IDLE_MINUTES) {
            0 => None,
            n => Some(n),
        }
    }
}

/// Chat-completion endpoint (OpenAI-compatible)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<usize>,
    pub timeout_seconds: Option<u64>,
}

impl CompletionConfig {
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_COMPLETION_URL)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_COMPLETION_KEY_ENV)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_COMPLETION_MODEL)
    }

    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_COMPLETION_TEMPERATURE)
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens.unwrap_or(DEFAULT_COMPLETION_MAX_TOKENS)
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_COMPLETION_TIMEOUT_SECS)
    }
}

/// News-search endpoint (NewsAPI-compatible). The key is optional: without it
/// genre browsing is disabled but article research keeps working.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub page_size: Option<u32>,
    pub language: Option<String>,
    pub sort_by: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Initial location string for the "Local" genre of new sessions
    pub default_location: Option<String>,
}

impl NewsConfig {
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_NEWS_URL)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_NEWS_KEY_ENV)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_NEWS_PAGE_SIZE)
    }

    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_NEWS_LANGUAGE)
    }

    pub fn sort_by(&self) -> &str {
        self.sort_by.as_deref().unwrap_or(DEFAULT_NEWS_SORT_BY)
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_NEWS_TIMEOUT_SECS)
    }
}

/// Article fetching configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
    pub max_chars: Option<usize>,
}

impl ExtractionConfig {
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_EXTRACTION_TIMEOUT_SECS)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars.unwrap_or(DEFAULT_MAX_ARTICLE_CHARS)
    }
}

/// Combined-context budget. `max_combined_chars = 0` disables the cap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    pub max_combined_chars: Option<usize>,
}

impl ContextConfig {
    pub fn max_combined_chars(&self) -> Option<usize> {
        match self.max_combined_chars.unwrap_or(DEFAULT_MAX_COMBINED_CHARS) {
            0 => None,
            n => Some(n),
        }
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub completion: CompletionConfig,
    pub news: Option<NewsConfig>,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    /// With neither present every setting takes its built-in default.
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Server settings, falling back to defaults when the section is absent.
    pub fn server_or_default(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// News settings, falling back to defaults when the section is absent.
    pub fn news_or_default(&self) -> NewsConfig {
        self.news.clone().unwrap_or_default()
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_string() {
        let toml = r#"
            [server]
            bind = "127.0.0.1"
            port = 8080

            [completion]
            model = "llama-3.1-8b-instant"
            max_tokens = 512

            [news]
            default_location = "Lyon"
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        let server = cfg.server.as_ref().expect("server section");
        assert_eq!(server.port, Some(8080));
        assert_eq!(cfg.completion.model(), "llama-3.1-8b-instant");
        assert_eq!(cfg.completion.max_tokens(), 512);
        assert_eq!(cfg.completion.temperature(), 0.3);
        assert_eq!(cfg.news_or_default().default_location.as_deref(), Some("Lyon"));
        assert_eq!(cfg.news_or_default().page_size(), 10);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").expect("parse empty config");
        assert_eq!(cfg.completion.api_url(), DEFAULT_COMPLETION_URL);
        assert_eq!(cfg.completion.api_key_env(), "GROQ_API_KEY");
        assert_eq!(cfg.extraction.max_chars(), 15_000);
        assert_eq!(cfg.extraction.timeout_seconds(), 10);
        assert_eq!(cfg.context.max_combined_chars(), Some(DEFAULT_MAX_COMBINED_CHARS));
        assert!(cfg.news.is_none());
        assert_eq!(cfg.server_or_default().session_idle_minutes(), Some(120));
    }

    #[test]
    fn session_idle_timeout_can_be_disabled() {
        let cfg: Config = toml::from_str("[server]\nsession_idle_minutes = 0").expect("parse");
        assert_eq!(cfg.server_or_default().session_idle_minutes(), None);

        let cfg: Config = toml::from_str("[server]\nsession_idle_minutes = 15").expect("parse");
        assert_eq!(cfg.server_or_default().session_idle_minutes(), Some(15));
    }

    #[test]
    fn zero_context_budget_disables_cap() {
        let cfg: Config = toml::from_str("[context]\nmax_combined_chars = 0").expect("parse");
        assert_eq!(cfg.context.max_combined_chars(), None);
    }

    #[tokio::test]
    async fn override_file_takes_precedence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");

        tokio::fs::write(
            &default_path,
            "[completion]\nmodel = \"base-model\"\nmax_tokens = 1024\n\n[extraction]\nmax_chars = 15000\n",
        )
        .await
        .expect("write default");
        tokio::fs::write(&override_path, "[completion]\nmodel = \"override-model\"\n")
            .await
            .expect("write override");

        let cfg = Config::load_with_defaults(Some(default_path.as_path()), Some(override_path.as_path()))
            .await
            .expect("load config");

        assert_eq!(cfg.completion.model(), "override-model");
        // Keys absent from the override survive the merge
        assert_eq!(cfg.completion.max_tokens, Some(1024));
        assert_eq!(cfg.extraction.max_chars, Some(15000));
    }

    #[tokio::test]
    async fn missing_files_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        let cfg = Config::load_with_defaults(Some(missing.as_path()), None)
            .await
            .expect("load config");
        assert_eq!(cfg.completion.model(), DEFAULT_COMPLETION_MODEL);
    }
}
