//! Genre headlines from a NewsAPI-compatible search endpoint.
//!
//! The catalog maps a fixed set of genre labels to search keywords. The
//! "Local" genre has no fixed keyword: it searches for the session's
//! configured location instead.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::NewsConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Title NewsAPI substitutes for articles withdrawn by the publisher.
const REMOVED_MARKER: &str = "[Removed]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenreKeyword {
    Fixed(&'static str),
    /// Resolved to the user's location string at query time
    Location,
}

#[derive(Debug, Clone)]
pub struct Genre {
    pub label: &'static str,
    pub keyword: GenreKeyword,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenreError {
    #[error("unknown genre '{0}'")]
    Unknown(String),
    #[error("set a location before browsing local news")]
    MissingLocation,
}

/// Static genre label -> keyword mapping, defined once at startup.
#[derive(Debug, Clone)]
pub struct GenreCatalog {
    genres: Vec<Genre>,
}

impl Default for GenreCatalog {
    fn default() -> Self {
        use GenreKeyword::*;

        let genres = [
            ("Technology", Fixed("technology")),
            ("Business", Fixed("business")),
            ("Sports", Fixed("sports")),
            ("Entertainment", Fixed("entertainment")),
            ("Health", Fixed("health")),
            ("Science", Fixed("science")),
            ("Politics", Fixed("politics")),
            ("World", Fixed("world news")),
            ("Local", Location),
        ]
        .into_iter()
        .map(|(label, keyword)| Genre { label, keyword })
        .collect();

        Self { genres }
    }
}

impl GenreCatalog {
    pub fn labels(&self) -> Vec<&'static str> {
        self.genres.iter().map(|g| g.label).collect()
    }

    /// Label lookup is case-insensitive.
    pub fn get(&self, label: &str) -> Option<&Genre> {
        self.genres
            .iter()
            .find(|g| g.label.eq_ignore_ascii_case(label.trim()))
    }

    /// Keyword to search for `label`, with the location filled in for Local.
    pub fn resolve(&self, label: &str, location: &str) -> Result<String, GenreError> {
        let genre = self
            .get(label)
            .ok_or_else(|| GenreError::Unknown(label.to_string()))?;

        match genre.keyword {
            GenreKeyword::Fixed(keyword) => Ok(keyword.to_string()),
            GenreKeyword::Location => {
                let location = location.trim();
                if location.is_empty() {
                    Err(GenreError::MissingLocation)
                } else {
                    Ok(location.to_string())
                }
            }
        }
    }
}

/// One headline returned by the news search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleSummary {
    pub title: String,
    pub source_name: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    /// Truncated body preview as served by the search API
    pub content: Option<String>,
    pub url: String,
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn search(&self, keyword: &str) -> Result<Vec<ArticleSummary>>;
}

/// Client for the NewsAPI `everything` endpoint.
pub struct NewsApiClient {
    base_url: String,
    api_key: String,
    page_size: u32,
    language: String,
    sort_by: String,
    client: Client,
}

impl NewsApiClient {
    pub fn new(config: &NewsConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds()))
            .user_agent(concat!("newsbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            base_url: config.api_url().to_string(),
            api_key: api_key.into(),
            page_size: config.page_size(),
            language: config.language().to_string(),
            sort_by: config.sort_by().to_string(),
            client,
        })
    }

    /// Build a client when the key env var named in `[news]` is set.
    /// Returns `None` (genre browsing disabled) otherwise.
    pub fn from_env(config: &NewsConfig) -> Result<Option<Self>> {
        match std::env::var(config.api_key_env()) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(Self::new(config, key)?)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn search(&self, keyword: &str) -> Result<Vec<ArticleSummary>> {
        let page_size = self.page_size.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", keyword),
                ("sortBy", self.sort_by.as_str()),
                ("language", self.language.as_str()),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("news search request failed")?;

        let status = response.status();
        let body: NewsApiResponse = response
            .json()
            .await
            .with_context(|| format!("failed to parse news search response ({})", status))?;

        if body.status != "ok" {
            anyhow::bail!(
                "news search returned status '{}' ({}): {}",
                body.status,
                status,
                body.message.unwrap_or_default()
            );
        }

        Ok(body
            .articles
            .into_iter()
            .filter_map(NewsApiArticle::into_summary)
            .collect())
    }
}

/// Fetch headlines for a genre keyword. Any failure is logged and reported as
/// "no articles" rather than propagated.
pub async fn fetch_by_genre<S: NewsSource + ?Sized>(source: &S, keyword: &str) -> Vec<ArticleSummary> {
    match source.search(keyword).await {
        Ok(articles) => {
            info!("news: {} articles for '{}'", articles.len(), keyword);
            articles
        }
        Err(e) => {
            warn!("news: search for '{}' failed: {:#}", keyword, e);
            Vec::new()
        }
    }
}

// NewsAPI response structures
#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    #[serde(default)]
    source: Option<NewsApiSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<DateTime<Utc>>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

impl NewsApiArticle {
    fn into_summary(self) -> Option<ArticleSummary> {
        let url = self.url.filter(|u| !u.is_empty())?;
        let title = self.title.unwrap_or_default();
        if title == REMOVED_MARKER {
            return None;
        }

        Some(ArticleSummary {
            title,
            source_name: self.source.and_then(|s| s.name),
            description: self.description,
            published_at: self.published_at,
            author: self.author,
            content: self.content,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_resolves_fixed_keywords() {
        let catalog = GenreCatalog::default();
        assert_eq!(catalog.resolve("Technology", "").unwrap(), "technology");
        assert_eq!(catalog.resolve("world", "").unwrap(), "world news");
    }

    #[test]
    fn local_genre_uses_location() {
        let catalog = GenreCatalog::default();
        assert_eq!(catalog.resolve("Local", "  Nantes ").unwrap(), "Nantes");
        assert_eq!(catalog.resolve("Local", "   "), Err(GenreError::MissingLocation));
    }

    #[test]
    fn unknown_genre_is_rejected() {
        let catalog = GenreCatalog::default();
        assert_eq!(
            catalog.resolve("Astrology", ""),
            Err(GenreError::Unknown("Astrology".to_string()))
        );
    }

    #[test]
    fn labels_keep_catalog_order() {
        let labels = GenreCatalog::default().labels();
        assert_eq!(labels.first(), Some(&"Technology"));
        assert_eq!(labels.last(), Some(&"Local"));
        assert_eq!(labels.len(), 9);
    }

    #[test]
    fn removed_and_urlless_articles_are_skipped() {
        let removed = NewsApiArticle {
            source: None,
            author: None,
            title: Some("[Removed]".to_string()),
            description: None,
            url: Some("https://removed.com".to_string()),
            published_at: None,
            content: None,
        };
        let urlless = NewsApiArticle {
            source: None,
            author: None,
            title: Some("No link".to_string()),
            description: None,
            url: None,
            published_at: None,
            content: None,
        };
        assert!(removed.into_summary().is_none());
        assert!(urlless.into_summary().is_none());
    }
}
