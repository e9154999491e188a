use anyhow::{Context, Result};
use async_trait::async_trait;
use common::ExtractionConfig;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Elements whose text is boilerplate rather than article content.
const NON_CONTENT_SELECTOR: &str = "script, style, nav, footer, header";

/// Why an article could not be extracted.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("invalid article URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to fetch article page: {0}")]
    Fetch(#[source] reqwest::Error),
    #[error("article fetch failed with status: {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("no readable text found at {0}")]
    EmptyContent(String),
}

/// Turns an article URL into bounded plain text.
#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String, ExtractionError>;
}

/// Fetches article pages over HTTP with a browser user agent, no retries.
pub struct HttpExtractor {
    client: Client,
    max_chars: usize,
}

impl HttpExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds()))
            .user_agent(config.user_agent())
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            max_chars: config.max_chars(),
        })
    }
}

#[async_trait]
impl ArticleExtractor for HttpExtractor {
    async fn extract(&self, url: &str) -> Result<String, ExtractionError> {
        let parsed = url::Url::parse(url).map_err(|e| ExtractionError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ExtractionError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| {
                warn!("extraction: fetch failed for {}: {}", url, e);
                ExtractionError::Fetch(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("extraction: {} answered {}", url, status);
            return Err(ExtractionError::Status(status));
        }

        let html = response.text().await.map_err(ExtractionError::Body)?;
        let text = extract_text(&html, self.max_chars);
        info!("extraction: {} chars of text from {}", text.chars().count(), url);
        Ok(text)
    }
}

/// Strips non-content elements from an HTML document and returns its text with
/// whitespace collapsed, hard-cut to `max_chars` characters.
pub fn extract_text(html: &str, max_chars: usize) -> String {
    let mut document = Html::parse_document(html);

    if let Ok(selector) = Selector::parse(NON_CONTENT_SELECTOR) {
        let boilerplate: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
        for id in boilerplate {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    // Adjacent block elements carry no whitespace between their text nodes
    let raw = document.root_element().text().collect::<Vec<_>>().join(" ");
    truncate_chars(normalize_whitespace(&raw), max_chars)
}

/// Collapses every run of whitespace or control characters into one space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keeps the first `max_chars` characters, never splitting a code point.
pub fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((byte_idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_idx);
        let trimmed = text.trim_end().len();
        text.truncate(trimmed);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_boilerplate_elements() {
        let html = r#"<html><body>
            <header>Site Menu</header>
            <nav><a href="/">Home</a></nav>
            <p>Hello   world</p>
            <script>var tracking = 1;</script>
            <style>p { color: red; }</style>
            <footer>Copyright</footer>
        </body></html>"#;

        assert_eq!(extract_text(html, 15_000), "Hello world");
    }

    #[test]
    fn collapses_whitespace_and_control_characters() {
        let text = "  Breaking\n\n\tnews \u{7}today \r\n ";
        assert_eq!(normalize_whitespace(text), "Breaking news today");
    }

    #[test]
    fn truncates_on_character_boundary() {
        let text = "é".repeat(20);
        let cut = truncate_chars(text, 5);
        assert_eq!(cut.chars().count(), 5);
        assert_eq!(cut, "ééééé");
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_chars("short".to_string(), 100), "short");
    }

    #[test]
    fn long_article_is_capped() {
        let body = "word ".repeat(10_000);
        let html = format!("<html><body><article>{}</article></body></html>", body);
        let text = extract_text(&html, 15_000);

        assert!(text.chars().count() <= 15_000);
        assert!(!text.contains("  "));
        assert!(!text.ends_with(' '));
        assert!(text.starts_with("word word"));
    }

    #[test]
    fn adjacent_blocks_stay_separate_words() {
        let html = "<html><body><p>Hello</p><p>World</p><ul><li>one</li><li>two</li></ul></body></html>";
        assert_eq!(extract_text(html, 100), "Hello World one two");
    }

    #[test]
    fn nested_boilerplate_is_removed_once() {
        let html = "<html><body><header><nav>Menu</nav><script>x()</script></header><main>Story</main></body></html>";
        assert_eq!(extract_text(html, 100), "Story");
    }
}
