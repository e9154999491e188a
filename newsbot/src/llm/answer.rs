// Grounded question answering over loaded article text
use common::CompletionConfig;
use thiserror::Error;
use tracing::{info, warn};

use super::{LlmProvider, LlmRequest};

pub const SYSTEM_PROMPT: &str = "You are NEWSBot, a helpful and accurate news research assistant.";

/// Failure of the completion service, displayable as the assistant's reply.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Error querying completion service: {0:#}")]
    Remote(anyhow::Error),
    #[error("Error querying completion service: the model returned an empty answer")]
    EmptyAnswer,
}

/// Generation parameters for answering questions about articles.
#[derive(Debug, Clone)]
pub struct AnswerSettings {
    pub temperature: f64,
    pub max_tokens: usize,
    /// Total budget for the combined article context; `None` disables it
    pub max_context_chars: Option<usize>,
    /// Per-request timeout; `None` uses the provider's default
    pub timeout_seconds: Option<u64>,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            temperature: common::DEFAULT_COMPLETION_TEMPERATURE,
            max_tokens: common::DEFAULT_COMPLETION_MAX_TOKENS,
            max_context_chars: Some(common::DEFAULT_MAX_COMBINED_CHARS),
            timeout_seconds: None,
        }
    }
}

impl AnswerSettings {
    pub fn from_config(completion: &CompletionConfig, max_context_chars: Option<usize>) -> Self {
        Self {
            temperature: completion.temperature(),
            max_tokens: completion.max_tokens(),
            max_context_chars,
            timeout_seconds: Some(completion.timeout_seconds()),
        }
    }
}

/// Wraps the article context and the user's question into the answering prompt.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are NEWSBot, a helpful news research assistant. Based on the following article content, answer the user's question accurately and concisely.

Article Content:
{}

User Question: {}

Provide a clear, informative answer based solely on the article content. If the information isn't in the article, say so."#,
        context, question
    )
}

/// Ask the completion service to answer `question` from `context` only.
pub async fn complete<P: LlmProvider + ?Sized>(
    provider: &P,
    settings: &AnswerSettings,
    question: &str,
    context: &str,
) -> Result<String, CompletionError> {
    let request = LlmRequest {
        system: Some(SYSTEM_PROMPT.to_string()),
        prompt: build_prompt(question, context),
        max_tokens: Some(settings.max_tokens),
        temperature: Some(settings.temperature),
        timeout_seconds: settings.timeout_seconds,
    };

    match provider.generate(request).await {
        Ok(response) => {
            let answer = response.content.trim();
            if answer.is_empty() {
                warn!("completion: {} returned an empty answer", response.model);
                return Err(CompletionError::EmptyAnswer);
            }
            info!(
                "completion: answered with {} ({} tokens)",
                response.model, response.usage.total_tokens
            );
            Ok(answer.to_string())
        }
        Err(e) => {
            warn!("completion: request failed: {:#}", e);
            Err(CompletionError::Remote(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, UsageMetadata};
    use std::sync::Mutex;

    struct CannedProvider {
        reply: Option<String>,
        seen: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for CannedProvider {
        async fn generate(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
            self.seen.lock().unwrap().push(request);
            match &self.reply {
                Some(content) => Ok(LlmResponse {
                    content: content.clone(),
                    usage: UsageMetadata::default(),
                    model: "canned".to_string(),
                }),
                None => anyhow::bail!("LLM API error 401 Unauthorized: invalid key"),
            }
        }
    }

    #[test]
    fn prompt_contains_context_and_question() {
        let prompt = build_prompt("Who won?", "Article from http://x/a:\nTeam A won.");
        assert!(prompt.contains("Article Content:\nArticle from http://x/a:\nTeam A won."));
        assert!(prompt.contains("User Question: Who won?"));
        assert!(prompt.contains("If the information isn't in the article, say so."));
    }

    #[tokio::test]
    async fn complete_sends_system_persona_and_settings() {
        let provider = CannedProvider {
            reply: Some("  Team A won.  ".to_string()),
            seen: Mutex::new(Vec::new()),
        };

        let answer = complete(&provider, &AnswerSettings::default(), "Who won?", "ctx")
            .await
            .expect("answer");
        assert_eq!(answer, "Team A won.");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].system.as_deref(), Some(SYSTEM_PROMPT));
        assert_eq!(seen[0].temperature, Some(0.3));
        assert_eq!(seen[0].max_tokens, Some(1024));
        assert_eq!(seen[0].timeout_seconds, None);
    }

    #[tokio::test]
    async fn configured_timeout_reaches_the_request() {
        let provider = CannedProvider {
            reply: Some("ok".to_string()),
            seen: Mutex::new(Vec::new()),
        };
        let completion = CompletionConfig {
            timeout_seconds: Some(5),
            temperature: Some(0.1),
            ..CompletionConfig::default()
        };
        let settings = AnswerSettings::from_config(&completion, None);

        complete(&provider, &settings, "q", "ctx").await.expect("answer");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].timeout_seconds, Some(5));
        assert_eq!(seen[0].temperature, Some(0.1));
    }

    #[tokio::test]
    async fn remote_failure_becomes_displayable_error() {
        let provider = CannedProvider {
            reply: None,
            seen: Mutex::new(Vec::new()),
        };

        let err = complete(&provider, &AnswerSettings::default(), "q", "ctx")
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("Error querying completion service"));
        assert!(text.contains("401"));
    }

    #[tokio::test]
    async fn blank_answer_is_an_error() {
        let provider = CannedProvider {
            reply: Some("   ".to_string()),
            seen: Mutex::new(Vec::new()),
        };

        let err = complete(&provider, &AnswerSettings::default(), "q", "ctx")
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::EmptyAnswer));
    }
}
