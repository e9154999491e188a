use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::extraction::{ArticleExtractor, ExtractionError};
use crate::llm::answer::{self, AnswerSettings};
use crate::llm::LlmProvider;

/// Shown when a question arrives before any article was loaded.
pub const NO_DOCUMENTS_MESSAGE: &str = "Please load at least one article first";

/// Separates documents inside the combined context.
pub const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// ChatMessage represents a single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Set on assistant messages that carry a completion failure
    #[serde(default)]
    pub error: bool,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>, error: bool) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
            error,
        }
    }
}

/// Article text loaded into a session, keyed by its source URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedDocument {
    pub url: String,
    pub text: String,
    pub loaded_at: DateTime<Utc>,
}

/// Genre-browser state the UI renders alongside the chat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowseState {
    pub selected_genre: Option<String>,
    pub expanded_article: Option<String>,
    pub location: String,
}

#[derive(Debug, Error)]
pub enum AskError {
    #[error("{}", NO_DOCUMENTS_MESSAGE)]
    NoDocuments,
    #[error("question is empty")]
    EmptyQuestion,
}

/// Session represents one user's research workspace
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
    documents: Vec<LoadedDocument>,
    transcript: Vec<ChatMessage>,
    browse: BrowseState,
}

/// Snapshot of a session returned by every command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub documents: Vec<DocumentInfo>,
    pub transcript: Vec<ChatMessage>,
    pub browse: BrowseState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub url: String,
    pub chars: usize,
    pub loaded_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_active: now,
            documents: Vec::new(),
            transcript: Vec::new(),
            browse: BrowseState::default(),
        }
    }

    pub fn with_location(location: impl Into<String>) -> Self {
        let mut session = Self::new();
        session.browse.location = location.into();
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    /// Mark the session as in use, postponing idle eviction.
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn documents(&self) -> &[LoadedDocument] {
        &self.documents
    }

    pub fn document(&self, url: &str) -> Option<&LoadedDocument> {
        self.documents.iter().find(|d| d.url == url)
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn browse(&self) -> &BrowseState {
        &self.browse
    }

    /// Store the outcome of an extraction. Failures are handed back untouched
    /// and nothing is stored; a re-load keeps the document's position.
    pub fn load_document(
        &mut self,
        url: &str,
        extracted: Result<String, ExtractionError>,
    ) -> Result<&LoadedDocument, ExtractionError> {
        let text = extracted?;
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyContent(url.to_string()));
        }

        let document = LoadedDocument {
            url: url.to_string(),
            text,
            loaded_at: Utc::now(),
        };

        let idx = match self.documents.iter().position(|d| d.url == url) {
            Some(idx) => {
                self.documents[idx] = document;
                idx
            }
            None => {
                self.documents.push(document);
                self.documents.len() - 1
            }
        };

        info!("session {}: loaded {} ({} documents)", self.id, url, self.documents.len());
        Ok(&self.documents[idx])
    }

    /// Run `extractor` on `url` and store the result.
    pub async fn load(
        &mut self,
        extractor: &dyn ArticleExtractor,
        url: &str,
    ) -> Result<&LoadedDocument, ExtractionError> {
        let url = url.trim();
        let extracted = extractor.extract(url).await;
        self.load_document(url, extracted)
    }

    /// Returns whether a document was removed.
    pub fn delete_document(&mut self, url: &str) -> bool {
        let before = self.documents.len();
        self.documents.retain(|d| d.url != url);
        self.documents.len() != before
    }

    pub fn clear_all(&mut self) {
        self.documents.clear();
        self.transcript.clear();
        info!("session {}: cleared", self.id);
    }

    /// Concatenate every loaded document, in load order, under a header naming
    /// its source. With a budget the document crossing it is cut and any
    /// later documents are left out.
    pub fn combined_context(&self, max_chars: Option<usize>) -> String {
        let mut context = String::new();
        let mut used = 0usize;

        for (i, document) in self.documents.iter().enumerate() {
            let mut section = String::new();
            if i > 0 {
                section.push_str(DOCUMENT_SEPARATOR);
            }
            section.push_str(&format!("Article from {}:\n{}", document.url, document.text));

            let Some(limit) = max_chars else {
                context.push_str(&section);
                continue;
            };

            let section_chars = section.chars().count();
            if used + section_chars <= limit {
                context.push_str(&section);
                used += section_chars;
                continue;
            }

            let remaining = limit - used;
            context.extend(section.chars().take(remaining));
            let omitted = self.documents.len() - i - 1;
            warn!(
                "session {}: context budget of {} chars reached at {}, {} later document(s) omitted",
                self.id, limit, document.url, omitted
            );
            break;
        }

        context
    }

    /// Answer `question` from the loaded documents. The user message is
    /// recorded before the remote call; a completion failure is recorded as
    /// the assistant's reply with `error` set.
    pub async fn ask(
        &mut self,
        provider: &dyn LlmProvider,
        settings: &AnswerSettings,
        question: &str,
    ) -> Result<&ChatMessage, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }
        if self.documents.is_empty() {
            return Err(AskError::NoDocuments);
        }

        let context = self.combined_context(settings.max_context_chars);
        self.transcript.push(ChatMessage::new(Role::User, question, false));

        let reply = match answer::complete(provider, settings, question, &context).await {
            Ok(text) => ChatMessage::new(Role::Assistant, text, false),
            Err(e) => ChatMessage::new(Role::Assistant, e.to_string(), true),
        };
        self.transcript.push(reply);

        Ok(&self.transcript[self.transcript.len() - 1])
    }

    pub fn select_genre(&mut self, label: impl Into<String>) {
        self.browse.selected_genre = Some(label.into());
        self.browse.expanded_article = None;
    }

    /// Expand `url`, or collapse it when it is already expanded.
    /// Returns whether it is expanded afterwards.
    pub fn toggle_expanded(&mut self, url: &str) -> bool {
        if self.browse.expanded_article.as_deref() == Some(url) {
            self.browse.expanded_article = None;
            false
        } else {
            self.browse.expanded_article = Some(url.to_string());
            true
        }
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.browse.location = location.into().trim().to_string();
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            created_at: self.created_at,
            last_active: self.last_active,
            documents: self
                .documents
                .iter()
                .map(|d| DocumentInfo {
                    url: d.url.clone(),
                    chars: d.text.chars().count(),
                    loaded_at: d.loaded_at,
                })
                .collect(),
            transcript: self.transcript.clone(),
            browse: self.browse.clone(),
        }
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

/// In-memory sessions. Each session has its own lock so a slow remote call
/// only blocks the session that issued it.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
    default_location: String,
}

impl SessionStore {
    pub fn new(default_location: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_location: default_location.into(),
        }
    }

    pub async fn create(&self) -> SharedSession {
        let session = Session::with_location(self.default_location.clone());
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, shared.clone());
        info!("session {} created", id);
        shared
    }

    /// Look a session up and mark it active.
    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        let shared = self.sessions.read().await.get(&id).cloned()?;
        shared.lock().await.touch();
        Some(shared)
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!("session {} removed", id);
        }
        removed
    }

    /// Drop sessions idle for longer than `max_idle`. A session whose lock is
    /// held is in use and always kept. Returns how many were dropped.
    pub async fn evict_idle(&self, max_idle: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|id, shared| match shared.try_lock() {
            Ok(session) if session.last_active < cutoff => {
                info!("session {} evicted after inactivity", id);
                false
            }
            _ => true,
        });

        before - sessions.len()
    }

    /// Background sweep running `evict_idle` every `every` until the runtime stops.
    pub fn spawn_eviction(
        self: Arc<Self>,
        max_idle: chrono::Duration,
        every: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle(max_idle).await;
                if evicted > 0 {
                    info!("evicted {} idle session(s), {} remaining", evicted, self.len().await);
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

pub mod websocket;
