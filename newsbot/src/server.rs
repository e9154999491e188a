use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::figment::{Figment, Provider};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put, routes, Build, Rocket, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::ServerConfig;

use crate::extraction::ArticleExtractor;
use crate::llm::answer::AnswerSettings;
use crate::llm::LlmProvider;
use crate::news::{self, ArticleSummary, GenreCatalog, GenreError, NewsSource};
use crate::sessions::{AskError, ChatMessage, SessionStore, SessionView, SharedSession};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub sessions: Arc<SessionStore>,
    pub extractor: Arc<dyn ArticleExtractor>,
    pub llm_provider: Arc<dyn LlmProvider>,
    /// `None` when no news API key is configured
    pub news: Option<Arc<dyn NewsSource>>,
    pub genres: Arc<GenreCatalog>,
    pub answer_settings: AnswerSettings,
    /// Completion model name, reported by `/api/v1/status`
    pub model: String,
}

/// Error body returned alongside a non-2xx status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (Status, Json<ErrorBody>);

fn api_error(status: Status, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: message.into() }))
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    sessions: usize,
    model: String,
    news_enabled: bool,
}

#[derive(Deserialize)]
struct LoadRequest {
    url: String,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize, Deserialize)]
pub struct AskResponse {
    pub reply: ChatMessage,
    pub session: SessionView,
}

#[derive(Deserialize)]
struct LocationRequest {
    location: String,
}

#[derive(Deserialize)]
struct ExpandRequest {
    url: String,
}

#[derive(Serialize, Deserialize)]
pub struct GenreNewsResponse {
    pub genre: String,
    pub keyword: String,
    pub articles: Vec<ArticleSummary>,
    /// Set when the search produced nothing to show
    pub notice: Option<String>,
}

async fn session_or_404(state: &AppState, id: Uuid) -> Result<SharedSession, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| api_error(Status::NotFound, format!("unknown session {}", id)))
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Status endpoint returning uptime and basic wiring info.
#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();

    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        sessions: state.sessions.len().await,
        model: state.model.clone(),
        news_enabled: state.news.is_some(),
    })
}

#[post("/api/v1/sessions")]
async fn create_session(state: &State<AppState>) -> (Status, Json<SessionView>) {
    let session = state.sessions.create().await;
    let view = session.lock().await.view();
    (Status::Created, Json(view))
}

#[get("/api/v1/sessions/<id>")]
async fn get_session(state: &State<AppState>, id: Uuid) -> Result<Json<SessionView>, ApiError> {
    let session = session_or_404(state, id).await?;
    let view = session.lock().await.view();
    Ok(Json(view))
}

#[delete("/api/v1/sessions/<id>")]
async fn delete_session(state: &State<AppState>, id: Uuid) -> Status {
    if state.sessions.remove(id).await {
        Status::NoContent
    } else {
        Status::NotFound
    }
}

/// Extract an article and add it to the session's documents.
#[post("/api/v1/sessions/<id>/documents", data = "<body>")]
async fn load_document(
    state: &State<AppState>,
    id: Uuid,
    body: Json<LoadRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let url = body.url.trim();
    if url.is_empty() {
        return Err(api_error(Status::BadRequest, "Please enter a URL"));
    }

    let session = session_or_404(state, id).await?;
    let mut session = session.lock().await;
    if let Err(e) = session.load(state.extractor.as_ref(), url).await {
        tracing::warn!("session {}: could not load {}: {}", id, url, e);
        return Err(api_error(
            Status::UnprocessableEntity,
            format!("Error extracting content: {}", e),
        ));
    }

    Ok(Json(session.view()))
}

#[delete("/api/v1/sessions/<id>/documents?<url>")]
async fn delete_document(
    state: &State<AppState>,
    id: Uuid,
    url: &str,
) -> Result<Json<SessionView>, ApiError> {
    let session = session_or_404(state, id).await?;
    let mut session = session.lock().await;
    session.delete_document(url);
    Ok(Json(session.view()))
}

/// Drop every document and the whole transcript.
#[post("/api/v1/sessions/<id>/clear")]
async fn clear_session(state: &State<AppState>, id: Uuid) -> Result<Json<SessionView>, ApiError> {
    let session = session_or_404(state, id).await?;
    let mut session = session.lock().await;
    session.clear_all();
    Ok(Json(session.view()))
}

#[post("/api/v1/sessions/<id>/ask", data = "<body>")]
async fn ask(
    state: &State<AppState>,
    id: Uuid,
    body: Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let session = session_or_404(state, id).await?;
    let mut session = session.lock().await;

    let outcome = session
        .ask(state.llm_provider.as_ref(), &state.answer_settings, &body.question)
        .await
        .map(|reply| reply.clone());

    match outcome {
        Ok(reply) => Ok(Json(AskResponse {
            reply,
            session: session.view(),
        })),
        Err(e @ AskError::NoDocuments) => Err(api_error(Status::Conflict, e.to_string())),
        Err(e @ AskError::EmptyQuestion) => Err(api_error(Status::BadRequest, e.to_string())),
    }
}

#[put("/api/v1/sessions/<id>/location", data = "<body>")]
async fn set_location(
    state: &State<AppState>,
    id: Uuid,
    body: Json<LocationRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let session = session_or_404(state, id).await?;
    let mut session = session.lock().await;
    session.set_location(body.location.as_str());
    Ok(Json(session.view()))
}

#[post("/api/v1/sessions/<id>/expanded", data = "<body>")]
async fn toggle_expanded(
    state: &State<AppState>,
    id: Uuid,
    body: Json<ExpandRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let session = session_or_404(state, id).await?;
    let mut session = session.lock().await;
    session.toggle_expanded(&body.url);
    Ok(Json(session.view()))
}

#[get("/api/v1/genres")]
async fn list_genres(state: &State<AppState>) -> Json<Vec<&'static str>> {
    Json(state.genres.labels())
}

/// Select a genre for the session and fetch its latest headlines.
#[get("/api/v1/sessions/<id>/news?<genre>")]
async fn genre_news(
    state: &State<AppState>,
    id: Uuid,
    genre: &str,
) -> Result<Json<GenreNewsResponse>, ApiError> {
    let Some(source) = state.news.clone() else {
        return Err(api_error(
            Status::ServiceUnavailable,
            "news search is not configured",
        ));
    };

    let session = session_or_404(state, id).await?;
    let (label, keyword) = {
        let mut session = session.lock().await;
        let keyword = state
            .genres
            .resolve(genre, &session.browse().location)
            .map_err(|e| match e {
                GenreError::Unknown(_) => api_error(Status::NotFound, e.to_string()),
                GenreError::MissingLocation => api_error(Status::BadRequest, e.to_string()),
            })?;
        let label = state
            .genres
            .get(genre)
            .map(|g| g.label.to_string())
            .unwrap_or_else(|| genre.to_string());
        session.select_genre(label.clone());
        (label, keyword)
    };

    let articles = news::fetch_by_genre(source.as_ref(), &keyword).await;
    let notice = articles
        .is_empty()
        .then(|| "No articles found for this category.".to_string());

    Ok(Json(GenreNewsResponse {
        genre: label,
        keyword,
        articles,
        notice,
    }))
}

/// Rocket figment with `[server]` bind/port merged in.
pub fn figment(server: Option<&ServerConfig>) -> Figment {
    let mut fig = rocket::Config::figment();
    if let Some(server) = server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }
    fig
}

/// Build the Rocket instance with managed state and all routes mounted.
pub fn build_rocket<T: Provider>(state: AppState, provider: T) -> Rocket<Build> {
    rocket::custom(provider)
        .manage(state)
        .mount(
            "/",
            routes![
                health,
                status,
                create_session,
                get_session,
                delete_session,
                load_document,
                delete_document,
                clear_session,
                ask,
                set_location,
                toggle_expanded,
                list_genres,
                genre_news,
            ],
        )
        .mount("/ws", routes![crate::sessions::websocket::chat_websocket])
}

/// Build and launch a Rocket server.
///
/// This function blocks until the Rocket server shuts down (it awaits `rocket.launch().await`)
/// and returns an error if Rocket fails to start.
pub async fn launch_rocket(state: AppState, server: Option<&ServerConfig>) -> Result<()> {
    let rocket = build_rocket(state, figment(server));

    tracing::info!("Starting Rocket HTTP server");
    rocket
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
