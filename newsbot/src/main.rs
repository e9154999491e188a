/*
newsbot - single-binary main.rs
This binary loads the configuration, wires the article extractor, the completion
provider and the optional news client, then serves the HTTP API.
*/

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use newsbot::extraction::HttpExtractor;
use newsbot::llm::answer::AnswerSettings;
use newsbot::llm::remote::RemoteLlmProvider;
use newsbot::news::{GenreCatalog, NewsApiClient, NewsSource};
use newsbot::server::{self, AppState};
use newsbot::sessions::SessionStore;

#[derive(Parser, Debug)]
#[command(name = "newsbot", about = "NEWSBot news research assistant server")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    // Load configuration with defaults
    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(default_path.as_path()) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let state = build_state(&config)?;

    if let Some(minutes) = config.server_or_default().session_idle_minutes() {
        info!("Idle sessions expire after {} minutes", minutes);
        state.sessions.clone().spawn_eviction(
            chrono::Duration::minutes(minutes as i64),
            Duration::from_secs(60),
        );
    }

    info!("Launching Rocket HTTP server");
    if let Err(e) = server::launch_rocket(state, config.server.as_ref()).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wire providers from configuration. The completion key is mandatory; the
/// news key only enables genre browsing.
fn build_state(config: &Config) -> Result<AppState> {
    let provider = RemoteLlmProvider::from_config(&config.completion)
        .context("the completion service is required to answer questions")?;
    let model = provider.model().to_string();
    info!("Completion provider initialized: {} at {}", model, config.completion.api_url());

    let extractor = HttpExtractor::new(&config.extraction)?;

    let news_config = config.news_or_default();
    let news: Option<Arc<dyn NewsSource>> = match NewsApiClient::from_env(&news_config)? {
        Some(client) => {
            info!("News search initialized at {}", news_config.api_url());
            Some(Arc::new(client))
        }
        None => {
            warn!(
                "News API key env var '{}' not set: genre browsing disabled",
                news_config.api_key_env()
            );
            None
        }
    };

    let default_location = news_config.default_location.clone().unwrap_or_default();

    Ok(AppState {
        started_at: Utc::now(),
        sessions: Arc::new(SessionStore::new(default_location)),
        extractor: Arc::new(extractor),
        llm_provider: Arc::new(provider),
        news,
        genres: Arc::new(GenreCatalog::default()),
        answer_settings: AnswerSettings::from_config(
            &config.completion,
            config.context.max_combined_chars(),
        ),
        model,
    })
}
