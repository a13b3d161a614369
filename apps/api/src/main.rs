mod config;
mod errors;
mod interview;
mod llm_client;
mod preferences;
mod reveal;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::interview::workflow::{spawn_idle_sweep, InterviewWorkflow};
use crate::llm_client::GeminiClient;
use crate::preferences::ThemeStore;
use crate::reveal::RevealRegistry;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Coach API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize generation client
    let llm = GeminiClient::new(
        &config.gemini_base_url,
        &config.gemini_model,
        config.gemini_api_key.clone(),
    );
    info!("LLM client initialized ({})", llm.endpoint());

    // Reveal cadence
    let reveals = RevealRegistry::new(Duration::from_millis(config.reveal_tick_ms));
    info!("Reveal tick: {}ms", config.reveal_tick_ms);

    // Theme preference, resolved once at startup
    let themes = Arc::new(ThemeStore::new(&config.theme_store_path));
    themes.initialize(config.prefers_dark).await?;
    info!("Theme store at {}", themes.path().display());

    let state = AppState {
        interview: InterviewWorkflow::new(Arc::new(llm), reveals),
        themes,
        config: config.clone(),
    };

    // Idle interview eviction
    let ttl = chrono::Duration::from_std(Duration::from_secs(config.session_ttl_secs))?;
    spawn_idle_sweep(
        state.interview.clone(),
        ttl,
        Duration::from_secs(config.session_sweep_secs.max(1)),
    );
    info!("Evicting interviews idle for {}s", config.session_ttl_secs);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the front end has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
