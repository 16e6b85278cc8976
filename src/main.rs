//! Convoflow server binary.
//!
//! Loads configuration and the flow catalog, wires the turn pipeline to
//! its collaborators, and serves the turn API over HTTP.

use std::sync::Arc;
use std::time::Duration;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use convoflow::adapters::ai::{GeminiConfig, GeminiExtractor};
use convoflow::adapters::http::{turn_router, TurnAppState};
use convoflow::adapters::reference::HttpReferenceClient;
use convoflow::adapters::script::RhaiScriptEngine;
use convoflow::adapters::storage::RedisSessionStore;
use convoflow::application::TurnService;
use convoflow::config::AppConfig;
use convoflow::domain::catalog::FlowCatalog;
use convoflow::domain::dialogue::TurnOrchestrator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .init();

    let catalog = Arc::new(FlowCatalog::load(config.catalog.dir())?);
    tracing::info!(dir = %config.catalog.dir().display(), "flow catalog loaded");

    let store = Arc::new(RedisSessionStore::new(&config.redis.url)?);

    // validate() already guarantees the key is present.
    let api_key = config.ai.gemini_api_key.clone().unwrap_or_default();
    let extractor = Arc::new(GeminiExtractor::new(
        GeminiConfig::new(api_key)
            .with_model(config.ai.model.clone())
            .with_base_url(config.ai.base_url.clone())
            .with_timeout(config.ai.timeout())
            .with_max_output_tokens(config.ai.max_output_tokens),
    ));

    let reference = Arc::new(HttpReferenceClient::new(Duration::from_secs(
        config.server.request_timeout_secs,
    )));
    let scripts = Arc::new(RhaiScriptEngine::new());

    let orchestrator = TurnOrchestrator::new(
        catalog,
        store,
        reference,
        scripts,
        extractor,
        Duration::from_secs(config.redis.session_ttl_secs),
    );
    let service = Arc::new(TurnService::new(orchestrator));

    let app = turn_router()
        .with_state(TurnAppState::new(service))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr();
    tracing::info!(%addr, "convoflow listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
