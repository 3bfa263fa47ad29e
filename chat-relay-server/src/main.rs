mod completion;
mod config;
mod credentials;
mod error;
mod event_stream;
mod llm;
mod messages;
mod relay;
mod routes;
mod sse;
#[cfg(test)]
mod testing;

use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Settings, MODEL};
use llm::OpenAiProvider;
use routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    if settings.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; requests must supply apiKey");
    }
    match &settings.base_url {
        Some(base_url) => info!("Default provider endpoint: {}", base_url),
        None => info!("Default provider endpoint: OpenAI"),
    }
    info!("Using model: {}", MODEL);

    let addr = settings.addr();
    let state = AppState::new(settings, Arc::new(OpenAiProvider::new()));

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
