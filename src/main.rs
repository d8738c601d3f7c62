use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use photo_lens::api;
use photo_lens::config::Config;
use photo_lens::index::VectorIndex;
use photo_lens::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        "embedding provider: {} ({}), dimension {}",
        config.embedding.provider,
        config.embedding.base_url,
        config.embedding.dimension
    );

    let state = AppState::new(config.clone())?;

    // Provision the collection schema before taking traffic; a dimension
    // mismatch triggers a destructive recreate, which is only safe here.
    if let Err(e) = state.index.ensure_collection(config.embedding.dimension).await {
        tracing::error!("collection provisioning failed, continuing degraded: {e:#}");
    }

    let app = Router::new()
        .route("/images", post(api::images::upload_images))
        .route("/images/{id}", get(api::images::serve_image))
        .route("/search", post(api::search::search))
        .route("/health", get(api::health::health))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
