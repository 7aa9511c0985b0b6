use std::{net::SocketAddr, sync::Arc};

use comic_studio::{
    routes::{router, AppState},
    store::PreferenceStore,
    AppConfig, ComicStudio, GeminiClient,
};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        "Using model {} at {} (env API key: {})",
        config.image_model,
        config.api_base,
        if config.api_key.is_some() { "set" } else { "not set" }
    );

    let store = match &config.store_path {
        Some(path) => PreferenceStore::open(path)?,
        None => PreferenceStore::in_memory(),
    };
    let generator = Arc::new(GeminiClient::new(config.api_base.clone(), config.image_model.clone()));
    let studio = ComicStudio::new(generator, store, config.studio, config.api_key.clone());
    let app = router(AppState { studio: Arc::new(studio) });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("👋 Shutting down");
}
