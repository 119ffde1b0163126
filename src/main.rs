// Main entry point for the glimpse OCR/tagging service

use std::sync::Arc;

use anyhow::Result;
use glimpse::{
    api::{self, AppState},
    core::Config,
    ingest::{MimeClassifier, SafeFetcher},
    services::{self, Engines},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new()?);

    // Initialize logging; ort is noisy at its default level
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!("glimpse={},ort=off", config.server.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Config: max_image_bytes={} fetch_timeout={}s allowed_mime={:?}",
        config.ingest.max_image_bytes,
        config.ingest.fetch_timeout_secs,
        config.ingest.allowed_mime_types
    );

    let fetcher = Arc::new(SafeFetcher::new(&config)?);
    let classifier = Arc::new(MimeClassifier::new(&config.ingest.allowed_mime_types));

    // Load models before accepting traffic; failures fall back to lazy
    // per-request initialization.
    if config.server.warmup_on_start {
        info!("Warming up inference engines...");
        let warmup_config = config.clone();
        tokio::task::spawn_blocking(move || services::warmup(&warmup_config)).await?;
    }

    let state = AppState {
        config: config.clone(),
        fetcher,
        classifier,
        engines: Engines::lazy(),
    };

    let app = api::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /           - Root");
    info!("  GET  /health     - Health check");
    info!("  POST /ocr/bytes  - OCR raw image bytes (?verbose)");
    info!("  POST /ocr/url    - OCR a remote image URL");
    info!("  POST /ocr/b64    - OCR base64 image bytes");
    info!("  POST /tags/bytes - Tag raw image bytes (?top_k)");
    info!("  POST /tags/url   - Tag a remote image URL");
    info!("  POST /tags/b64   - Tag base64 image bytes");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
