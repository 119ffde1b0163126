// HTTP surface: router, shared state, and the small ingest helpers the
// handlers have in common.

pub mod models;
pub mod ocr;
pub mod tags;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tower_http::cors::{Any, CorsLayer};

use crate::core::config::Config;
use crate::core::errors::ApiError;
use crate::core::types::ImageBlob;
use crate::ingest::{MimeClassifier, SafeFetcher};
use crate::services::Engines;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: Arc<SafeFetcher>,
    pub classifier: Arc<MimeClassifier>,
    pub engines: Engines,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Body limit leaves headroom over the image cap for base64 + JSON
    let body_limit = state.config.ingest.max_image_bytes * 2;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ocr/bytes", post(ocr::ocr_bytes))
        .route("/ocr/url", post(ocr::ocr_url))
        .route("/ocr/b64", post(ocr::ocr_b64))
        .route("/tags/bytes", post(tags::tags_bytes))
        .route("/tags/url", post(tags::tags_url))
        .route("/tags/b64", post(tags::tags_b64))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "glimpse: image OCR and tagging" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Sniff and validate the MIME type, producing the blob the pipelines
/// consume. Size checks happen before this at each ingress point.
pub(crate) fn ingest_blob(state: &AppState, bytes: Vec<u8>) -> Result<ImageBlob, ApiError> {
    let mime = state.classifier.classify(&bytes)?;
    Ok(ImageBlob { bytes, mime })
}

/// Strict base64 decode (padding required, no whitespace).
pub(crate) fn decode_b64(encoded: &str) -> Result<Vec<u8>, ApiError> {
    BASE64
        .decode(encoded.as_bytes())
        .map_err(|_| ApiError::InvalidBase64)
}
