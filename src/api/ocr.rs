// OCR endpoints: raw bytes, remote URL, base64

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use tracing::info;

use crate::api::models::{B64Request, OcrQuery, OcrResponse, OcrTimings, UrlRequest};
use crate::api::{decode_b64, ingest_blob, AppState};
use crate::core::errors::ApiError;
use crate::core::types::ImageBlob;
use crate::pipeline::OcrPipeline;

pub async fn ocr_bytes(
    State(state): State<AppState>,
    Query(query): Query<OcrQuery>,
    body: Bytes,
) -> Result<Json<OcrResponse>, ApiError> {
    let start = Instant::now();

    if body.is_empty() {
        return Err(ApiError::EmptyInput("body"));
    }
    if body.len() > state.config.ingest.max_image_bytes {
        return Err(ApiError::TooLarge);
    }

    let blob = ingest_blob(&state, body.to_vec())?;
    run_ocr(state, blob, query.verbose, start).await
}

pub async fn ocr_url(
    State(state): State<AppState>,
    Query(query): Query<OcrQuery>,
    Json(payload): Json<UrlRequest>,
) -> Result<Json<OcrResponse>, ApiError> {
    let start = Instant::now();

    let bytes = state.fetcher.fetch(&payload.image_url).await?;
    let blob = ingest_blob(&state, bytes)?;
    run_ocr(state, blob, query.verbose, start).await
}

pub async fn ocr_b64(
    State(state): State<AppState>,
    Query(query): Query<OcrQuery>,
    Json(payload): Json<B64Request>,
) -> Result<Json<OcrResponse>, ApiError> {
    let start = Instant::now();

    let bytes = decode_b64(&payload.image_b64)?;
    if bytes.is_empty() {
        return Err(ApiError::EmptyInput("image_b64"));
    }
    if bytes.len() > state.config.ingest.max_image_bytes {
        return Err(ApiError::TooLarge);
    }

    let blob = ingest_blob(&state, bytes)?;
    run_ocr(state, blob, query.verbose, start).await
}

/// Shared tail of the three ingestion variants: resolve the engine and
/// run the pipeline off the async runtime.
async fn run_ocr(
    state: AppState,
    blob: ImageBlob,
    verbose: bool,
    start: Instant,
) -> Result<Json<OcrResponse>, ApiError> {
    let engine = state.engines.ocr(&state.config)?;
    let min_line_confidence = state.config.ocr.min_line_confidence;

    let result = tokio::task::spawn_blocking(move || {
        OcrPipeline::new(engine, min_line_confidence).run(&blob)
    })
    .await
    .map_err(|e| ApiError::Engine(anyhow::anyhow!("OCR task failed: {e}").into()))??;

    info!(
        "ocr done: {} chars, {} lines, {}ms",
        result.text.len(),
        result.lines.len(),
        result.elapsed_ms
    );

    Ok(Json(OcrResponse {
        text: result.text,
        engine: result.engine,
        confidence: result.confidence,
        timings_ms: OcrTimings {
            ocr: result.elapsed_ms,
            total: start.elapsed().as_millis() as u64,
        },
        lines: verbose.then_some(result.lines),
    }))
}
