// Tagging endpoints: raw bytes, remote URL, base64

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use tracing::info;

use crate::api::models::{B64Request, TagTimings, TagsQuery, TagsResponse, UrlRequest};
use crate::api::{decode_b64, ingest_blob, AppState};
use crate::core::errors::ApiError;
use crate::core::types::ImageBlob;
use crate::pipeline::TagPipeline;

pub async fn tags_bytes(
    State(state): State<AppState>,
    Query(query): Query<TagsQuery>,
    body: Bytes,
) -> Result<Json<TagsResponse>, ApiError> {
    let start = Instant::now();

    if body.is_empty() {
        return Err(ApiError::EmptyInput("body"));
    }
    if body.len() > state.config.ingest.max_image_bytes {
        return Err(ApiError::TooLarge);
    }

    let blob = ingest_blob(&state, body.to_vec())?;
    run_tags(state, blob, query.top_k, start).await
}

pub async fn tags_url(
    State(state): State<AppState>,
    Query(query): Query<TagsQuery>,
    Json(payload): Json<UrlRequest>,
) -> Result<Json<TagsResponse>, ApiError> {
    let start = Instant::now();

    let bytes = state.fetcher.fetch(&payload.image_url).await?;
    let blob = ingest_blob(&state, bytes)?;
    run_tags(state, blob, query.top_k, start).await
}

pub async fn tags_b64(
    State(state): State<AppState>,
    Query(query): Query<TagsQuery>,
    Json(payload): Json<B64Request>,
) -> Result<Json<TagsResponse>, ApiError> {
    let start = Instant::now();

    let bytes = decode_b64(&payload.image_b64)?;
    if bytes.is_empty() {
        return Err(ApiError::EmptyInput("image_b64"));
    }
    if bytes.len() > state.config.ingest.max_image_bytes {
        return Err(ApiError::TooLarge);
    }

    let blob = ingest_blob(&state, bytes)?;
    run_tags(state, blob, query.top_k, start).await
}

async fn run_tags(
    state: AppState,
    blob: ImageBlob,
    top_k: i64,
    start: Instant,
) -> Result<Json<TagsResponse>, ApiError> {
    let engine = state.engines.tags(&state.config)?;

    let result =
        tokio::task::spawn_blocking(move || TagPipeline::new(engine).run(&blob, top_k))
            .await
            .map_err(|e| ApiError::Engine(anyhow::anyhow!("tagging task failed: {e}").into()))??;

    info!("tagging done: {} tags, {}ms", result.tags.len(), result.elapsed_ms);

    Ok(Json(TagsResponse {
        tags: result.tags,
        engine: result.engine,
        timings_ms: TagTimings {
            tagging: result.elapsed_ms,
            total: start.elapsed().as_millis() as u64,
        },
    }))
}
