// Error types for the OCR/tagging service
//
// Using thiserror for ergonomic error definitions with:
// - Type-safe error matching per domain
// - Automatic Display/Error trait implementations
// - A single IntoResponse mapping at the HTTP boundary

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::core::types::UrlContext;

/// Remote fetch errors. Validation variants carry which pass rejected the
/// URL (initial vs post-redirect) for the error message.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0} is invalid")]
    InvalidUrl(UrlContext),

    #[error("{0} must be http(s)")]
    BadScheme(UrlContext),

    #[error("{0} must use https (http allowed for localhost)")]
    InsecureScheme(UrlContext),

    #[error("{0} host is not allowed")]
    HostNotAllowed(UrlContext),

    /// Operator misconfiguration, not a client error.
    #[error("server misconfigured: invalid image_url_host_regex")]
    BadHostPattern,

    #[error("image_url returned {0}")]
    UpstreamStatus(u16),

    #[error("image_url image too large")]
    PayloadTooLarge,

    #[error("image_url returned empty body")]
    EmptyBody,

    #[error("timed out fetching image_url")]
    Timeout,

    #[error("failed to fetch image_url")]
    Transport,
}

/// MIME classification errors. Sniffer failures of any kind are folded
/// into `Unidentifiable`; they never surface raw.
#[derive(Debug, Error)]
pub enum MimeError {
    #[error("unable to detect image mime type")]
    Unidentifiable,

    #[error("unsupported image type: {0}")]
    Unsupported(String),
}

/// Image decoding failure. Fatal to the request, never retried.
#[derive(Debug, Error)]
#[error("failed to decode image: {0}")]
pub struct DecodeError(#[from] image::ImageError);

/// Engine initialization or inference failure. Fatal to the request; the
/// process and the engine singleton survive.
#[derive(Debug, Error)]
#[error("inference failed: {0}")]
pub struct EngineError(#[from] anyhow::Error);

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("min line confidence must be in [0.0, 1.0], got {0}")]
    InvalidConfidenceFloor(f32),

    #[error("tag score threshold must be in [0.0, 1.0], got {0}")]
    InvalidTagThreshold(f32),

    #[error("max_image_bytes must be > 0")]
    InvalidMaxImageBytes,

    #[error("fetch_timeout_secs must be > 0")]
    InvalidFetchTimeout,

    #[error("allowed_mime_types must not be empty")]
    EmptyMimeAllowlist,

    #[error("detection input size must be between 320 and 2048, got {0}")]
    InvalidDetSize(u32),

    #[error("tag image size must be between 64 and 2048, got {0}")]
    InvalidTagImageSize(u32),
}

/// Pipeline failures (decode or inference)
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Request-level error. Every handler returns `Result<_, ApiError>` and
/// the status mapping lives in one place.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("empty {0}")]
    EmptyInput(&'static str),

    #[error("image too large")]
    TooLarge,

    #[error("invalid image_b64")]
    InvalidBase64,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Mime(#[from] MimeError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::EmptyInput(_) | ApiError::InvalidBase64 => StatusCode::BAD_REQUEST,
            ApiError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Mime(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Fetch(FetchError::PayloadTooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Fetch(FetchError::BadHostPattern) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Fetch(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::Decode(_)) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::Engine(_)) | ApiError::Engine(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
