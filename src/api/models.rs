// Request and response DTOs for the HTTP surface

use serde::{Deserialize, Serialize};

use crate::core::types::LineResult;

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    /// Remote image URL (https; host must match the allowlist)
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct B64Request {
    /// Base64-encoded image bytes (no data: URL prefix)
    pub image_b64: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OcrQuery {
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Deserialize)]
pub struct TagsQuery {
    #[serde(default = "default_top_k")]
    pub top_k: i64,
}

impl Default for TagsQuery {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct OcrTimings {
    pub ocr: u64,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct OcrResponse {
    pub text: String,
    pub engine: String,
    pub confidence: Option<f32>,
    pub timings_ms: OcrTimings,
    /// Per-line detail, present only with verbose=true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<LineResult>>,
}

#[derive(Debug, Serialize)]
pub struct TagTimings {
    pub tagging: u64,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
    pub engine: String,
    pub timings_ms: TagTimings,
}
