// Shared data types flowing between ingest, pipelines and handlers

use std::fmt;

use image::RgbImage;
use serde::Serialize;

/// Validated image bytes plus the MIME type detected at ingress.
/// Constructed once per request after the size and allowlist checks;
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// One decoded RGB raster from a still or animated source.
/// `index` is the 0-based sequence position, not a timestamp.
pub struct Frame {
    pub index: usize,
    pub pixels: RgbImage,
}

/// A single recognized text region
#[derive(Debug, Clone, Serialize)]
pub struct LineResult {
    pub text: String,
    pub confidence: Option<f32>,
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    /// Source frame for multi-frame inputs; absent for stills
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<usize>,
}

/// Aggregated OCR output for one request
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub text: String,
    pub confidence: Option<f32>,
    pub lines: Vec<LineResult>,
    pub engine: String,
    pub elapsed_ms: u64,
}

/// Aggregated tagging output for one request
#[derive(Debug, Clone)]
pub struct TagsResult {
    pub tags: Vec<String>,
    pub engine: String,
    pub elapsed_ms: u64,
}

/// Which validation pass rejected a fetch URL. The same checks run twice:
/// on the original URL and on the effective URL after redirects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlContext {
    Initial,
    Redirected,
}

impl fmt::Display for UrlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlContext::Initial => write!(f, "image_url"),
            UrlContext::Redirected => write!(f, "image_url (final)"),
        }
    }
}
