// Library exports for the glimpse OCR/tagging service

pub mod api;
pub mod core;
pub mod ingest;
pub mod pipeline;
pub mod services;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{ApiError, ConfigError, DecodeError, EngineError, FetchError, MimeError, PipelineError},
    types::{Frame, ImageBlob, LineResult, OcrResult, TagsResult, UrlContext},
};

pub use api::{router, AppState};
pub use ingest::{MimeClassifier, SafeFetcher};
pub use pipeline::{DedupTextMerger, OcrPipeline, TagPipeline};
pub use services::{Engines, OcrEngine, OcrLine, TagEngine};
