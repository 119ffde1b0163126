// Inference engine seams and process-wide singletons
//
// The two engines are lazily initialized exactly once via OnceCell's
// get_or_try_init: the first caller blocks while the model loads,
// concurrent callers wait on the same init, and a failed init leaves the
// cell unset so the next request retries from scratch.

pub mod ocr_engine;
pub mod tag_engine;

use std::sync::Arc;

use image::RgbImage;
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::core::config::Config;
use crate::core::errors::EngineError;

pub use ocr_engine::OnnxOcrEngine;
pub use tag_engine::OnnxTagEngine;

/// One recognized text region as the OCR engine reports it, before the
/// pipeline applies its confidence floor.
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    pub confidence: Option<f32>,
    pub bbox: [f32; 4],
}

/// Text recognition over a single RGB frame
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    fn recognize(&self, frame: &RgbImage) -> Result<Vec<OcrLine>, EngineError>;
}

/// Tag prediction over a single RGB frame
pub trait TagEngine: Send + Sync {
    fn name(&self) -> &str;
    fn tag(&self, frame: &RgbImage) -> Result<Vec<String>, EngineError>;
}

static OCR_ENGINE: OnceCell<Arc<OnnxOcrEngine>> = OnceCell::new();
static TAG_ENGINE: OnceCell<Arc<OnnxTagEngine>> = OnceCell::new();

/// Get or initialize the global OCR engine
pub fn get_ocr_engine(config: &Config) -> Result<Arc<OnnxOcrEngine>, EngineError> {
    OCR_ENGINE
        .get_or_try_init(|| {
            info!("Initializing OCR engine");
            OnnxOcrEngine::new(&config.ocr).map(Arc::new)
        })
        .map(Arc::clone)
        .map_err(EngineError::from)
}

/// Get or initialize the global tagging engine
pub fn get_tag_engine(config: &Config) -> Result<Arc<OnnxTagEngine>, EngineError> {
    TAG_ENGINE
        .get_or_try_init(|| {
            info!("Initializing tagging engine");
            OnnxTagEngine::new(&config.tags).map(Arc::new)
        })
        .map(Arc::clone)
        .map_err(EngineError::from)
}

/// Engine handles carried in application state. The default resolves the
/// lazy ONNX singletons; `fixed` injects arbitrary implementations, which
/// integration tests use to run the HTTP surface without model files.
#[derive(Clone, Default)]
pub struct Engines {
    ocr: Option<Arc<dyn OcrEngine>>,
    tags: Option<Arc<dyn TagEngine>>,
}

impl Engines {
    /// Lazily resolve the process-wide ONNX engines on first use
    pub fn lazy() -> Self {
        Self::default()
    }

    /// Use the given engine instances instead of the singletons
    pub fn fixed(ocr: Arc<dyn OcrEngine>, tags: Arc<dyn TagEngine>) -> Self {
        Self {
            ocr: Some(ocr),
            tags: Some(tags),
        }
    }

    pub fn ocr(&self, config: &Config) -> Result<Arc<dyn OcrEngine>, EngineError> {
        match &self.ocr {
            Some(engine) => Ok(Arc::clone(engine)),
            None => get_ocr_engine(config).map(|e| e as Arc<dyn OcrEngine>),
        }
    }

    pub fn tags(&self, config: &Config) -> Result<Arc<dyn TagEngine>, EngineError> {
        match &self.tags {
            Some(engine) => Ok(Arc::clone(engine)),
            None => get_tag_engine(config).map(|e| e as Arc<dyn TagEngine>),
        }
    }
}

/// Load both engines ahead of traffic. Failures are logged and left for
/// lazy initialization to retry; a missing model file should not keep the
/// server from starting.
pub fn warmup(config: &Config) {
    match get_ocr_engine(config) {
        Ok(_) => info!("OCR engine warmed up"),
        Err(e) => warn!("OCR warm-up skipped: {e}"),
    }
    match get_tag_engine(config) {
        Ok(_) => info!("Tagging engine warmed up"),
        Err(e) => warn!("Tagging warm-up skipped: {e}"),
    }
}
