use std::env;

use tracing::Level;

use crate::core::errors::ConfigError;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: Level,
    pub warmup_on_start: bool,
}

/// OCR engine configuration
#[derive(Debug, Clone)]
pub struct OcrEngineConfig {
    pub lang: String,
    pub det_model_path: String,
    pub rec_model_path: String,
    /// Explicit charset override; derived from `lang` when unset
    pub charset_path: Option<String>,
    pub use_gpu: bool,
    /// Lines scored below this are dropped; unscored lines are kept
    pub min_line_confidence: f32,
    /// Square input size for the detection model
    pub det_size: u32,
}

impl OcrEngineConfig {
    pub fn charset_path(&self) -> String {
        self.charset_path
            .clone()
            .unwrap_or_else(|| format!("models/ocr/charset_{}.txt", self.lang))
    }
}

/// Tagging engine configuration
#[derive(Debug, Clone)]
pub struct TagEngineConfig {
    pub model_path: String,
    pub labels_path: String,
    pub image_size: u32,
    pub backbone: String,
    pub use_gpu: bool,
    pub score_threshold: f32,
}

/// Request ingestion limits and fetch policy
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub max_image_bytes: usize,
    pub fetch_timeout_secs: u64,
    pub allowed_mime_types: Vec<String>,
    /// Anchored (full-match) pattern a fetch target's hostname must match.
    /// Deliberately not validated at startup: a malformed value surfaces
    /// as a 500 on each affected request.
    pub image_url_host_regex: String,
}

/// Main application configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrEngineConfig,
    pub tags: TagEngineConfig,
    pub ingest: IngestConfig,
}

const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
    "image/tiff",
    "image/bmp",
];

// Matched against the whole hostname, case-insensitively
const DEFAULT_HOST_REGEX: &str =
    r"localhost|127\.0\.0\.1|::1|.+\.amazonaws\.com|.+\.cloudfront\.net";

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        // Parse log level
        let log_level = env::var("GLIMPSE_LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let allowed_mime_types = env::var("GLIMPSE_ALLOWED_MIME_TYPES")
            .ok()
            .map(|list| {
                list.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| {
                DEFAULT_ALLOWED_MIME_TYPES
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        Self {
            server: ServerConfig {
                host: env::var("GLIMPSE_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("GLIMPSE_SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8000),
                log_level,
                warmup_on_start: env::var("GLIMPSE_WARMUP_ON_START")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            ocr: OcrEngineConfig {
                lang: env::var("GLIMPSE_OCR_LANG").unwrap_or_else(|_| "en".to_string()),
                det_model_path: env::var("GLIMPSE_OCR_DET_MODEL_PATH")
                    .unwrap_or_else(|_| "models/ocr/det.onnx".to_string()),
                rec_model_path: env::var("GLIMPSE_OCR_REC_MODEL_PATH")
                    .unwrap_or_else(|_| "models/ocr/rec.onnx".to_string()),
                charset_path: env::var("GLIMPSE_OCR_CHARSET_PATH")
                    .ok()
                    .filter(|s| !s.is_empty()),
                use_gpu: env::var("GLIMPSE_OCR_USE_GPU")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
                min_line_confidence: env::var("GLIMPSE_OCR_MIN_LINE_CONFIDENCE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.7),
                det_size: env::var("GLIMPSE_OCR_DET_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(640),
            },
            tags: TagEngineConfig {
                model_path: env::var("GLIMPSE_TAG_MODEL_PATH")
                    .unwrap_or_else(|_| "models/tags/ram_plus.onnx".to_string()),
                labels_path: env::var("GLIMPSE_TAG_LABELS_PATH")
                    .unwrap_or_else(|_| "models/tags/labels.txt".to_string()),
                image_size: env::var("GLIMPSE_TAG_IMAGE_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(384),
                backbone: env::var("GLIMPSE_TAG_BACKBONE")
                    .unwrap_or_else(|_| "swin_l".to_string()),
                use_gpu: env::var("GLIMPSE_TAG_USE_GPU")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
                score_threshold: env::var("GLIMPSE_TAG_SCORE_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.68),
            },
            ingest: IngestConfig {
                max_image_bytes: env::var("GLIMPSE_MAX_IMAGE_BYTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(25 * 1024 * 1024),
                fetch_timeout_secs: env::var("GLIMPSE_FETCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
                allowed_mime_types,
                image_url_host_regex: env::var("GLIMPSE_IMAGE_URL_HOST_REGEX")
                    .unwrap_or_else(|_| DEFAULT_HOST_REGEX.to_string()),
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.ocr.min_line_confidence) {
            return Err(ConfigError::InvalidConfidenceFloor(
                self.ocr.min_line_confidence,
            ));
        }

        if !(0.0..=1.0).contains(&self.tags.score_threshold) {
            return Err(ConfigError::InvalidTagThreshold(self.tags.score_threshold));
        }

        if self.ingest.max_image_bytes == 0 {
            return Err(ConfigError::InvalidMaxImageBytes);
        }

        if self.ingest.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidFetchTimeout);
        }

        if self.ingest.allowed_mime_types.is_empty() {
            return Err(ConfigError::EmptyMimeAllowlist);
        }

        if !(320..=2048).contains(&self.ocr.det_size) {
            return Err(ConfigError::InvalidDetSize(self.ocr.det_size));
        }

        if !(64..=2048).contains(&self.tags.image_size) {
            return Err(ConfigError::InvalidTagImageSize(self.tags.image_size));
        }

        Ok(())
    }
}

// Note: No Default implementation because Config::new() can fail
// Users should explicitly call Config::new()? and handle errors

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config::load_from_env()
    }

    #[test]
    fn defaults_pass_validation() {
        let config = base_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.ingest.max_image_bytes, 25 * 1024 * 1024);
        assert!(config
            .ingest
            .allowed_mime_types
            .contains(&"image/jpeg".to_string()));
    }

    #[test]
    fn out_of_range_confidence_floor_is_rejected() {
        let mut config = base_config();
        config.ocr.min_line_confidence = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfidenceFloor(_))
        ));
    }

    #[test]
    fn charset_path_derives_from_lang() {
        let mut config = base_config();
        config.ocr.charset_path = None;
        config.ocr.lang = "jp".to_string();
        assert_eq!(config.ocr.charset_path(), "models/ocr/charset_jp.txt");

        config.ocr.charset_path = Some("custom.txt".to_string());
        assert_eq!(config.ocr.charset_path(), "custom.txt");
    }
}
