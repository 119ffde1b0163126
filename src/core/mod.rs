pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    ApiError, ConfigError, DecodeError, EngineError, FetchError, MimeError, PipelineError,
};
pub use types::{Frame, ImageBlob, LineResult, OcrResult, TagsResult, UrlContext};
