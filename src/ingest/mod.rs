pub mod fetch;
pub mod frames;
pub mod mime;

// Re-export commonly used items
pub use fetch::{validate_url, SafeFetcher};
pub use frames::{frames, is_gif, FrameIter};
pub use mime::{normalize_mime, MimeClassifier};
