pub mod merge;
pub mod ocr;
pub mod similarity;
pub mod tags;

// Re-export commonly used items
pub use merge::{DedupTextMerger, FrameText};
pub use ocr::OcrPipeline;
pub use tags::{TagAccumulator, TagPipeline};
