// Tagging orchestration: per-frame inference into an order-preserving
// unique accumulator, truncated to the caller's top-K at the end.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::core::errors::PipelineError;
use crate::core::types::{ImageBlob, TagsResult};
use crate::ingest::frames::frames;
use crate::services::TagEngine;

/// Insertion-ordered set of tag tokens; first occurrence wins.
#[derive(Debug, Default)]
pub struct TagAccumulator {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

impl TagAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, raw: &str) {
        let tag = raw.trim();
        if tag.is_empty() {
            return;
        }
        if self.seen.insert(tag.to_string()) {
            self.ordered.push(tag.to_string());
        }
    }

    /// Truncate to `top_k` when positive; non-positive means unlimited.
    pub fn finish(mut self, top_k: i64) -> Vec<String> {
        if top_k > 0 {
            self.ordered.truncate(top_k as usize);
        }
        self.ordered
    }
}

pub struct TagPipeline {
    engine: Arc<dyn TagEngine>,
}

impl TagPipeline {
    pub fn new(engine: Arc<dyn TagEngine>) -> Self {
        Self { engine }
    }

    /// Tag every frame (stills yield one) and accumulate unique tags in
    /// first-seen order.
    pub fn run(&self, blob: &ImageBlob, top_k: i64) -> Result<TagsResult, PipelineError> {
        let start = Instant::now();
        let mut acc = TagAccumulator::new();

        for frame in frames(&blob.bytes, Some(&blob.mime))? {
            let frame = frame?;
            for tag in self.engine.tag(&frame.pixels)? {
                acc.push(&tag);
            }
        }

        Ok(TagsResult {
            tags: acc.finish(top_k),
            engine: self.engine.name().to_string(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::EngineError;
    use image::codecs::gif::GifEncoder;
    use image::{Frame as GifFrame, Rgba, RgbaImage, RgbImage};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedTagger {
        script: Mutex<VecDeque<Vec<String>>>,
    }

    impl ScriptedTagger {
        fn new(script: Vec<Vec<&str>>) -> Arc<Self> {
            let script = script
                .into_iter()
                .map(|tags| tags.into_iter().map(String::from).collect())
                .collect::<VecDeque<_>>();
            Arc::new(Self {
                script: Mutex::new(script),
            })
        }
    }

    impl TagEngine for ScriptedTagger {
        fn name(&self) -> &str {
            "scripted-tagger"
        }

        fn tag(&self, _frame: &RgbImage) -> Result<Vec<String>, EngineError> {
            Ok(self.script.lock().pop_front().unwrap_or_default())
        }
    }

    fn gif_blob(frame_count: u8) -> ImageBlob {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            for _ in 0..frame_count {
                let img = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
                encoder.encode_frame(GifFrame::new(img)).unwrap();
            }
        }
        ImageBlob {
            bytes,
            mime: "image/gif".to_string(),
        }
    }

    #[test]
    fn accumulator_keeps_first_seen_order_and_truncates() {
        let mut acc = TagAccumulator::new();
        for tag in ["cat", "dog"] {
            acc.push(tag);
        }
        for tag in ["dog", "bird"] {
            acc.push(tag);
        }
        acc.push("cat");

        assert_eq!(acc.finish(2), vec!["cat", "dog"]);
    }

    #[test]
    fn accumulator_trims_and_drops_empty_tokens() {
        let mut acc = TagAccumulator::new();
        acc.push("  cat ");
        acc.push("   ");
        acc.push("");
        acc.push("cat");

        assert_eq!(acc.finish(0), vec!["cat"]);
    }

    #[test]
    fn non_positive_top_k_means_unlimited() {
        for top_k in [0, -1] {
            let mut acc = TagAccumulator::new();
            for tag in ["a", "b", "c"] {
                acc.push(tag);
            }
            assert_eq!(acc.finish(top_k).len(), 3);
        }
    }

    #[test]
    fn pipeline_accumulates_across_frames() {
        let engine = ScriptedTagger::new(vec![
            vec!["cat", "dog"],
            vec!["dog", "bird"],
            vec!["cat"],
        ]);
        let result = TagPipeline::new(engine).run(&gif_blob(3), 2).unwrap();

        assert_eq!(result.tags, vec!["cat", "dog"]);
        assert_eq!(result.engine, "scripted-tagger");
    }
}
