// OCR orchestration: frame extraction, per-frame inference, dedup merge
//
// Static images take the direct path: one decode, one engine call.
// Animated images run frame by frame through the dedup merger so
// near-static animations do not repeat the same text block.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::core::errors::{DecodeError, PipelineError};
use crate::core::types::{ImageBlob, LineResult, OcrResult};
use crate::ingest::frames::{frames, is_gif};
use crate::pipeline::merge::{DedupTextMerger, FrameText};
use crate::services::{OcrEngine, OcrLine};

pub struct OcrPipeline {
    engine: Arc<dyn OcrEngine>,
    min_line_confidence: f32,
}

impl OcrPipeline {
    pub fn new(engine: Arc<dyn OcrEngine>, min_line_confidence: f32) -> Self {
        Self {
            engine,
            min_line_confidence,
        }
    }

    pub fn run(&self, blob: &ImageBlob) -> Result<OcrResult, PipelineError> {
        let start = Instant::now();

        let (text, confidence, lines) = if is_gif(&blob.bytes, Some(&blob.mime)) {
            self.run_animated(blob)?
        } else {
            self.run_static(blob)?
        };

        Ok(OcrResult {
            text,
            confidence,
            lines,
            engine: self.engine.name().to_string(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn run_static(
        &self,
        blob: &ImageBlob,
    ) -> Result<(String, Option<f32>, Vec<LineResult>), PipelineError> {
        let img = image::load_from_memory(&blob.bytes).map_err(DecodeError::from)?;
        let raw = self.engine.recognize(&img.to_rgb8())?;
        Ok(self.collate(raw))
    }

    fn run_animated(
        &self,
        blob: &ImageBlob,
    ) -> Result<(String, Option<f32>, Vec<LineResult>), PipelineError> {
        let mut merger = DedupTextMerger::new();
        let mut total = 0usize;
        let mut kept = 0usize;

        for frame in frames(&blob.bytes, Some(&blob.mime))? {
            let frame = frame?;
            total += 1;

            let raw = self.engine.recognize(&frame.pixels)?;
            let (text, confidence, lines) = self.collate(raw);
            if merger.push(FrameText {
                index: frame.index,
                text,
                confidence,
                lines,
            }) {
                kept += 1;
            }
        }

        debug!("animated OCR: {kept}/{total} frames kept");
        Ok(merger.finish())
    }

    /// Apply the per-line confidence floor and aggregate one frame's
    /// lines. Unscored lines pass the floor; they simply contribute no
    /// confidence sample.
    fn collate(&self, raw: Vec<OcrLine>) -> (String, Option<f32>, Vec<LineResult>) {
        let mut texts: Vec<String> = Vec::new();
        let mut scores: Vec<f32> = Vec::new();
        let mut lines: Vec<LineResult> = Vec::new();

        for line in raw {
            if let Some(score) = line.confidence {
                if score < self.min_line_confidence {
                    continue;
                }
                scores.push(score);
            }

            texts.push(line.text.clone());
            lines.push(LineResult {
                text: line.text,
                confidence: line.confidence,
                bbox: line.bbox,
                frame: None,
            });
        }

        let text = texts
            .iter()
            .filter(|t| !t.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");

        let confidence = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f32>() / scores.len() as f32)
        };

        (text, confidence, lines)
    }
}
