// Fuzzy deduplication of sequential per-frame OCR output
//
// Animated sources often repeat the same caption across many frames; only
// a frame whose text moved away from the last retained frame's text is
// kept. Comparison happens on normalized text against the most recently
// kept frame, not against the whole history.

use crate::core::types::LineResult;
use crate::pipeline::similarity::{normalize_text, text_similarity};

/// Near-exact match required below this many characters
const SHORT_TEXT_LEN: usize = 15;
const SHORT_TEXT_THRESHOLD: f64 = 0.97;
const LONG_TEXT_THRESHOLD: f64 = 0.90;

/// OCR output of a single frame, already collated and confidence-filtered.
#[derive(Debug, Clone)]
pub struct FrameText {
    pub index: usize,
    pub text: String,
    pub confidence: Option<f32>,
    pub lines: Vec<LineResult>,
}

/// Incremental merger over frames in sequence order.
#[derive(Debug, Default)]
pub struct DedupTextMerger {
    last_kept: String,
    texts: Vec<String>,
    lines: Vec<LineResult>,
    confidences: Vec<f32>,
}

impl DedupTextMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a frame's text; returns whether it was kept. Frames whose
    /// normalized text is empty are skipped entirely: not kept, and not
    /// used as a comparison baseline.
    pub fn push(&mut self, frame: FrameText) -> bool {
        let norm = normalize_text(&frame.text);
        if norm.is_empty() {
            return false;
        }

        if !self.last_kept.is_empty() {
            let sim = text_similarity(&norm, &self.last_kept);
            let shorter = norm.chars().count().min(self.last_kept.chars().count());
            let threshold = if shorter < SHORT_TEXT_LEN {
                SHORT_TEXT_THRESHOLD
            } else {
                LONG_TEXT_THRESHOLD
            };
            if sim >= threshold {
                return false;
            }
        }

        self.texts.push(frame.text);
        if let Some(conf) = frame.confidence {
            self.confidences.push(conf);
        }
        for mut line in frame.lines {
            line.frame = Some(frame.index);
            self.lines.push(line);
        }
        self.last_kept = norm;
        true
    }

    /// Join kept texts with newlines and average the kept frames'
    /// confidences. Frames that produced no confidence sample are skipped
    /// in the average, not counted as zero. No kept frames is a valid,
    /// empty result.
    pub fn finish(self) -> (String, Option<f32>, Vec<LineResult>) {
        let text = self
            .texts
            .iter()
            .filter(|t| !t.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");

        let confidence = if self.confidences.is_empty() {
            None
        } else {
            Some(self.confidences.iter().sum::<f32>() / self.confidences.len() as f32)
        };

        (text, confidence, self.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: usize, text: &str, confidence: Option<f32>) -> FrameText {
        FrameText {
            index,
            text: text.to_string(),
            confidence,
            lines: vec![LineResult {
                text: text.to_string(),
                confidence,
                bbox: [0.0, 0.0, 1.0, 1.0],
                frame: None,
            }],
        }
    }

    #[test]
    fn identical_frames_collapse_to_one() {
        let mut merger = DedupTextMerger::new();
        assert!(merger.push(frame(0, "Hello World", Some(0.9))));
        assert!(!merger.push(frame(1, "hello   world", Some(0.8))));

        let (text, confidence, lines) = merger.finish();
        assert_eq!(text, "Hello World");
        assert_eq!(confidence, Some(0.9));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].frame, Some(0));
    }

    #[test]
    fn empty_frames_are_skipped_not_compared() {
        let mut merger = DedupTextMerger::new();
        assert!(merger.push(frame(0, "caption", None)));
        assert!(!merger.push(frame(1, "   ", None)));
        // Still compared against frame 0's text, not the blank
        assert!(!merger.push(frame(2, "caption", None)));

        let (text, _, _) = merger.finish();
        assert_eq!(text, "caption");
    }

    #[test]
    fn short_texts_need_near_exact_match_to_dedup() {
        // 11 chars: similarity of "hello world" vs "hello world." is
        // ~0.957, below the 0.97 short-text threshold, so both stay.
        let mut merger = DedupTextMerger::new();
        assert!(merger.push(frame(0, "hello world", None)));
        assert!(merger.push(frame(1, "hello world.", None)));

        let (text, _, _) = merger.finish();
        assert_eq!(text, "hello world\nhello world.");
    }

    #[test]
    fn long_texts_dedup_at_the_relaxed_threshold() {
        // 16 chars: the same one-char edit scores ~0.94, which clears the
        // 0.90 long-text threshold, so the second frame is dropped.
        let mut merger = DedupTextMerger::new();
        assert!(merger.push(frame(0, "aaaaaaaaaaaaaaaa", None)));
        assert!(!merger.push(frame(1, "aaaaaaaaaaaaaaab", None)));

        let (text, _, _) = merger.finish();
        assert_eq!(text, "aaaaaaaaaaaaaaaa");
    }

    #[test]
    fn short_texts_below_threshold_both_kept() {
        // The same edit on a 14-char string scores ~0.93, under 0.97.
        let mut merger = DedupTextMerger::new();
        assert!(merger.push(frame(0, "aaaaaaaaaaaaaa", None)));
        assert!(merger.push(frame(1, "aaaaaaaaaaaaab", None)));
    }

    #[test]
    fn comparison_is_against_last_kept_only() {
        let mut merger = DedupTextMerger::new();
        assert!(merger.push(frame(0, "first caption here", None)));
        assert!(merger.push(frame(1, "totally different text", None)));
        // Matches frame 0, but the baseline is frame 1 now, so it stays
        assert!(merger.push(frame(2, "first caption here", None)));

        let (text, _, lines) = merger.finish();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(
            lines.iter().map(|l| l.frame.unwrap()).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn unscored_frames_do_not_drag_the_average() {
        let mut merger = DedupTextMerger::new();
        merger.push(frame(0, "alpha alpha alpha", Some(0.8)));
        merger.push(frame(1, "beta beta beta beta", None));
        merger.push(frame(2, "gamma gamma gamma", Some(0.6)));

        let (_, confidence, _) = merger.finish();
        assert!((confidence.unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn no_frames_is_an_empty_result_not_an_error() {
        let (text, confidence, lines) = DedupTextMerger::new().finish();
        assert_eq!(text, "");
        assert_eq!(confidence, None);
        assert!(lines.is_empty());
    }
}
