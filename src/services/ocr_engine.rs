// ONNX-backed OCR engine: text detection + CTC recognition
//
// Two CPU sessions: a detector that produces a text probability map over a
// square input, and a recognizer run per detected box. CPU-only ONNX
// inference; a GPU request is accepted but only logged.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::{session::Session, value::Value};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::core::config::OcrEngineConfig;
use crate::core::errors::EngineError;
use crate::services::{OcrEngine, OcrLine};

/// Probability above which a detection map cell counts as text
const DET_THRESHOLD: f32 = 0.3;

/// Minimum component extent (in map cells) to keep as a box
const MIN_BOX_CELLS: usize = 2;

/// Recognition model input height
const REC_HEIGHT: u32 = 48;
const REC_MIN_WIDTH: u32 = 8;

pub struct OnnxOcrEngine {
    det: Mutex<Session>,
    det_input: String,
    rec: Mutex<Session>,
    rec_input: String,
    /// Glyph table for CTC decode; index 0 is the blank token
    charset: Vec<String>,
    det_size: u32,
}

impl OnnxOcrEngine {
    pub fn new(config: &OcrEngineConfig) -> Result<Self> {
        if config.use_gpu {
            warn!("GPU requested for OCR but this build runs CPU-only ONNX");
        }

        let det = build_session(&config.det_model_path)
            .context("Failed to load OCR detection model")?;
        let rec = build_session(&config.rec_model_path)
            .context("Failed to load OCR recognition model")?;

        let det_input = first_input_name(&det).context("detection model has no inputs")?;
        let rec_input = first_input_name(&rec).context("recognition model has no inputs")?;

        let charset = load_charset(&config.charset_path())?;

        info!(
            "OCR engine initialized: lang={}, charset={} glyphs, det_size={}",
            config.lang,
            charset.len(),
            config.det_size
        );

        Ok(Self {
            det: Mutex::new(det),
            det_input,
            rec: Mutex::new(rec),
            rec_input,
            charset,
            det_size: config.det_size,
        })
    }

    /// Run the detector and turn its probability map into axis-aligned
    /// boxes in original image coordinates, ordered top-to-bottom then
    /// left-to-right.
    fn detect_boxes(&self, frame: &RgbImage) -> Result<Vec<[f32; 4]>> {
        let (orig_w, orig_h) = frame.dimensions();
        let size = self.det_size as usize;

        let resized = image::imageops::resize(frame, self.det_size, self.det_size, FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for y in 0..size {
            for x in 0..size {
                let pixel = resized.get_pixel(x as u32, y as u32);
                for c in 0..3 {
                    tensor[[0, c, y, x]] = (pixel[c] as f32 / 255.0 - 0.5) / 0.5;
                }
            }
        }

        let shape: [usize; 4] = [1, 3, size, size];
        let (flat, _offset) = tensor.into_raw_vec_and_offset();
        let value = Value::from_array((shape, flat))?;

        let (dims, probs) = {
            let mut session = self.det.lock();
            let outputs = session.run(ort::inputs![self.det_input.as_str() => value])?;
            let first_key = outputs
                .keys()
                .next()
                .context("No outputs from detection model")?;
            let (shape, data) = outputs[first_key].try_extract_tensor::<f32>()?;
            let dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
            (dims, data.to_vec())
        };

        // Expect a [1, 1, H, W]-shaped map; tolerate a squeezed [H, W]
        let (map_h, map_w) = match dims.len() {
            4 => (dims[2], dims[3]),
            2 => (dims[0], dims[1]),
            _ => anyhow::bail!("Unexpected detection map shape: {dims:?}"),
        };
        if probs.len() < map_h * map_w {
            anyhow::bail!("Detection map smaller than its declared shape");
        }

        let mask: Vec<bool> = probs[..map_h * map_w]
            .iter()
            .map(|&p| p > DET_THRESHOLD)
            .collect();

        let scale_x = orig_w as f32 / map_w as f32;
        let scale_y = orig_h as f32 / map_h as f32;

        let mut boxes: Vec<[f32; 4]> = component_boxes(&mask, map_w, map_h)
            .into_iter()
            .map(|[x0, y0, x1, y1]| {
                [
                    x0 as f32 * scale_x,
                    y0 as f32 * scale_y,
                    ((x1 + 1) as f32 * scale_x).min(orig_w as f32),
                    ((y1 + 1) as f32 * scale_y).min(orig_h as f32),
                ]
            })
            .collect();

        boxes.sort_by(|a, b| (a[1], a[0]).partial_cmp(&(b[1], b[0])).unwrap_or(std::cmp::Ordering::Equal));
        debug!("detected {} text boxes", boxes.len());
        Ok(boxes)
    }

    /// Crop one detected box and run CTC recognition over it.
    fn recognize_box(&self, frame: &RgbImage, bbox: [f32; 4]) -> Result<(String, Option<f32>)> {
        let (frame_w, frame_h) = frame.dimensions();
        let x = (bbox[0].max(0.0) as u32).min(frame_w.saturating_sub(1));
        let y = (bbox[1].max(0.0) as u32).min(frame_h.saturating_sub(1));
        let w = ((bbox[2] - bbox[0]).max(1.0) as u32).min(frame_w - x);
        let h = ((bbox[3] - bbox[1]).max(1.0) as u32).min(frame_h - y);

        let crop = image::imageops::crop_imm(frame, x, y, w, h).to_image();

        // Resize to the recognizer height, preserving aspect ratio
        let scale = REC_HEIGHT as f32 / h as f32;
        let rec_w = ((w as f32 * scale) as u32).max(REC_MIN_WIDTH);
        let resized = image::imageops::resize(&crop, rec_w, REC_HEIGHT, FilterType::Lanczos3);

        let mut tensor = Array4::<f32>::zeros((1, 3, REC_HEIGHT as usize, rec_w as usize));
        for y in 0..REC_HEIGHT as usize {
            for x in 0..rec_w as usize {
                let pixel = resized.get_pixel(x as u32, y as u32);
                for c in 0..3 {
                    tensor[[0, c, y, x]] = pixel[c] as f32 / 255.0;
                }
            }
        }

        let shape: [usize; 4] = [1, 3, REC_HEIGHT as usize, rec_w as usize];
        let (flat, _offset) = tensor.into_raw_vec_and_offset();
        let value = Value::from_array((shape, flat))?;

        let (dims, logits) = {
            let mut session = self.rec.lock();
            let outputs = session.run(ort::inputs![self.rec_input.as_str() => value])?;
            let first_key = outputs
                .keys()
                .next()
                .context("No outputs from recognition model")?;
            let (shape, data) = outputs[first_key].try_extract_tensor::<f32>()?;
            let dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
            (dims, data.to_vec())
        };

        // Accept [1, S, V], [S, 1, V] or [S, V] logits layouts
        let (seq_len, vocab_size) = match dims.len() {
            3 if dims[1] == 1 => (dims[0], dims[2]),
            3 => (dims[1], dims[2]),
            2 => (dims[0], dims[1]),
            _ => anyhow::bail!("Unexpected logits shape: {dims:?}"),
        };

        Ok(self.ctc_decode(&logits, seq_len, vocab_size))
    }

    /// CTC greedy decode: collapse repeats, drop blanks (index 0).
    /// Confidence is the mean probability of the emitted glyphs.
    fn ctc_decode(&self, logits: &[f32], seq_len: usize, vocab_size: usize) -> (String, Option<f32>) {
        let mut text = String::new();
        let mut confidences: Vec<f32> = Vec::new();
        let mut prev_idx: Option<usize> = None;

        for t in 0..seq_len {
            let offset = t * vocab_size;
            let mut best_idx = 0;
            let mut best_val = f32::NEG_INFINITY;
            for i in 0..vocab_size {
                let val = logits[offset + i];
                if val > best_val {
                    best_val = val;
                    best_idx = i;
                }
            }

            if best_idx != 0 && Some(best_idx) != prev_idx {
                if let Some(glyph) = self.charset.get(best_idx) {
                    text.push_str(glyph);
                    confidences.push(best_val.clamp(0.0, 1.0));
                }
            }

            prev_idx = Some(best_idx);
        }

        let confidence = if confidences.is_empty() {
            None
        } else {
            Some(confidences.iter().sum::<f32>() / confidences.len() as f32)
        };

        (text, confidence)
    }
}

impl OcrEngine for OnnxOcrEngine {
    fn name(&self) -> &str {
        "ppocr-onnx"
    }

    fn recognize(&self, frame: &RgbImage) -> Result<Vec<OcrLine>, EngineError> {
        let boxes = self.detect_boxes(frame)?;

        let mut lines = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let (text, confidence) = self.recognize_box(frame, bbox)?;
            if text.is_empty() {
                continue;
            }
            lines.push(OcrLine {
                text,
                confidence,
                bbox,
            });
        }

        Ok(lines)
    }
}

pub(crate) fn build_session(path: &str) -> Result<Session> {
    if !Path::new(path).exists() {
        anyhow::bail!("model not found at: {path}");
    }

    let threads = num_cpus::get().clamp(1, 8);
    Session::builder()?
        .with_intra_threads(threads)?
        .commit_from_file(path)
        .with_context(|| format!("Failed to load ONNX model from {path}"))
}

pub(crate) fn first_input_name(session: &Session) -> Option<String> {
    session.inputs.first().map(|input| input.name.clone())
}

/// Charset file: one glyph per line; index 0 is reserved for the CTC
/// blank, so file line N maps to index N + 1.
fn load_charset(path: &str) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read charset from {path}"))?;

    let mut charset = vec!["".to_string()]; // blank
    for line in content.lines() {
        let glyph = line.trim_end_matches('\r');
        if glyph.is_empty() {
            continue;
        }
        charset.push(glyph.to_string());
    }

    if charset.len() < 2 {
        anyhow::bail!("charset at {path} is empty");
    }

    debug!("loaded {} glyphs from {path}", charset.len() - 1);
    Ok(charset)
}

/// Bounding boxes of 4-connected true regions in a row-major mask,
/// as [x0, y0, x1, y1] inclusive cell coordinates.
fn component_boxes(mask: &[bool], width: usize, height: usize) -> Vec<[usize; 4]> {
    let mut visited = vec![false; mask.len()];
    let mut boxes = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }

        let (mut min_x, mut min_y) = (width, height);
        let (mut max_x, mut max_y) = (0usize, 0usize);
        let mut queue = VecDeque::from([start]);
        visited[start] = true;

        while let Some(idx) = queue.pop_front() {
            let (x, y) = (idx % width, idx / width);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            let mut push = |nx: usize, ny: usize| {
                let nidx = ny * width + nx;
                if mask[nidx] && !visited[nidx] {
                    visited[nidx] = true;
                    queue.push_back(nidx);
                }
            };

            if x > 0 {
                push(x - 1, y);
            }
            if x + 1 < width {
                push(x + 1, y);
            }
            if y > 0 {
                push(x, y - 1);
            }
            if y + 1 < height {
                push(x, y + 1);
            }
        }

        if max_x + 1 - min_x >= MIN_BOX_CELLS && max_y + 1 - min_y >= MIN_BOX_CELLS {
            boxes.push([min_x, min_y, max_x, max_y]);
        }
    }

    boxes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> (Vec<bool>, usize, usize) {
        let height = rows.len();
        let width = rows[0].len();
        let mask = rows
            .iter()
            .flat_map(|row| row.chars().map(|c| c == '#'))
            .collect();
        (mask, width, height)
    }

    #[test]
    fn component_boxes_finds_separate_regions() {
        let (mask, w, h) = mask_from(&[
            "##....",
            "##....",
            "....##",
            "....##",
        ]);
        let mut boxes = component_boxes(&mask, w, h);
        boxes.sort();

        assert_eq!(boxes, vec![[0, 0, 1, 1], [4, 2, 5, 3]]);
    }

    #[test]
    fn single_cell_specks_are_discarded() {
        let (mask, w, h) = mask_from(&[
            "#.....",
            "......",
            "...###",
            "...###",
        ]);
        let boxes = component_boxes(&mask, w, h);
        assert_eq!(boxes, vec![[3, 2, 5, 3]]);
    }

    #[test]
    fn empty_mask_yields_no_boxes() {
        let (mask, w, h) = mask_from(&["....", "...."]);
        assert!(component_boxes(&mask, w, h).is_empty());
    }
}
