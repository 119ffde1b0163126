// ONNX-backed image tagger
//
// Single CPU session over an ImageNet-normalized square input; the output
// logits are sigmoided and thresholded against the label table. CPU-only,
// like the OCR engine.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::value::Value;
use ort::session::Session;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::core::config::TagEngineConfig;
use crate::core::errors::EngineError;
use crate::services::ocr_engine::{build_session, first_input_name};
use crate::services::TagEngine;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub struct OnnxTagEngine {
    session: Mutex<Session>,
    input_name: String,
    labels: Vec<String>,
    image_size: u32,
    threshold: f32,
}

impl OnnxTagEngine {
    pub fn new(config: &TagEngineConfig) -> Result<Self> {
        if config.use_gpu {
            warn!("GPU requested for tagging but this build runs CPU-only ONNX");
        }

        let session =
            build_session(&config.model_path).context("Failed to load tagging model")?;
        let input_name = first_input_name(&session).context("tagging model has no inputs")?;
        let labels = load_labels(&config.labels_path)?;

        info!(
            "Tagging engine initialized: backbone={}, {} labels, input {}x{}",
            config.backbone,
            labels.len(),
            config.image_size,
            config.image_size
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            labels,
            image_size: config.image_size,
            threshold: config.score_threshold,
        })
    }

    fn preprocess(&self, frame: &RgbImage) -> Array4<f32> {
        let size = self.image_size as usize;
        let resized =
            image::imageops::resize(frame, self.image_size, self.image_size, FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for y in 0..size {
            for x in 0..size {
                let pixel = resized.get_pixel(x as u32, y as u32);
                for c in 0..3 {
                    tensor[[0, c, y, x]] =
                        (pixel[c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
                }
            }
        }

        tensor
    }
}

impl TagEngine for OnnxTagEngine {
    fn name(&self) -> &str {
        "ram++"
    }

    fn tag(&self, frame: &RgbImage) -> Result<Vec<String>, EngineError> {
        let tensor = self.preprocess(frame);
        let size = self.image_size as usize;

        let shape: [usize; 4] = [1, 3, size, size];
        let (flat, _offset) = tensor.into_raw_vec_and_offset();
        let value = Value::from_array((shape, flat)).map_err(anyhow::Error::from)?;

        let logits = {
            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![self.input_name.as_str() => value])
                .map_err(anyhow::Error::from)?;
            let first_key = outputs
                .keys()
                .next()
                .context("No outputs from tagging model")?;
            let (_, data) = outputs[first_key]
                .try_extract_tensor::<f32>()
                .map_err(anyhow::Error::from)?;
            data.to_vec()
        };

        // Score each label, keep those over the threshold, best first
        let mut scored: Vec<(usize, f32)> = logits
            .iter()
            .take(self.labels.len())
            .enumerate()
            .map(|(i, &logit)| (i, sigmoid(logit)))
            .filter(|&(_, score)| score >= self.threshold)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        debug!("{} tags over threshold {}", scored.len(), self.threshold);
        Ok(scored
            .into_iter()
            .map(|(i, _)| self.labels[i].clone())
            .collect())
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Labels file: one tag per line, in model output order.
fn load_labels(path: &str) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read labels from {path}"))?;

    let labels: Vec<String> = content
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if labels.is_empty() {
        anyhow::bail!("labels file at {path} is empty");
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_centered_and_bounded() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }
}
