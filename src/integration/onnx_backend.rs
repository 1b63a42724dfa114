//! ONNX Runtime backends for the detector and the appearance encoder.

use std::path::Path;

use image::{Rgb, RgbImage};
use ndarray::{Array1, Array2, Array4};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;

use super::{Detector, FeatureEncoder, FilteredDetection, PATCH_HEIGHT, PATCH_WIDTH, extract_patch};
use crate::error::{Error, Result};
use crate::video::Frame;

fn load_session(path: &Path) -> Result<Session> {
    fn model_err<E: std::fmt::Display>(path: &Path) -> impl Fn(E) -> Error + '_ {
        move |e| Error::Model {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    }
    Session::builder()
        .map_err(model_err(path))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(model_err(path))?
        .with_intra_threads(4)
        .map_err(model_err(path))?
        .commit_from_file(path)
        .map_err(model_err(path))
}

/// YOLO-style detector exported to ONNX with an NHWC float input.
pub struct OnnxDetector {
    session: Session,
    input_size: u32,
}

impl OnnxDetector {
    pub fn load(path: impl AsRef<Path>, input_size: u32) -> Result<Self> {
        let path = path.as_ref();
        let session = load_session(path)?;
        tracing::info!(model = %path.display(), input_size, "loaded detector");
        Ok(Self {
            session,
            input_size,
        })
    }
}

impl Detector for OnnxDetector {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn predict(&mut self, batch: &Array4<f32>) -> Result<Vec<Array2<f32>>> {
        let detector_err = |e: ort::Error| Error::Detector(e.to_string());
        let shape: Vec<i64> = batch.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = batch.iter().copied().collect();
        let input = Tensor::from_array((shape, data)).map_err(detector_err)?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(detector_err)?;

        let mut scales = Vec::with_capacity(outputs.len());
        for i in 0..outputs.len() {
            let (shape, values) = outputs[i]
                .try_extract_tensor::<f32>()
                .map_err(detector_err)?;
            let cols = shape.last().copied().unwrap_or(0).max(0) as usize;
            if cols == 0 {
                continue;
            }
            let rows = values.len() / cols;
            let scale = Array2::from_shape_vec((rows, cols), values[..rows * cols].to_vec())
                .map_err(|e| Error::Detector(e.to_string()))?;
            scales.push(scale);
        }
        Ok(scales)
    }
}

/// Re-identification network over 128x64 RGB patches.
///
/// Patches are fed as NHWC floats in `[0, 255]`, `batch_size` at a time.
pub struct OnnxFeatureEncoder {
    session: Session,
    batch_size: usize,
}

impl OnnxFeatureEncoder {
    pub fn load(path: impl AsRef<Path>, batch_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let session = load_session(path)?;
        tracing::info!(model = %path.display(), batch_size, "loaded feature encoder");
        Ok(Self {
            session,
            batch_size: batch_size.max(1),
        })
    }

    fn run_batch(&mut self, patches: &[RgbImage]) -> Result<Vec<Array1<f32>>> {
        let encoder_err = |e: ort::Error| Error::Encoder(e.to_string());
        let (w, h) = (PATCH_WIDTH as usize, PATCH_HEIGHT as usize);
        let mut data = Vec::with_capacity(patches.len() * w * h * 3);
        for patch in patches {
            data.extend(patch.as_raw().iter().map(|&v| v as f32));
        }
        let shape = vec![patches.len() as i64, h as i64, w as i64, 3];
        let input = Tensor::from_array((shape, data)).map_err(encoder_err)?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(encoder_err)?;
        let (_, values) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(encoder_err)?;

        if values.is_empty() || values.len() % patches.len() != 0 {
            return Err(Error::Encoder(format!(
                "output of {} values does not split into {} embeddings",
                values.len(),
                patches.len()
            )));
        }
        let dim = values.len() / patches.len();
        Ok(values
            .chunks(dim)
            .map(|chunk| Array1::from_vec(chunk.to_vec()))
            .collect())
    }
}

impl FeatureEncoder for OnnxFeatureEncoder {
    fn encode(&mut self, frame: &Frame, boxes: &[FilteredDetection]) -> Result<Vec<Array1<f32>>> {
        let patches: Vec<RgbImage> = boxes
            .iter()
            .map(|b| {
                let tlwh = [b.x as f32, b.y as f32, b.width as f32, b.height as f32];
                extract_patch(frame, tlwh, PATCH_WIDTH, PATCH_HEIGHT).unwrap_or_else(|| {
                    tracing::debug!(?tlwh, "box outside frame, using blank patch");
                    RgbImage::from_pixel(PATCH_WIDTH, PATCH_HEIGHT, Rgb([128, 128, 128]))
                })
            })
            .collect();

        let mut embeddings = Vec::with_capacity(patches.len());
        for chunk in patches.chunks(self.batch_size) {
            embeddings.extend(self.run_batch(chunk)?);
        }
        Ok(embeddings)
    }
}
