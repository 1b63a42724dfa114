//! Burn inference backend for object detection.
//!
//! This module provides a `BurnDetector` that implements [`Detector`] for
//! YOLO-style models built with the Burn framework.
//!
//! # Example
//!
//! ```ignore
//! use object_tracker_rs::integration::{BurnDetector, BurnModel};
//! use burn::backend::NdArray;
//!
//! struct MyYoloModel { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyYoloModel {
//!     fn forward(&self, input: burn::tensor::Tensor<NdArray, 4>) -> Vec<burn::tensor::Tensor<NdArray, 2>> {
//!         // One (candidates, 5 + classes) tensor per output scale
//!     }
//! }
//!
//! let detector = BurnDetector::new(MyYoloModel::load("yolov3.bin"), Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use ndarray::{Array2, Array4};

use super::Detector;
use crate::error::{Error, Result};

/// Trait for Burn-based detection models.
///
/// Implement this trait for your specific model architecture.
pub trait BurnModel<B: Backend> {
    /// Run forward pass on the input tensor.
    ///
    /// # Arguments
    /// * `input` - `[1, 3, size, size]` when [`channels_first`](Self::channels_first)
    ///   is true, otherwise `[1, size, size, 3]`
    ///
    /// # Returns
    /// One tensor per output scale with rows
    /// `[cx, cy, w, h, objectness, class probabilities...]`.
    fn forward(&self, input: Tensor<B, 4>) -> Vec<Tensor<B, 2>>;

    /// Side length of the square input.
    fn input_size(&self) -> u32 {
        416
    }

    /// Whether the model expects NCHW input.
    fn channels_first(&self) -> bool {
        true
    }
}

/// Burn-based object detector implementing [`Detector`].
pub struct BurnDetector<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
}

impl<B: Backend, M: BurnModel<B>> BurnDetector<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self { model, device }
    }

    fn to_tensor(&self, batch: &Array4<f32>) -> Tensor<B, 4> {
        let shape = batch.shape();
        let dims = [shape[0], shape[1], shape[2], shape[3]];
        let data: Vec<f32> = batch.iter().copied().collect();
        let tensor = Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape(dims);
        if self.model.channels_first() {
            tensor.permute([0, 3, 1, 2])
        } else {
            tensor
        }
    }
}

impl<B: Backend, M: BurnModel<B>> Detector for BurnDetector<B, M> {
    fn input_size(&self) -> u32 {
        self.model.input_size()
    }

    fn predict(&mut self, batch: &Array4<f32>) -> Result<Vec<Array2<f32>>> {
        let input = self.to_tensor(batch);
        self.model
            .forward(input)
            .into_iter()
            .map(|output| {
                let [rows, cols] = output.dims();
                let values = output
                    .into_data()
                    .to_vec::<f32>()
                    .map_err(|e| Error::Detector(format!("{e:?}")))?;
                Array2::from_shape_vec((rows, cols), values)
                    .map_err(|e| Error::Detector(e.to_string()))
            })
            .collect()
    }
}
