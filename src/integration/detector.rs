//! Trait for object detection inference backends.

use ndarray::{Array2, Array4};

use crate::error::Result;

/// A loaded detection model.
///
/// Implement this trait to connect any YOLO-style network to the pipeline.
/// The model is loaded once and reused for every task of a batch.
///
/// # Example
///
/// ```ignore
/// use object_tracker_rs::integration::Detector;
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl Detector for MyDetector {
///     fn input_size(&self) -> u32 {
///         416
///     }
///
///     fn predict(&mut self, batch: &Array4<f32>) -> Result<Vec<Array2<f32>>> {
///         // Run inference and return one matrix per output scale
///         Ok(vec![])
///     }
/// }
/// ```
pub trait Detector {
    /// Side length of the square input the model expects.
    fn input_size(&self) -> u32;

    /// Run inference on a batch of letterboxed frames.
    ///
    /// # Arguments
    /// * `batch` - NHWC tensor `[1, size, size, 3]` with values in `[0, 1]`
    ///
    /// # Returns
    /// One matrix per output scale, each of shape `(candidates, 5 + classes)`
    /// with rows `[cx, cy, w, h, objectness, class probabilities...]` in
    /// model-input pixels. Failures should be reported as
    /// [`Error::Detector`](crate::Error::Detector).
    fn predict(&mut self, batch: &Array4<f32>) -> Result<Vec<Array2<f32>>>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn input_size(&self) -> u32 {
        (**self).input_size()
    }

    fn predict(&mut self, batch: &Array4<f32>) -> Result<Vec<Array2<f32>>> {
        (**self).predict(batch)
    }
}
