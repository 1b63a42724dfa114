//! Integration of the object detector and the appearance encoder with the
//! tracker.
//!
//! The detector and encoder are external models behind the [`Detector`] and
//! [`FeatureEncoder`] traits. This module owns everything around them:
//! letterbox preprocessing, box rescaling, score filtering, NMS, the class
//! allow-list and the positional binding of embeddings to detections.

mod detector;
mod encoder;
mod pipeline;
mod postprocess;
mod preprocess;

pub use detector::Detector;
pub use encoder::{FeatureBinder, FeatureEncoder, PATCH_HEIGHT, PATCH_WIDTH, extract_patch};
pub use pipeline::{DetectionPipeline, FilteredDetection, FrameDetections, apply_allow_list};
pub use postprocess::{NmsMethod, RawDetection, nms, postprocess_boxes};
pub use preprocess::{Letterbox, letterbox};

#[cfg(feature = "onnx")]
mod onnx_backend;

#[cfg(feature = "onnx")]
pub use onnx_backend::{OnnxDetector, OnnxFeatureEncoder};

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnDetector, BurnModel};
