//! DetectionPipeline: frame in, filtered class-labelled boxes out.

use std::time::{Duration, Instant};

use ndarray::{Axis, concatenate};

use crate::classes::ClassTable;
use crate::config::DetectionConfig;
use crate::error::{Error, Result};
use crate::integration::Detector;
use crate::integration::postprocess::{self, RawDetection};
use crate::integration::preprocess::letterbox;
use crate::tracker::Rect;
use crate::video::Frame;

/// A detection after NMS, score and class filtering, in integer TLWH form.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredDetection {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub score: f32,
    pub class_name: String,
}

impl FilteredDetection {
    /// Truncate a corner-form box to integer TLWH.
    fn from_raw(raw: &RawDetection, class_name: &str) -> Self {
        let (x1, y1) = (raw.x1.max(0.0) as u32, raw.y1.max(0.0) as u32);
        let (x2, y2) = (raw.x2.max(0.0) as u32, raw.y2.max(0.0) as u32);
        Self {
            x: x1,
            y: y1,
            width: x2.saturating_sub(x1),
            height: y2.saturating_sub(y1),
            score: raw.score,
            class_name: class_name.to_string(),
        }
    }

    pub fn tlwh(&self) -> Rect {
        Rect::new(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}

/// Detections for one frame plus the time spent inside the detector.
#[derive(Debug, Clone)]
pub struct FrameDetections {
    pub detections: Vec<FilteredDetection>,
    pub inference: Duration,
}

/// Keep only detections whose class is in `allow`; an empty list keeps all.
pub fn apply_allow_list(detections: Vec<FilteredDetection>, allow: &[String]) -> Vec<FilteredDetection> {
    if allow.is_empty() {
        return detections;
    }
    detections
        .into_iter()
        .filter(|d| allow.iter().any(|a| a == &d.class_name))
        .collect()
}

/// Bundles the loaded detector with the filtering policy.
///
/// The detector is owned here and reused across every task of a batch.
pub struct DetectionPipeline<D: Detector> {
    detector: D,
    config: DetectionConfig,
}

impl<D: Detector> DetectionPipeline<D> {
    pub fn new(detector: D, config: DetectionConfig) -> Self {
        Self { detector, config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Run detection on one frame.
    ///
    /// An empty frame or a detector failure is a per-frame error; a class id
    /// the class table does not know is fatal.
    pub fn detect(&mut self, frame: &Frame, classes: &ClassTable) -> Result<FrameDetections> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::Frame("frame has zero size".into()));
        }

        let input_size = self.detector.input_size();
        let batch = letterbox(frame, input_size);

        let started = Instant::now();
        let outputs = self.detector.predict(&batch)?;
        let inference = started.elapsed();

        let views: Vec<_> = outputs.iter().map(|o| o.view()).collect();
        let candidates = if views.is_empty() {
            ndarray::Array2::zeros((0, 6))
        } else {
            concatenate(Axis(0), &views)
                .map_err(|e| Error::Detector(format!("mismatched output scales: {e}")))?
        };

        let boxes = postprocess::postprocess_boxes(
            candidates.view(),
            (width, height),
            input_size,
            self.config.score_threshold,
        );
        let boxes = postprocess::nms(boxes, self.config.iou_threshold, self.config.nms_method());

        let mut detections = Vec::with_capacity(boxes.len());
        for raw in &boxes {
            let name = classes
                .name_of(raw.class_id)
                .ok_or(Error::UnknownClassId(raw.class_id))?;
            detections.push(FilteredDetection::from_raw(raw, name));
        }
        let detections = apply_allow_list(detections, &self.config.track_only);

        tracing::trace!(
            candidates = candidates.nrows(),
            kept = detections.len(),
            "frame detections"
        );
        Ok(FrameDetections {
            detections,
            inference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use ndarray::{Array2, Array4, array};

    struct MockDetector {
        outputs: Vec<Array2<f32>>,
    }

    impl Detector for MockDetector {
        fn input_size(&self) -> u32 {
            64
        }

        fn predict(&mut self, batch: &Array4<f32>) -> Result<Vec<Array2<f32>>> {
            assert_eq!(batch.shape(), &[1, 64, 64, 3]);
            Ok(self.outputs.clone())
        }
    }

    fn filtered(class_name: &str, x: u32) -> FilteredDetection {
        FilteredDetection {
            x,
            y: 0,
            width: 10,
            height: 10,
            score: 0.9,
            class_name: class_name.into(),
        }
    }

    #[test]
    fn test_allow_list_keeps_order() {
        let dets = vec![
            filtered("car", 0),
            filtered("bus", 1),
            filtered("person", 2),
            filtered("car", 3),
        ];
        let kept = apply_allow_list(dets.clone(), &["car".to_string()]);
        assert_eq!(kept, vec![dets[0].clone(), dets[3].clone()]);
        assert_eq!(apply_allow_list(dets.clone(), &[]).len(), 4);
    }

    #[test]
    fn test_truncates_to_integer_tlwh() {
        let raw = RawDetection {
            x1: 10.9,
            y1: 20.2,
            x2: 30.7,
            y2: 40.99,
            score: 0.5,
            class_id: 0,
        };
        let d = FilteredDetection::from_raw(&raw, "car");
        assert_eq!((d.x, d.y, d.width, d.height), (10, 20, 20, 20));
    }

    #[test]
    fn test_detect_end_to_end() {
        let classes = ClassTable::from_names(["person", "car", "bus"]).unwrap();
        let detector = MockDetector {
            outputs: vec![
                array![[20.0, 32.0, 8.0, 8.0, 0.9, 0.0, 0.9, 0.0]],
                array![
                    [44.0, 32.0, 8.0, 8.0, 0.9, 0.0, 0.0, 0.9],
                    [10.0, 32.0, 4.0, 4.0, 0.9, 0.9, 0.0, 0.0]
                ],
            ],
        };
        let config = DetectionConfig {
            track_only: vec!["car".into(), "person".into()],
            ..Default::default()
        };
        let mut pipeline = DetectionPipeline::new(detector, config);
        let frame = RgbImage::new(64, 64);
        let result = pipeline.detect(&frame, &classes).unwrap();

        let names: Vec<&str> = result.detections.iter().map(|d| d.class_name.as_str()).collect();
        assert_eq!(names, vec!["person", "car"]);
        assert_eq!(result.detections[1].x, 16);
        assert_eq!(result.detections[1].width, 8);
    }

    #[test]
    fn test_unknown_class_id_is_fatal() {
        let classes = ClassTable::from_names(["person"]).unwrap();
        let detector = MockDetector {
            outputs: vec![array![[32.0, 32.0, 8.0, 8.0, 0.9, 0.0, 0.9]]],
        };
        let mut pipeline = DetectionPipeline::new(detector, DetectionConfig {
            track_only: vec![],
            ..Default::default()
        });
        let err = pipeline.detect(&RgbImage::new(64, 64), &classes).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_empty_frame_is_frame_error() {
        let classes = ClassTable::coco();
        let mut pipeline = DetectionPipeline::new(
            MockDetector { outputs: vec![] },
            DetectionConfig::default(),
        );
        let err = pipeline.detect(&RgbImage::new(0, 0), &classes).unwrap_err();
        assert_eq!(err.severity(), crate::error::Severity::Frame);
    }
}
