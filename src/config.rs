//! Batch configuration: shared policy parameters plus the ordered task list.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::integration::NmsMethod;
use crate::tracker::{DistanceMetric, TrackerConfig};

/// Detection stage parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Side length of the square detector input.
    pub input_size: u32,
    pub score_threshold: f32,
    pub iou_threshold: f32,
    pub nms: NmsKind,
    pub soft_nms_sigma: f32,
    /// Class allow-list. Empty keeps every class.
    pub track_only: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            input_size: 416,
            score_threshold: 0.2,
            iou_threshold: 0.1,
            nms: NmsKind::Nms,
            soft_nms_sigma: 0.3,
            track_only: ["person", "car", "truck", "bus"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl DetectionConfig {
    pub fn nms_method(&self) -> NmsMethod {
        match self.nms {
            NmsKind::Nms => NmsMethod::Hard,
            NmsKind::SoftNms => NmsMethod::Soft {
                sigma: self.soft_nms_sigma,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NmsKind {
    Nms,
    SoftNms,
}

/// Association engine parameters (serialized form of [`TrackerConfig`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub metric: MetricKind,
    pub max_cosine_distance: f32,
    pub nn_budget: Option<usize>,
    pub max_iou_distance: f32,
    pub max_age: u32,
    pub n_init: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        let tracker = TrackerConfig::default();
        Self {
            metric: MetricKind::Cosine,
            max_cosine_distance: tracker.matching_threshold,
            nn_budget: tracker.budget,
            max_iou_distance: tracker.max_iou_distance,
            max_age: tracker.max_age,
            n_init: tracker.n_init,
        }
    }
}

impl TrackingConfig {
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            metric: match self.metric {
                MetricKind::Cosine => DistanceMetric::Cosine,
                MetricKind::Euclidean => DistanceMetric::Euclidean,
            },
            matching_threshold: self.max_cosine_distance,
            budget: self.nn_budget,
            max_iou_distance: self.max_iou_distance,
            max_age: self.max_age,
            n_init: self.n_init,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cosine,
    Euclidean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Tracks unmatched for more than this many frames are hidden.
    pub max_staleness: u32,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self { max_staleness: 5 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPaths {
    pub detector: Option<PathBuf>,
    pub encoder: Option<PathBuf>,
    /// Darknet `.names` file; the COCO table is used when absent.
    pub classes: Option<PathBuf>,
    /// TTF font for labels and the FPS overlay.
    pub font: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Four-character video codec tag.
    pub codec: String,
    /// Frame rate used when the source reports none (image sequences).
    pub fallback_fps: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            codec: "XVID".to_string(),
            fallback_fps: 25.0,
        }
    }
}

impl OutputConfig {
    pub fn fourcc(&self) -> Result<[char; 4]> {
        let chars: Vec<char> = self.codec.chars().collect();
        match chars.as_slice() {
            &[a, b, c, d] if chars.iter().all(char::is_ascii) => Ok([a, b, c, d]),
            _ => Err(Error::Config(format!(
                "codec tag `{}` must be four ASCII characters",
                self.codec
            ))),
        }
    }
}

/// Whole-run configuration, supplied once and shared by every task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub base_path: PathBuf,
    pub tasks: Vec<String>,
    /// `{base}` and `{task}` are substituted. Same for the output templates;
    /// an empty output template disables that channel.
    pub input_template: String,
    pub video_template: String,
    pub log_template: String,
    pub detection: DetectionConfig,
    pub tracking: TrackingConfig,
    pub visibility: VisibilityConfig,
    pub models: ModelPaths,
    pub output: OutputConfig,
    /// Preview each annotated frame; `q` aborts the current task.
    pub show: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            tasks: Vec::new(),
            input_template: "{base}/{task}/{task}.mp4".to_string(),
            video_template: "{base}/{task}/tracked-yolo-0.2.mp4".to_string(),
            log_template: "{base}/{task}/tracked-yolo-0.2.txt".to_string(),
            detection: DetectionConfig::default(),
            tracking: TrackingConfig::default(),
            visibility: VisibilityConfig::default(),
            models: ModelPaths::default(),
            output: OutputConfig::default(),
            show: false,
        }
    }
}

impl BatchConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.trim().is_empty() {
                return Err(Error::Config("task names must not be empty".into()));
            }
            if !seen.insert(task.as_str()) {
                return Err(Error::Config(format!("task `{task}` is listed twice")));
            }
        }

        let det = &self.detection;
        if det.input_size == 0 || det.input_size % 32 != 0 {
            return Err(Error::Config(format!(
                "input_size {} must be a positive multiple of 32",
                det.input_size
            )));
        }
        for (name, value) in [
            ("score_threshold", det.score_threshold),
            ("iou_threshold", det.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{name} {value} is outside [0, 1]")));
            }
        }
        if det.nms == NmsKind::SoftNms && det.soft_nms_sigma <= 0.0 {
            return Err(Error::Config("soft_nms_sigma must be positive".into()));
        }

        if self.tracking.n_init == 0 {
            return Err(Error::Config("n_init must be at least 1".into()));
        }
        if self.tracking.nn_budget == Some(0) {
            return Err(Error::Config("nn_budget must be at least 1".into()));
        }

        self.output.fourcc()?;
        Ok(())
    }

    /// Substitute `{base}` and `{task}` into a path template.
    pub fn render_template(&self, template: &str, task: &str) -> Option<PathBuf> {
        if template.is_empty() {
            return None;
        }
        let base = self.base_path.to_string_lossy();
        Some(PathBuf::from(
            template.replace("{base}", &base).replace("{task}", task),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_batch_script() {
        let config = BatchConfig::default();
        assert_eq!(config.detection.input_size, 416);
        assert_eq!(config.detection.score_threshold, 0.2);
        assert_eq!(config.detection.iou_threshold, 0.1);
        assert_eq!(
            config.detection.track_only,
            vec!["person", "car", "truck", "bus"]
        );
        assert_eq!(config.visibility.max_staleness, 5);
        assert_eq!(config.tracking.n_init, 3);
        assert_eq!(config.tracking.max_age, 30);
        assert_eq!(config.output.fourcc().unwrap(), ['X', 'V', 'I', 'D']);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "base_path": "/data/videos",
            "tasks": ["news1", "news2"],
            "detection": { "score_threshold": 0.3, "track_only": [] },
            "tracking": { "nn_budget": 100 }
        }"#;
        let config: BatchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tasks, vec!["news1", "news2"]);
        assert_eq!(config.detection.score_threshold, 0.3);
        assert_eq!(config.detection.iou_threshold, 0.1);
        assert!(config.detection.track_only.is_empty());
        assert_eq!(config.tracking.nn_budget, Some(100));
        assert_eq!(config.tracking.max_cosine_distance, 0.7);
    }

    #[test]
    fn test_render_template() {
        let config = BatchConfig {
            base_path: PathBuf::from("/data"),
            ..Default::default()
        };
        assert_eq!(
            config.render_template(&config.input_template, "MOT16-06"),
            Some(PathBuf::from("/data/MOT16-06/MOT16-06.mp4"))
        );
        assert_eq!(
            config.render_template(&config.log_template, "a"),
            Some(PathBuf::from("/data/a/tracked-yolo-0.2.txt"))
        );
        assert_eq!(config.render_template("", "a"), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let duplicate = BatchConfig {
            tasks: vec!["a".into(), "a".into()],
            ..Default::default()
        };
        assert!(duplicate.validate().is_err());

        let mut odd_size = BatchConfig::default();
        odd_size.detection.input_size = 400;
        assert!(odd_size.validate().is_err());

        let mut bad_codec = BatchConfig::default();
        bad_codec.output.codec = "H264X".into();
        assert!(bad_codec.validate().is_err());

        let mut bad_threshold = BatchConfig::default();
        bad_threshold.detection.score_threshold = 1.5;
        assert!(bad_threshold.validate().is_err());
    }
}
