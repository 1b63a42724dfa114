//! Batch multi-object tracking over video.
//!
//! Per frame: detect with a YOLO-style [`Detector`], filter and suppress the
//! boxes, bind appearance embeddings from a [`FeatureEncoder`], associate them
//! with an [`AssociationEngine`], select the visible tracks and write the
//! annotated frame plus one log line per visible track. [`BatchRunner`]
//! repeats this for every task of a [`BatchConfig`].

pub mod batch;
pub mod classes;
pub mod config;
pub mod error;
pub mod integration;
pub mod latency;
pub mod lifecycle;
pub mod output;
pub mod render;
pub mod tracker;
pub mod video;

pub use batch::{BatchReport, BatchRunner, RunnerState, Task, TaskOutcome, TaskStatus};
pub use classes::ClassTable;
pub use config::BatchConfig;
pub use error::{Error, Result, Severity};
pub use integration::{DetectionPipeline, Detector, FeatureBinder, FeatureEncoder, FilteredDetection};
pub use latency::LatencyEstimator;
pub use lifecycle::{TrackLifecycleView, VisibleTrack};
pub use output::{OutputSink, TrackLog, format_record};
pub use render::{BoxRenderer, Renderer};
pub use tracker::{AssociationEngine, DeepSortTracker, Detection, TrackView, TrackerConfig};
pub use video::{Frame, FrameSource, MediaBackend, StreamMetadata, VideoInput, VideoSink};
