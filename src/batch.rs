//! Sequential batch driver: one full tracking pass per named task.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::classes::ClassTable;
use crate::config::BatchConfig;
use crate::error::{Error, Result, Severity};
use crate::integration::{DetectionPipeline, Detector, FeatureBinder, FeatureEncoder};
use crate::latency::LatencyEstimator;
use crate::lifecycle::TrackLifecycleView;
use crate::output::{OutputSink, TrackLog};
use crate::render::Renderer;
use crate::tracker::AssociationEngine;
use crate::video::{FrameSource, FrameViewer, MediaBackend, NoViewer, VideoInput, ViewerControl};

/// One unit of batch work with its derived paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub name: String,
    pub input: VideoInput,
    pub output_video: Option<PathBuf>,
    pub output_log: Option<PathBuf>,
}

impl Task {
    /// Derive the input and output paths of `name` from the config templates.
    pub fn from_template(name: &str, config: &BatchConfig) -> Result<Self> {
        let input = config
            .render_template(&config.input_template, name)
            .ok_or_else(|| Error::Config("input_template must not be empty".into()))?;
        Ok(Self {
            name: name.to_string(),
            input: VideoInput::File(input),
            output_video: config.render_template(&config.video_template, name),
            output_log: config.render_template(&config.log_template, name),
        })
    }

    /// A live task reading from a camera; outputs follow the templates with
    /// `camera{index}` as the task name.
    pub fn camera(index: i32, config: &BatchConfig) -> Self {
        let name = format!("camera{index}");
        Self {
            output_video: config.render_template(&config.video_template, &name),
            output_log: config.render_template(&config.log_template, &name),
            input: VideoInput::Camera(index),
            name,
        }
    }

    /// Every task of `config`, in order.
    pub fn from_config(config: &BatchConfig) -> Result<Vec<Self>> {
        config
            .tasks
            .iter()
            .map(|name| Self::from_template(name, config))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running { task: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// The stream was exhausted or ended on an unreadable frame.
    Completed,
    /// The viewer asked to stop.
    Interrupted,
    /// A task-level error; outputs stop at the point reached.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub name: String,
    pub frames: u64,
    pub elapsed: Duration,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<TaskOutcome>,
}

impl BatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TaskStatus::Failed(_)))
    }

    pub fn total_frames(&self) -> u64 {
        self.outcomes.iter().map(|o| o.frames).sum()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for o in &self.outcomes {
            let status = match &o.status {
                TaskStatus::Completed => "completed".to_string(),
                TaskStatus::Interrupted => "interrupted".to_string(),
                TaskStatus::Failed(reason) => format!("failed: {reason}"),
            };
            writeln!(
                f,
                "{}: {} frames in {:.2}s, {status}",
                o.name,
                o.frames,
                o.elapsed.as_secs_f64()
            )?;
        }
        Ok(())
    }
}

/// Turn a per-frame error into an end-of-stream, pass anything worse on.
fn end_on_frame_error<T>(task: &str, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.severity() == Severity::Frame => {
            tracing::warn!(task, "ending stream: {e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Drives the tracking pipeline over every task, in order.
///
/// The detector is loaded by the caller and owned here for the whole run.
/// Each task gets a fresh association engine, latency window, timer and set
/// of output handles.
pub struct BatchRunner<D: Detector, R: Renderer> {
    pipeline: DetectionPipeline<D>,
    classes: ClassTable,
    renderer: R,
    viewer: Box<dyn FrameViewer>,
    tasks: Vec<Task>,
    max_staleness: u32,
    fourcc: [char; 4],
    state: RunnerState,
}

impl<D: Detector, R: Renderer> BatchRunner<D, R> {
    pub fn new(detector: D, config: &BatchConfig, classes: ClassTable, renderer: R) -> Result<Self> {
        config.validate()?;
        if detector.input_size() != config.detection.input_size {
            return Err(Error::Config(format!(
                "detector expects {}px input but detection.input_size is {}",
                detector.input_size(),
                config.detection.input_size
            )));
        }
        for name in &config.detection.track_only {
            if classes.index_of(name).is_none() {
                return Err(Error::UnknownClass(name.clone()));
            }
        }
        Ok(Self {
            pipeline: DetectionPipeline::new(detector, config.detection.clone()),
            classes,
            renderer,
            viewer: Box::new(NoViewer),
            tasks: Task::from_config(config)?,
            max_staleness: config.visibility.max_staleness,
            fourcc: config.output.fourcc()?,
            state: RunnerState::Idle,
        })
    }

    /// Replace the task list derived from the config.
    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_viewer(mut self, viewer: Box<dyn FrameViewer>) -> Self {
        self.viewer = viewer;
        self
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    /// Run every task.
    ///
    /// Task-level failures are recorded in the report and the next task
    /// starts. A fatal error stops the run and is returned. The viewer is
    /// closed after every task, however it ended.
    pub fn run<B, E, F, C>(
        &mut self,
        backend: &B,
        mut engine_factory: F,
        encoder: &mut C,
    ) -> Result<BatchReport>
    where
        B: MediaBackend,
        E: AssociationEngine,
        F: FnMut() -> E,
        C: FeatureEncoder + ?Sized,
    {
        let mut report = BatchReport::default();
        for index in 0..self.tasks.len() {
            let task = self.tasks[index].clone();
            self.state = RunnerState::Running {
                task: task.name.clone(),
            };
            tracing::info!(task = %task.name, input = %task.input, "starting task");

            let started = Instant::now();
            let mut frames = 0;
            let result = self.run_task(&task, backend, engine_factory(), encoder, &mut frames);
            self.viewer.close();
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => {
                    tracing::error!(task = %task.name, frames, "stopping batch: {e}");
                    self.state = RunnerState::Idle;
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(task = %task.name, frames, "task aborted: {e}");
                    TaskOutcome {
                        name: task.name.clone(),
                        frames,
                        elapsed: started.elapsed(),
                        status: TaskStatus::Failed(e.to_string()),
                    }
                }
            };
            report.outcomes.push(outcome);
        }
        self.state = RunnerState::Idle;
        Ok(report)
    }

    fn run_task<B, E, C>(
        &mut self,
        task: &Task,
        backend: &B,
        mut engine: E,
        encoder: &mut C,
        frames: &mut u64,
    ) -> Result<TaskOutcome>
    where
        B: MediaBackend,
        E: AssociationEngine,
        C: FeatureEncoder + ?Sized,
    {
        let mut source = backend.open_source(&task.input)?;
        let metadata = source.metadata();
        let video = task
            .output_video
            .as_deref()
            .map(|path| backend.open_sink(path, &metadata, self.fourcc))
            .transpose()?;
        let log = task.output_log.as_deref().map(TrackLog::create).transpose()?;
        let mut sink = OutputSink::new(video, log);

        let lifecycle = TrackLifecycleView::new(&self.classes, self.max_staleness);
        let mut latency = LatencyEstimator::new();
        let mut status = TaskStatus::Completed;
        let started = Instant::now();

        loop {
            let Some(Some(mut frame)) = end_on_frame_error(&task.name, source.read())? else {
                break;
            };
            *frames += 1;
            let frame_idx = *frames;

            let Some(detected) =
                end_on_frame_error(&task.name, self.pipeline.detect(&frame, &self.classes))?
            else {
                break;
            };
            latency.record(detected.inference);

            let Some(detections) = end_on_frame_error(
                &task.name,
                FeatureBinder::bind(encoder, &frame, &detected.detections),
            )?
            else {
                break;
            };

            engine.predict();
            engine.update(&detections);
            let visible = lifecycle.visible(engine.tracks())?;

            self.renderer.draw(&mut frame, &visible, &self.classes);
            if let Some(fps) = latency.fps() {
                self.renderer.draw_status(&mut frame, fps);
            }
            sink.write_frame(frame_idx, &frame, &visible)?;

            tracing::debug!(
                task = %task.name,
                frame = frame_idx,
                detections = detections.len(),
                tracks = engine.tracks().len(),
                visible = visible.len(),
                fps = latency.fps().unwrap_or_default(),
                "frame processed"
            );

            if end_on_frame_error(&task.name, self.viewer.show(&frame))?
                == Some(ViewerControl::Abort)
            {
                tracing::info!(task = %task.name, frame = frame_idx, "aborted from viewer");
                status = TaskStatus::Interrupted;
                break;
            }
        }

        let elapsed = started.elapsed();
        sink.finish(elapsed)?;
        tracing::info!(
            task = %task.name,
            frames = *frames,
            elapsed_s = elapsed.as_secs_f64(),
            "total time"
        );

        Ok(TaskOutcome {
            name: task.name.clone(),
            frames: *frames,
            elapsed,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_task_paths_from_templates() {
        let config = BatchConfig {
            base_path: PathBuf::from("/videos"),
            tasks: vec!["MOT16-13".into(), "news".into()],
            ..Default::default()
        };
        let tasks = Task::from_config(&config).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].name, "MOT16-13");
        assert_eq!(
            tasks[0].input,
            VideoInput::File(PathBuf::from("/videos/MOT16-13/MOT16-13.mp4"))
        );
        assert_eq!(
            tasks[1].output_video.as_deref(),
            Some(Path::new("/videos/news/tracked-yolo-0.2.mp4"))
        );
        assert_eq!(
            tasks[1].output_log.as_deref(),
            Some(Path::new("/videos/news/tracked-yolo-0.2.txt"))
        );
    }

    #[test]
    fn test_disabled_channels_and_camera_task() {
        let config = BatchConfig {
            video_template: String::new(),
            ..Default::default()
        };
        let task = Task::camera(0, &config);
        assert_eq!(task.name, "camera0");
        assert_eq!(task.input, VideoInput::Camera(0));
        assert!(task.output_video.is_none());
        assert!(task.output_log.is_some());
    }

    #[test]
    fn test_empty_input_template_is_rejected() {
        let config = BatchConfig {
            input_template: String::new(),
            tasks: vec!["a".into()],
            ..Default::default()
        };
        assert!(Task::from_config(&config).unwrap_err().is_fatal());
    }

    #[test]
    fn test_report_display() {
        let report = BatchReport {
            outcomes: vec![
                TaskOutcome {
                    name: "a".into(),
                    frames: 0,
                    elapsed: Duration::ZERO,
                    status: TaskStatus::Failed("no input".into()),
                },
                TaskOutcome {
                    name: "b".into(),
                    frames: 3,
                    elapsed: Duration::from_millis(250),
                    status: TaskStatus::Completed,
                },
            ],
        };
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.total_frames(), 3);
        assert_eq!(
            report.to_string(),
            "a: 0 frames in 0.00s, failed: no input\nb: 3 frames in 0.25s, completed\n"
        );
    }
}
