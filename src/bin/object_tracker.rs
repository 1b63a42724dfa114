use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use object_tracker_rs::integration::{OnnxDetector, OnnxFeatureEncoder};
use object_tracker_rs::{BatchConfig, BatchRunner, BoxRenderer, ClassTable, DeepSortTracker, Task};

const ENCODER_BATCH: usize = 32;

/// Track objects through every video of a batch and write annotated videos
/// plus per-frame track logs.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON batch configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the base directory of the path templates
    #[arg(long)]
    base_path: Option<PathBuf>,

    /// Task to run (repeatable); replaces the configured list
    #[arg(short, long = "task")]
    tasks: Vec<String>,

    /// Track a live camera instead of the task list
    #[arg(long)]
    camera: Option<i32>,

    /// Preview annotated frames; press `q` to skip to the next task
    #[arg(long)]
    show: bool,

    /// Log per-frame details
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "object_tracker_rs=debug,object_tracker=debug"
    } else {
        "object_tracker_rs=info,object_tracker=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &Args) -> anyhow::Result<BatchConfig> {
    let mut config = match &args.config {
        Some(path) => BatchConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BatchConfig::default(),
    };
    if let Some(base) = &args.base_path {
        config.base_path = base.clone();
    }
    if !args.tasks.is_empty() {
        config.tasks = args.tasks.clone();
    }
    config.show |= args.show;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let config = load_config(&args)?;

    if config.tasks.is_empty() && args.camera.is_none() {
        bail!("no tasks configured; pass --task, --camera or a config with `tasks`");
    }

    let classes = match &config.models.classes {
        Some(path) => ClassTable::from_names_file(path)
            .with_context(|| format!("loading class names from {}", path.display()))?,
        None => ClassTable::coco(),
    };

    let detector_path = config
        .models
        .detector
        .as_ref()
        .context("models.detector is not set")?;
    let encoder_path = config
        .models
        .encoder
        .as_ref()
        .context("models.encoder is not set")?;
    let detector = OnnxDetector::load(detector_path, config.detection.input_size)?;
    let mut encoder = OnnxFeatureEncoder::load(encoder_path, ENCODER_BATCH)?;

    let mut renderer = BoxRenderer::new(classes.len());
    if let Some(font) = &config.models.font {
        renderer = renderer.with_font_file(font)?;
    }

    let mut runner = BatchRunner::new(detector, &config, classes, renderer)?;
    if let Some(index) = args.camera {
        runner = runner.with_tasks(vec![Task::camera(index, &config)]);
    }

    let tracking = config.tracking.tracker_config();
    let engine = || DeepSortTracker::new(tracking.clone());

    #[cfg(feature = "opencv")]
    let report = {
        use object_tracker_rs::video::{HighGuiViewer, OpenCvBackend};
        if config.show {
            runner = runner.with_viewer(Box::new(HighGuiViewer::new()));
        }
        runner.run(&OpenCvBackend, engine, &mut encoder)?
    };

    #[cfg(not(feature = "opencv"))]
    let report = {
        use object_tracker_rs::video::ImageSequenceBackend;
        if config.show {
            tracing::warn!("preview needs the `opencv` feature; ignoring --show");
        }
        let backend = ImageSequenceBackend::new(config.output.fallback_fps);
        runner.run(&backend, engine, &mut encoder)?
    };

    print!("{report}");
    let failed = report.failed().count();
    if failed > 0 {
        bail!("{failed} of {} tasks failed", report.outcomes.len());
    }
    Ok(())
}
