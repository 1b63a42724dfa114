//! Crate error type and its severity taxonomy.

use std::path::PathBuf;

use thiserror::Error;

/// How far an error propagates through a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Ends the current frame loop; outputs are finalized and the task completes.
    Frame,
    /// Aborts the current task; the runner advances to the next one.
    Task,
    /// Stops the whole run.
    Fatal,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The frame could not be read or decoded.
    #[error("unreadable frame: {0}")]
    Frame(String),

    /// The detector failed on a frame.
    #[error("detector failure: {0}")]
    Detector(String),

    /// The feature encoder failed on a frame.
    #[error("feature encoder failure: {0}")]
    Encoder(String),

    /// The input stream could not be opened.
    #[error("cannot open input {input}: {reason}")]
    OpenInput { input: String, reason: String },

    /// An output channel could not be created or written.
    #[error("failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The video encoder rejected a frame or could not be opened.
    #[error("video output {}: {reason}", path.display())]
    VideoOutput { path: PathBuf, reason: String },

    #[error("feature encoder returned {embeddings} embeddings for {detections} detections")]
    EmbeddingMismatch { detections: usize, embeddings: usize },

    #[error("class `{0}` is not in the class table")]
    UnknownClass(String),

    #[error("class id {0} is outside the class table")]
    UnknownClassId(usize),

    /// A model artifact could not be loaded.
    #[error("cannot load model {}: {reason}", path.display())]
    Model { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot read {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Frame(_) | Self::Detector(_) | Self::Encoder(_) => Severity::Frame,
            Self::OpenInput { .. } | Self::Output { .. } | Self::VideoOutput { .. } => {
                Severity::Task
            }
            Self::EmbeddingMismatch { .. }
            | Self::UnknownClass(_)
            | Self::UnknownClassId(_)
            | Self::Model { .. }
            | Self::Config(_)
            | Self::ReadConfig { .. }
            | Self::ParseConfig { .. } => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub(crate) fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Output {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
