//! Frame capture, video encoding and the optional preview window.
//!
//! The batch runner only sees the [`MediaBackend`] trait. Two backends ship
//! with the crate: [`ImageSequenceBackend`], which reads and writes numbered
//! image files, and (with the `opencv` feature) `OpenCvBackend` for video
//! files and cameras.

mod image_sequence;
#[cfg(feature = "opencv")]
mod opencv_backend;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use image_sequence::{ImageSequenceBackend, ImageSequenceSink, ImageSequenceSource};
#[cfg(feature = "opencv")]
pub use opencv_backend::{HighGuiViewer, OpenCvBackend, OpenCvSink, OpenCvSource};

/// An RGB frame. Capture backends convert from their native channel order
/// exactly once.
pub type Frame = image::RgbImage;

/// Native stream properties, queried once when the source is opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Where a task reads its frames from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoInput {
    File(PathBuf),
    Camera(i32),
}

impl fmt::Display for VideoInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Camera(index) => write!(f, "camera {index}"),
        }
    }
}

pub trait FrameSource {
    fn metadata(&self) -> StreamMetadata;

    /// Next frame in capture order, `None` at end of stream.
    fn read(&mut self) -> Result<Option<Frame>>;
}

pub trait VideoSink {
    /// Append one frame. Frames are encoded in call order.
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the stream.
    fn finish(&mut self) -> Result<()>;
}

/// Opens per-task capture and encoding handles.
pub trait MediaBackend {
    type Source: FrameSource;
    type Sink: VideoSink;

    fn open_source(&self, input: &VideoInput) -> Result<Self::Source>;

    fn open_sink(
        &self,
        path: &Path,
        metadata: &StreamMetadata,
        fourcc: [char; 4],
    ) -> Result<Self::Sink>;
}

impl<B: MediaBackend + ?Sized> MediaBackend for &B {
    type Source = B::Source;
    type Sink = B::Sink;

    fn open_source(&self, input: &VideoInput) -> Result<Self::Source> {
        (**self).open_source(input)
    }

    fn open_sink(
        &self,
        path: &Path,
        metadata: &StreamMetadata,
        fourcc: [char; 4],
    ) -> Result<Self::Sink> {
        (**self).open_sink(path, metadata, fourcc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerControl {
    Continue,
    /// Stop the current task.
    Abort,
}

/// Interactive preview of annotated frames.
pub trait FrameViewer {
    fn show(&mut self, frame: &Frame) -> Result<ViewerControl>;
    fn close(&mut self);
}

/// Viewer used when preview is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoViewer;

impl FrameViewer for NoViewer {
    fn show(&mut self, _frame: &Frame) -> Result<ViewerControl> {
        Ok(ViewerControl::Continue)
    }

    fn close(&mut self) {}
}
