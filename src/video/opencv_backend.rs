//! OpenCV capture, encoding and preview.

use std::path::{Path, PathBuf};

use opencv::core::{AlgorithmHint, CV_8UC3, Mat, Mat_AUTO_STEP, Size};
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture, VideoWriter};
use opencv::{highgui, imgproc};

use super::{
    Frame, FrameSource, FrameViewer, MediaBackend, StreamMetadata, VideoInput, VideoSink,
    ViewerControl,
};
use crate::error::{Error, Result};

const WINDOW_NAME: &str = "output";

fn rgb_to_bgr_mat(frame: &Frame) -> opencv::Result<Mat> {
    let (width, height) = frame.dimensions();
    // SAFETY: the Mat borrows `frame`'s buffer only until cvt_color has copied
    // it into `bgr`, and CV_8UC3 with AUTO_STEP matches the RgbImage layout.
    let rgb = unsafe {
        Mat::new_rows_cols_with_data_unsafe(
            height as i32,
            width as i32,
            CV_8UC3,
            frame.as_raw().as_ptr() as *mut _,
            Mat_AUTO_STEP,
        )
    }?;
    let mut bgr = Mat::default();
    imgproc::cvt_color(
        &rgb,
        &mut bgr,
        imgproc::COLOR_RGB2BGR,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    Ok(bgr)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvBackend;

impl MediaBackend for OpenCvBackend {
    type Source = OpenCvSource;
    type Sink = OpenCvSink;

    fn open_source(&self, input: &VideoInput) -> Result<Self::Source> {
        OpenCvSource::open(input)
    }

    fn open_sink(
        &self,
        path: &Path,
        metadata: &StreamMetadata,
        fourcc: [char; 4],
    ) -> Result<Self::Sink> {
        OpenCvSink::create(path, metadata, fourcc)
    }
}

pub struct OpenCvSource {
    capture: VideoCapture,
    metadata: StreamMetadata,
    input: String,
}

impl OpenCvSource {
    pub fn open(input: &VideoInput) -> Result<Self> {
        let name = input.to_string();
        let open_err = |reason: String| Error::OpenInput {
            input: name.clone(),
            reason,
        };
        let capture = match input {
            VideoInput::File(path) => {
                VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)
            }
            VideoInput::Camera(index) => VideoCapture::new(*index, videoio::CAP_ANY),
        }
        .map_err(|e| open_err(e.to_string()))?;
        if !capture.is_opened().map_err(|e| open_err(e.to_string()))? {
            return Err(open_err("capture did not open".into()));
        }

        let prop = |id| capture.get(id).map_err(|e| open_err(e.to_string()));
        let metadata = StreamMetadata {
            width: prop(videoio::CAP_PROP_FRAME_WIDTH)? as u32,
            height: prop(videoio::CAP_PROP_FRAME_HEIGHT)? as u32,
            fps: prop(videoio::CAP_PROP_FPS)?,
        };
        tracing::debug!(input = %name, ?metadata, "opened capture");
        Ok(Self {
            capture,
            metadata,
            input: name,
        })
    }
}

impl FrameSource for OpenCvSource {
    fn metadata(&self) -> StreamMetadata {
        self.metadata
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        let frame_err = |e: opencv::Error| Error::Frame(format!("{}: {e}", self.input));
        let mut bgr = Mat::default();
        if !self.capture.read(&mut bgr).map_err(frame_err)? || bgr.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(
            &bgr,
            &mut rgb,
            imgproc::COLOR_BGR2RGB,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(frame_err)?;
        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let data = rgb.data_bytes().map_err(frame_err)?.to_vec();
        Frame::from_raw(width, height, data)
            .map(Some)
            .ok_or_else(|| Error::Frame(format!("{}: truncated frame buffer", self.input)))
    }
}

pub struct OpenCvSink {
    writer: VideoWriter,
    path: PathBuf,
}

impl OpenCvSink {
    pub fn create(path: &Path, metadata: &StreamMetadata, fourcc: [char; 4]) -> Result<Self> {
        let video_err = |e: opencv::Error| Error::VideoOutput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let [a, b, c, d] = fourcc;
        let code = VideoWriter::fourcc(a, b, c, d).map_err(video_err)?;
        let writer = VideoWriter::new(
            &path.to_string_lossy(),
            code,
            metadata.fps,
            Size::new(metadata.width as i32, metadata.height as i32),
            true,
        )
        .map_err(video_err)?;
        if !writer.is_opened().map_err(video_err)? {
            return Err(Error::VideoOutput {
                path: path.to_path_buf(),
                reason: "writer did not open".into(),
            });
        }
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }
}

impl VideoSink for OpenCvSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        let video_err = |e: opencv::Error| Error::VideoOutput {
            path: self.path.clone(),
            reason: e.to_string(),
        };
        let bgr = rgb_to_bgr_mat(frame).map_err(video_err)?;
        self.writer.write(&bgr).map_err(video_err)
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.release().map_err(|e| Error::VideoOutput {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

/// HighGUI preview window. Pressing `q` aborts the current task.
#[derive(Debug, Default)]
pub struct HighGuiViewer {
    open: bool,
}

impl HighGuiViewer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameViewer for HighGuiViewer {
    fn show(&mut self, frame: &Frame) -> Result<ViewerControl> {
        let display_err = |e: opencv::Error| Error::Frame(format!("preview: {e}"));
        if !self.open {
            highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE).map_err(display_err)?;
            self.open = true;
        }
        let bgr = rgb_to_bgr_mat(frame).map_err(display_err)?;
        highgui::imshow(WINDOW_NAME, &bgr).map_err(display_err)?;
        let key = highgui::wait_key(25).map_err(display_err)?;
        if key & 0xFF == 'q' as i32 {
            return Ok(ViewerControl::Abort);
        }
        Ok(ViewerControl::Continue)
    }

    fn close(&mut self) {
        if self.open {
            if let Err(e) = highgui::destroy_all_windows() {
                tracing::warn!("failed to close preview: {e}");
            }
            self.open = false;
        }
    }
}
