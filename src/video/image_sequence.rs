use std::fs;
use std::path::{Path, PathBuf};

use super::{Frame, FrameSource, MediaBackend, StreamMetadata, VideoInput, VideoSink};
use crate::error::{Error, Result};

const EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Reads a directory of image files as a video, in file-name order, and
/// writes annotated frames back as `000001.png`, `000002.png`, ...
#[derive(Debug, Clone)]
pub struct ImageSequenceBackend {
    fps: f64,
}

impl ImageSequenceBackend {
    /// Image files carry no frame rate; `fps` is reported for every source.
    pub fn new(fps: f64) -> Self {
        Self { fps }
    }
}

impl MediaBackend for ImageSequenceBackend {
    type Source = ImageSequenceSource;
    type Sink = ImageSequenceSink;

    fn open_source(&self, input: &VideoInput) -> Result<Self::Source> {
        match input {
            VideoInput::File(path) => ImageSequenceSource::open(path, self.fps),
            VideoInput::Camera(_) => Err(Error::OpenInput {
                input: input.to_string(),
                reason: "cameras need the opencv backend".into(),
            }),
        }
    }

    fn open_sink(
        &self,
        path: &Path,
        _metadata: &StreamMetadata,
        _fourcc: [char; 4],
    ) -> Result<Self::Sink> {
        ImageSequenceSink::create(path)
    }
}

pub struct ImageSequenceSource {
    files: std::vec::IntoIter<PathBuf>,
    metadata: StreamMetadata,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self> {
        let open_err = |reason: String| Error::OpenInput {
            input: dir.display().to_string(),
            reason,
        };
        let entries = fs::read_dir(dir).map_err(|e| open_err(e.to_string()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| open_err(e.to_string()))?.path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        let (width, height) = match files.first() {
            Some(first) => image::image_dimensions(first).map_err(|e| open_err(e.to_string()))?,
            None => (0, 0),
        };
        tracing::debug!(dir = %dir.display(), frames = files.len(), width, height, "opened image sequence");

        Ok(Self {
            files: files.into_iter(),
            metadata: StreamMetadata { width, height, fps },
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn metadata(&self) -> StreamMetadata {
        self.metadata
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.next() else {
            return Ok(None);
        };
        let image = image::open(&path)
            .map_err(|e| Error::Frame(format!("{}: {e}", path.display())))?;
        Ok(Some(image.to_rgb8()))
    }
}

pub struct ImageSequenceSink {
    dir: PathBuf,
    written: usize,
}

impl ImageSequenceSink {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| Error::output(dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn frames_written(&self) -> usize {
        self.written
    }
}

impl VideoSink for ImageSequenceSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        self.written += 1;
        let path = self.dir.join(format!("{:06}.png", self.written));
        frame.save(&path).map_err(|e| Error::VideoOutput {
            path,
            reason: e.to_string(),
        })
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_reads_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(8, 6, Rgb([2, 0, 0])).save(dir.path().join("b.png")).unwrap();
        RgbImage::from_pixel(8, 6, Rgb([1, 0, 0])).save(dir.path().join("a.png")).unwrap();
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let backend = ImageSequenceBackend::new(30.0);
        let mut source = backend
            .open_source(&VideoInput::File(dir.path().to_path_buf()))
            .unwrap();
        assert_eq!(
            source.metadata(),
            StreamMetadata {
                width: 8,
                height: 6,
                fps: 30.0
            }
        );
        assert_eq!(source.read().unwrap().unwrap().get_pixel(0, 0)[0], 1);
        assert_eq!(source.read().unwrap().unwrap().get_pixel(0, 0)[0], 2);
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_missing_directory_is_task_error() {
        let backend = ImageSequenceBackend::new(25.0);
        let err = backend
            .open_source(&VideoInput::File(PathBuf::from("/nonexistent/frames")))
            .err()
            .unwrap();
        assert_eq!(err.severity(), crate::error::Severity::Task);
    }

    #[test]
    fn test_sink_numbers_frames() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut sink = ImageSequenceSink::create(&out).unwrap();
        sink.write(&RgbImage::new(4, 4)).unwrap();
        sink.write(&RgbImage::new(4, 4)).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.frames_written(), 2);
        assert!(out.join("000002.png").exists());
    }
}
