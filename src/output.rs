//! Per-task output channels: annotated video and the track log.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::lifecycle::VisibleTrack;
use crate::video::{Frame, VideoSink};

/// One log line: `"{frame_idx}: [x1, y1, x2, y2, track_id, class_index]"`.
pub fn format_record(frame_idx: u64, track: &VisibleTrack) -> String {
    let [x1, y1, x2, y2] = track.bbox;
    format!(
        "{frame_idx}: [{x1}, {y1}, {x2}, {y2}, {}, {}]",
        track.track_id, track.class_index
    )
}

/// Line-oriented track log terminated by a `#TIME:` summary.
pub struct TrackLog<W: Write> {
    writer: W,
    path: PathBuf,
}

impl TrackLog<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::output(path, e))?;
        }
        let file = File::create(path).map_err(|e| Error::output(path, e))?;
        Ok(Self::new(BufWriter::new(file), path))
    }
}

impl<W: Write> TrackLog<W> {
    /// Wrap an arbitrary writer; `path` is only used in error reports.
    pub fn new(writer: W, path: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            path: path.into(),
        }
    }

    pub fn write_frame(&mut self, frame_idx: u64, tracks: &[VisibleTrack]) -> Result<()> {
        for track in tracks {
            writeln!(self.writer, "{}", format_record(frame_idx, track))
                .map_err(|e| Error::output(&self.path, e))?;
        }
        Ok(())
    }

    /// Append the `#TIME:` line and flush.
    pub fn finish(&mut self, elapsed: Duration) -> Result<()> {
        write!(self.writer, "#TIME:{}", elapsed.as_secs_f64())
            .and_then(|_| self.writer.flush())
            .map_err(|e| Error::output(&self.path, e))
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Both output channels of one task. Either may be disabled.
pub struct OutputSink<V: VideoSink, W: Write = BufWriter<File>> {
    video: Option<V>,
    log: Option<TrackLog<W>>,
}

impl<V: VideoSink, W: Write> OutputSink<V, W> {
    pub fn new(video: Option<V>, log: Option<TrackLog<W>>) -> Self {
        Self { video, log }
    }

    /// Write the annotated frame, then this frame's log records.
    pub fn write_frame(
        &mut self,
        frame_idx: u64,
        frame: &Frame,
        tracks: &[VisibleTrack],
    ) -> Result<()> {
        if let Some(video) = self.video.as_mut() {
            video.write(frame)?;
        }
        if let Some(log) = self.log.as_mut() {
            log.write_frame(frame_idx, tracks)?;
        }
        Ok(())
    }

    /// Close both channels. The log is finalized even if the video fails.
    pub fn finish(mut self, elapsed: Duration) -> Result<()> {
        let video = match self.video.as_mut() {
            Some(video) => video.finish(),
            None => Ok(()),
        };
        let log = match self.log.as_mut() {
            Some(log) => log.finish(elapsed),
            None => Ok(()),
        };
        video.and(log)
    }
}
