//! Letterbox preprocessing into the detector's square input.

use image::imageops::{self, FilterType};
use ndarray::Array4;

use crate::video::Frame;

/// Grey used to pad the letterboxed canvas.
const PAD_VALUE: f32 = 128.0 / 255.0;

/// Geometry of a letterbox transform, needed to map boxes back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Same geometry as applied by [`letterbox`], in floating point.
    pub fn for_frame(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        Self {
            scale,
            pad_x: (size as f32 - scale * width as f32) / 2.0,
            pad_y: (size as f32 - scale * height as f32) / 2.0,
        }
    }

    /// Map a model-input coordinate pair back to the original frame.
    #[inline]
    pub fn invert(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Resize `frame` to fit a `size`x`size` canvas keeping its aspect ratio,
/// centre it on grey, and normalise to `[0, 1]`.
///
/// Returns an NHWC batch of one.
pub fn letterbox(frame: &Frame, size: u32) -> Array4<f32> {
    let (w, h) = frame.dimensions();
    let scale = (size as f32 / w as f32).min(size as f32 / h as f32);
    let nw = ((scale * w as f32) as u32).clamp(1, size);
    let nh = ((scale * h as f32) as u32).clamp(1, size);
    let resized = imageops::resize(frame, nw, nh, FilterType::Triangle);

    let side = size as usize;
    let dx = ((size - nw) / 2) as usize;
    let dy = ((size - nh) / 2) as usize;

    let mut batch = Array4::from_elem((1, side, side, 3), PAD_VALUE);
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            batch[[0, y as usize + dy, x as usize + dx, c]] = pixel[c] as f32 / 255.0;
        }
    }
    batch
}
