//! Annotation of frames with track boxes, labels and the FPS overlay.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect as PixelRect;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::classes::ClassTable;
use crate::error::{Error, Result};
use crate::lifecycle::VisibleTrack;
use crate::video::Frame;

const PALETTE_SEED: u64 = 0;
const LABEL_TEXT: Rgb<u8> = Rgb([0, 0, 0]);
const STATUS_TEXT: Rgb<u8> = Rgb([255, 0, 0]);

pub trait Renderer {
    fn draw(&self, frame: &mut Frame, tracks: &[VisibleTrack], classes: &ClassTable);

    /// Overlay the smoothed throughput. No-op by default.
    fn draw_status(&self, _frame: &mut Frame, _fps: f64) {}
}

/// Fully saturated colour at `hue` in `[0, 1)`.
fn hue_to_rgb(hue: f32) -> Rgb<u8> {
    let h = (hue.fract() * 6.0).max(0.0);
    let sector = h.floor() as u32;
    let f = h - h.floor();
    let (q, t) = (1.0 - f, f);
    let (r, g, b) = match sector {
        0 => (1.0, t, 0.0),
        1 => (q, 1.0, 0.0),
        2 => (0.0, 1.0, t),
        3 => (0.0, q, 1.0),
        4 => (t, 0.0, 1.0),
        _ => (1.0, 0.0, q),
    };
    Rgb([(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8])
}

/// Draws one rectangle per track with a filled `"{class} {id}"` label.
///
/// Labels and the status line need a font; without one only boxes are drawn.
pub struct BoxRenderer {
    palette: Vec<Rgb<u8>>,
    font: Option<FontVec>,
}

impl BoxRenderer {
    pub fn new(num_classes: usize) -> Self {
        let n = num_classes.max(1);
        let mut palette: Vec<Rgb<u8>> = (0..n).map(|i| hue_to_rgb(i as f32 / n as f32)).collect();
        palette.shuffle(&mut StdRng::seed_from_u64(PALETTE_SEED));
        Self {
            palette,
            font: None,
        }
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_font_file(self, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| Error::Model {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(self.with_font(font))
    }

    pub fn color(&self, class_index: usize) -> Rgb<u8> {
        self.palette[class_index % self.palette.len()]
    }

    /// Line thickness for a frame of this size.
    pub fn thickness(width: u32, height: u32) -> u32 {
        ((0.6 * (width + height) as f32 / 1000.0) as u32).max(1)
    }
}

impl Renderer for BoxRenderer {
    fn draw(&self, frame: &mut Frame, tracks: &[VisibleTrack], classes: &ClassTable) {
        let (width, height) = frame.dimensions();
        let thick = Self::thickness(width, height);
        let scale = PxScale::from(18.0 * thick as f32);

        for track in tracks {
            let color = self.color(track.class_index);
            let [x1, y1, x2, y2] = track.bbox;
            let (x1, y1) = (x1 as i32, y1 as i32);
            let w = (x2 as i32 - x1).max(1) as u32;
            let h = (y2 as i32 - y1).max(1) as u32;
            for k in 0..thick {
                let inset = k as i32;
                if w <= 2 * k || h <= 2 * k {
                    break;
                }
                let rect = PixelRect::at(x1 + inset, y1 + inset).of_size(w - 2 * k, h - 2 * k);
                draw_hollow_rect_mut(frame, rect, color);
            }

            let Some(font) = &self.font else {
                continue;
            };
            let label = format!(
                "{} {}",
                classes.name_of(track.class_index).unwrap_or("?"),
                track.track_id
            );
            let (tw, th) = text_size(scale, font, &label);
            let top = (y1 - th as i32 - 2 * thick as i32).max(0);
            let background = PixelRect::at(x1, top).of_size(tw.max(1), th + 2 * thick);
            draw_filled_rect_mut(frame, background, color);
            draw_text_mut(frame, LABEL_TEXT, x1, top + thick as i32, scale, font, &label);
        }
    }

    fn draw_status(&self, frame: &mut Frame, fps: f64) {
        if let Some(font) = &self.font {
            let text = format!("Time: {fps:.1} FPS");
            draw_text_mut(frame, STATUS_TEXT, 0, 10, PxScale::from(24.0), font, &text);
        }
    }
}
