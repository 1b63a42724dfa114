//! Raw detector output to candidate boxes: rescaling, score filtering and
//! non-maximum suppression.

use std::collections::BTreeMap;

use ndarray::ArrayView2;

use crate::integration::preprocess::Letterbox;

/// Candidate box in original-frame corner coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub class_id: usize,
}

impl RawDetection {
    #[inline]
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1) * (self.y2 - self.y1)
    }

    pub fn iou(&self, other: &RawDetection) -> f32 {
        let inter_w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let inter_h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = inter_w * inter_h;
        let union = self.area() + other.area() - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }
}

/// Decode candidate rows into boxes on the original frame.
///
/// Each row is `[cx, cy, w, h, objectness, class probabilities...]` in
/// model-input pixels. Boxes are mapped back through the letterbox, clipped
/// to the frame, and kept when `objectness * best class probability`
/// exceeds `score_threshold`. Inverted or zero-area boxes are dropped.
pub fn postprocess_boxes(
    candidates: ArrayView2<'_, f32>,
    frame_size: (u32, u32),
    input_size: u32,
    score_threshold: f32,
) -> Vec<RawDetection> {
    let (org_w, org_h) = frame_size;
    let geometry = Letterbox::for_frame(org_w, org_h, input_size);
    let max_x = org_w.saturating_sub(1) as f32;
    let max_y = org_h.saturating_sub(1) as f32;

    let mut out = Vec::new();
    for row in candidates.rows() {
        if row.len() < 6 {
            continue;
        }
        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let (x1, y1) = geometry.invert(cx - w * 0.5, cy - h * 0.5);
        let (x2, y2) = geometry.invert(cx + w * 0.5, cy + h * 0.5);
        let (x1, y1) = (x1.max(0.0), y1.max(0.0));
        let (x2, y2) = (x2.min(max_x), y2.min(max_y));
        if x1 > x2 || y1 > y2 {
            continue;
        }
        if (x2 - x1) * (y2 - y1) <= 0.0 {
            continue;
        }

        let Some((class_id, prob)) = row.iter().skip(5).copied().enumerate().fold(
            None,
            |best: Option<(usize, f32)>, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            },
        ) else {
            continue;
        };
        let score = row[4] * prob;
        if score > score_threshold {
            out.push(RawDetection {
                x1,
                y1,
                x2,
                y2,
                score,
                class_id,
            });
        }
    }
    out
}

/// Suppression strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NmsMethod {
    /// Drop boxes overlapping a kept box by more than the IoU threshold.
    Hard,
    /// Decay overlapping scores by `exp(-iou^2 / sigma)`.
    Soft { sigma: f32 },
}

/// Per-class non-maximum suppression.
///
/// Classes are processed in ascending id order; within a class the output is
/// in descending score order.
pub fn nms(boxes: Vec<RawDetection>, iou_threshold: f32, method: NmsMethod) -> Vec<RawDetection> {
    let mut by_class: BTreeMap<usize, Vec<RawDetection>> = BTreeMap::new();
    for b in boxes {
        by_class.entry(b.class_id).or_default().push(b);
    }

    let mut kept = Vec::new();
    for (_, mut remaining) in by_class {
        while !remaining.is_empty() {
            let mut best_idx = 0;
            for (i, b) in remaining.iter().enumerate() {
                if b.score > remaining[best_idx].score {
                    best_idx = i;
                }
            }
            let best = remaining.remove(best_idx);

            for b in remaining.iter_mut() {
                let iou = best.iou(b);
                let weight = match method {
                    NmsMethod::Hard => {
                        if iou > iou_threshold {
                            0.0
                        } else {
                            1.0
                        }
                    }
                    NmsMethod::Soft { sigma } => (-(iou * iou) / sigma).exp(),
                };
                b.score *= weight;
            }
            remaining.retain(|b| b.score > 0.0);
            kept.push(best);
        }
    }
    kept
}
