//! Association cost matrices and assignment for the DeepSORT-style tracker.

use ndarray::{Array1, Array2};

use crate::tracker::kalman_filter::{CHI2INV95_4DOF, KalmanFilter};
use crate::tracker::rect::Rect;
use crate::tracker::track::Track;

/// Cost assigned to pairs that must never be matched.
pub const INFTY_COST: f32 = 1e5;

/// Association-ready detection: a box, its class and its appearance embedding.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Bounding box in TLWH format (x, y, width, height)
    pub tlwh: Rect,
    /// Detector confidence score
    pub confidence: f32,
    pub class_name: String,
    /// Appearance embedding from the feature encoder
    pub feature: Array1<f32>,
}

impl Detection {
    pub fn new(tlwh: Rect, confidence: f32, class_name: impl Into<String>, feature: Array1<f32>) -> Self {
        Self {
            tlwh,
            confidence,
            class_name: class_name.into(),
            feature,
        }
    }

    #[inline]
    pub fn to_xyah(&self) -> [f64; 4] {
        self.tlwh.to_xyah()
    }

    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        self.tlwh.to_tlbr()
    }
}

/// Result of an assignment, expressed in the caller's track/detection indices.
#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Solve the rectangular assignment problem on `cost_matrix` and reject pairs
/// whose cost exceeds `thresh`. Indices are local to the matrix.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);
    for ((i, j), &cost) in cost_matrix.indexed_iter() {
        padded[[i, j]] = cost as f64;
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut detection_free = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row, &col) in row_to_col.iter().enumerate().take(num_rows) {
                if col < num_cols && cost_matrix[[row, col]] <= thresh {
                    matches.push((row, col));
                    detection_free[col] = false;
                } else {
                    unmatched_tracks.push(row);
                }
            }
        }
        Err(err) => {
            tracing::warn!(?err, "assignment solver failed; leaving all pairs unmatched");
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections = detection_free
        .iter()
        .enumerate()
        .filter_map(|(i, &free)| free.then_some(i))
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

/// `1 - IoU` between the selected tracks and detections.
///
/// Tracks that missed more than one frame are excluded with [`INFTY_COST`],
/// their predicted box no longer being reliable for overlap matching.
pub fn iou_cost(
    tracks: &[Track],
    detections: &[Detection],
    track_indices: &[usize],
    detection_indices: &[usize],
) -> Array2<f32> {
    let mut cost = Array2::zeros((track_indices.len(), detection_indices.len()));
    for (row, &ti) in track_indices.iter().enumerate() {
        let track = &tracks[ti];
        if track.time_since_update > 1 {
            cost.row_mut(row).fill(INFTY_COST);
            continue;
        }
        let bbox = track.to_tlwh();
        for (col, &di) in detection_indices.iter().enumerate() {
            cost[[row, col]] = 1.0 - bbox.iou(&detections[di].tlwh);
        }
    }
    cost
}

/// Overwrite costs of pairs that fail the Mahalanobis motion gate.
pub fn gate_cost_matrix(
    kf: &KalmanFilter,
    cost: &mut Array2<f32>,
    tracks: &[Track],
    detections: &[Detection],
    track_indices: &[usize],
    detection_indices: &[usize],
) {
    let measurements: Vec<[f64; 4]> = detection_indices
        .iter()
        .map(|&i| detections[i].to_xyah())
        .collect();
    for (row, &ti) in track_indices.iter().enumerate() {
        let track = &tracks[ti];
        let distances = kf.gating_distance(&track.mean, &track.covariance, &measurements);
        for (col, d) in distances.into_iter().enumerate() {
            if d > CHI2INV95_4DOF {
                cost[[row, col]] = INFTY_COST;
            }
        }
    }
}

/// Minimum-cost matching between a subset of tracks and detections.
pub fn min_cost_matching<F>(
    cost_fn: &F,
    max_distance: f32,
    tracks: &[Track],
    detections: &[Detection],
    track_indices: &[usize],
    detection_indices: &[usize],
) -> AssignmentResult
where
    F: Fn(&[Track], &[Detection], &[usize], &[usize]) -> Array2<f32>,
{
    if track_indices.is_empty() || detection_indices.is_empty() {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: track_indices.to_vec(),
            unmatched_detections: detection_indices.to_vec(),
        };
    }

    let mut cost = cost_fn(tracks, detections, track_indices, detection_indices);
    cost.mapv_inplace(|c| if c > max_distance { max_distance + 1e-5 } else { c });

    let local = linear_assignment(&cost, max_distance);
    AssignmentResult {
        matches: local
            .matches
            .into_iter()
            .map(|(r, c)| (track_indices[r], detection_indices[c]))
            .collect(),
        unmatched_tracks: local
            .unmatched_tracks
            .into_iter()
            .map(|r| track_indices[r])
            .collect(),
        unmatched_detections: local
            .unmatched_detections
            .into_iter()
            .map(|c| detection_indices[c])
            .collect(),
    }
}

/// Match in rounds of increasing track age: tracks updated most recently get
/// first pick of the detections.
pub fn matching_cascade<F>(
    cost_fn: &F,
    max_distance: f32,
    cascade_depth: u32,
    tracks: &[Track],
    detections: &[Detection],
    track_indices: &[usize],
    detection_indices: &[usize],
) -> AssignmentResult
where
    F: Fn(&[Track], &[Detection], &[usize], &[usize]) -> Array2<f32>,
{
    let mut unmatched_detections = detection_indices.to_vec();
    let mut matches = Vec::new();

    for level in 0..cascade_depth {
        if unmatched_detections.is_empty() {
            break;
        }
        let level_tracks: Vec<usize> = track_indices
            .iter()
            .copied()
            .filter(|&k| tracks[k].time_since_update == level + 1)
            .collect();
        if level_tracks.is_empty() {
            continue;
        }

        let round = min_cost_matching(
            cost_fn,
            max_distance,
            tracks,
            detections,
            &level_tracks,
            &unmatched_detections,
        );
        matches.extend(round.matches);
        unmatched_detections = round.unmatched_detections;
    }

    let unmatched_tracks = track_indices
        .iter()
        .copied()
        .filter(|k| !matches.iter().any(|(t, _)| t == k))
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}
