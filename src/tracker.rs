//! Association engine: the component that turns per-frame detections into
//! persistent tracks.
//!
//! The orchestration core only depends on [`AssociationEngine`] and
//! [`TrackView`]. [`DeepSortTracker`] is the bundled implementation: Kalman
//! motion prediction, nearest-neighbour appearance matching in a cascade and
//! an IoU fallback, all solved with `lapjv`.

mod deep_sort;
mod kalman_filter;
mod matching;
mod nn_matching;
mod rect;
mod track;
mod track_state;

pub use deep_sort::{DeepSortTracker, TrackerConfig};
pub use kalman_filter::{CHI2INV95_4DOF, KalmanFilter};
pub use matching::{AssignmentResult, Detection, INFTY_COST};
pub use nn_matching::{DistanceMetric, NearestNeighborDistanceMetric};
pub use rect::Rect;
pub use track::Track;
pub use track_state::TrackState;

/// Read-only projection of a track, as far as output is concerned.
pub trait TrackView {
    /// Persistent identity, never reused within one engine instance.
    fn track_id(&self) -> u64;
    fn class_name(&self) -> &str;
    fn is_confirmed(&self) -> bool;
    /// Consecutive frames since the track last matched a detection.
    fn time_since_update(&self) -> u32;
    /// Current box estimate as `[x1, y1, x2, y2]`.
    fn to_tlbr(&self) -> [f32; 4];
}

/// Motion model + assignment + track state machine.
///
/// One instance tracks exactly one video. Call [`predict`](Self::predict)
/// then [`update`](Self::update) once per frame.
pub trait AssociationEngine {
    type Track: TrackView;

    /// Advance every track's motion model by one frame.
    fn predict(&mut self);

    /// Associate this frame's detections; create, confirm and evict tracks.
    fn update(&mut self, detections: &[Detection]);

    /// Current tracks in the engine's native order.
    fn tracks(&self) -> &[Self::Track];
}
