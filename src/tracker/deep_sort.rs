//! DeepSORT-style multi-target tracker.

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::nn_matching::{DistanceMetric, NearestNeighborDistanceMetric};
use crate::tracker::track::Track;
use crate::tracker::{AssociationEngine, TrackView};

/// Configuration for the [`DeepSortTracker`].
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub metric: DistanceMetric,
    /// Appearance gate; larger distances are never matched.
    pub matching_threshold: f32,
    /// Per-track feature gallery size, unbounded when `None`.
    pub budget: Option<usize>,
    pub max_iou_distance: f32,
    /// Consecutive misses a confirmed track survives.
    pub max_age: u32,
    /// Hits required to confirm a track.
    pub n_init: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Cosine,
            matching_threshold: 0.7,
            budget: None,
            max_iou_distance: 0.7,
            max_age: 30,
            n_init: 3,
        }
    }
}

pub struct DeepSortTracker {
    config: TrackerConfig,
    metric: NearestNeighborDistanceMetric,
    kalman_filter: KalmanFilter,
    tracks: Vec<Track>,
    next_id: u64,
}

impl DeepSortTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let metric =
            NearestNeighborDistanceMetric::new(config.metric, config.matching_threshold, config.budget);
        Self {
            config,
            metric,
            kalman_filter: KalmanFilter::default(),
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn match_detections(&self, detections: &[Detection]) -> AssignmentResult {
        let gated_metric = |tracks: &[Track], dets: &[Detection], ti: &[usize], di: &[usize]| {
            let features: Vec<_> = di.iter().map(|&i| &dets[i].feature).collect();
            let targets: Vec<u64> = ti.iter().map(|&i| tracks[i].track_id).collect();
            let mut cost = self.metric.distance(&features, &targets);
            matching::gate_cost_matrix(&self.kalman_filter, &mut cost, tracks, dets, ti, di);
            cost
        };

        let (confirmed, unconfirmed): (Vec<usize>, Vec<usize>) =
            (0..self.tracks.len()).partition(|&i| self.tracks[i].is_confirmed());
        let all_detections: Vec<usize> = (0..detections.len()).collect();

        // Step 1: appearance cascade over confirmed tracks
        let by_appearance = matching::matching_cascade(
            &gated_metric,
            self.metric.matching_threshold(),
            self.config.max_age,
            &self.tracks,
            detections,
            &confirmed,
            &all_detections,
        );

        // Step 2: IoU over tentative tracks and tracks that just missed once
        let (recent, stale): (Vec<usize>, Vec<usize>) = by_appearance
            .unmatched_tracks
            .iter()
            .partition(|&&k| self.tracks[k].time_since_update == 1);
        let iou_candidates: Vec<usize> = unconfirmed.into_iter().chain(recent).collect();

        let by_iou = matching::min_cost_matching(
            &matching::iou_cost,
            self.config.max_iou_distance,
            &self.tracks,
            detections,
            &iou_candidates,
            &by_appearance.unmatched_detections,
        );

        let mut unmatched_tracks = stale;
        for k in by_iou.unmatched_tracks {
            if !unmatched_tracks.contains(&k) {
                unmatched_tracks.push(k);
            }
        }

        AssignmentResult {
            matches: by_appearance
                .matches
                .into_iter()
                .chain(by_iou.matches)
                .collect(),
            unmatched_tracks,
            unmatched_detections: by_iou.unmatched_detections,
        }
    }

    fn initiate_track(&mut self, detection: &Detection) {
        let track = Track::new(
            &self.kalman_filter,
            detection,
            self.next_id,
            self.config.n_init,
            self.config.max_age,
        );
        self.next_id += 1;
        self.tracks.push(track);
    }
}

impl AssociationEngine for DeepSortTracker {
    type Track = Track;

    fn predict(&mut self) {
        for track in &mut self.tracks {
            track.predict(&self.kalman_filter);
        }
    }

    fn update(&mut self, detections: &[Detection]) {
        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = self.match_detections(detections);

        for (t, d) in matches {
            self.tracks[t].update(&self.kalman_filter, &detections[d]);
        }
        for t in unmatched_tracks {
            self.tracks[t].mark_missed();
        }
        for d in unmatched_detections {
            self.initiate_track(&detections[d]);
        }
        self.tracks.retain(|t| !t.is_deleted());

        // Refresh appearance galleries of confirmed tracks
        let mut active_targets = Vec::new();
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for track in self.tracks.iter_mut().filter(|t| t.is_confirmed()) {
            active_targets.push(track.track_id);
            for feature in track.features.drain(..) {
                features.push(feature);
                targets.push(track.track_id);
            }
        }
        self.metric.partial_fit(&features, &targets, &active_targets);
    }

    fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Rect;
    use ndarray::array;

    fn det(x: f32, feature: [f32; 2]) -> Detection {
        Detection::new(
            Rect::new(x, 100.0, 50.0, 100.0),
            0.9,
            "car",
            array![feature[0], feature[1]],
        )
    }

    fn step(tracker: &mut DeepSortTracker, detections: &[Detection]) {
        tracker.predict();
        tracker.update(detections);
    }

    #[test]
    fn test_new_track_per_unmatched_detection() {
        let mut tracker = DeepSortTracker::new(TrackerConfig::default());
        step(&mut tracker, &[det(0.0, [1.0, 0.0]), det(300.0, [0.0, 1.0])]);
        let ids: Vec<u64> = tracker.tracks().iter().map(|t| t.track_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(tracker.tracks().iter().all(|t| !t.is_confirmed()));
    }

    #[test]
    fn test_confirmation_and_id_persistence() {
        let mut tracker = DeepSortTracker::new(TrackerConfig::default());
        for i in 0..5 {
            step(&mut tracker, &[det(100.0 + 4.0 * i as f32, [1.0, 0.0])]);
        }
        assert_eq!(tracker.tracks().len(), 1);
        let track = &tracker.tracks()[0];
        assert_eq!(track.track_id, 1);
        assert!(track.is_confirmed());
        assert_eq!(track.class_name(), "car");
    }

    #[test]
    fn test_confirmed_track_coasts_then_rematches_by_appearance() {
        let mut tracker = DeepSortTracker::new(TrackerConfig::default());
        for i in 0..3 {
            step(&mut tracker, &[det(100.0 + 2.0 * i as f32, [1.0, 0.0])]);
        }
        for _ in 0..3 {
            step(&mut tracker, &[]);
        }
        let track = &tracker.tracks()[0];
        assert_eq!(track.time_since_update, 3);
        assert!(track.is_confirmed());

        step(&mut tracker, &[det(106.0, [1.0, 0.0])]);
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(tracker.tracks()[0].track_id, 1);
        assert_eq!(tracker.tracks()[0].time_since_update, 0);
    }

    #[test]
    fn test_confirmed_track_evicted_after_max_age() {
        let config = TrackerConfig {
            max_age: 2,
            ..Default::default()
        };
        let mut tracker = DeepSortTracker::new(config);
        for _ in 0..3 {
            step(&mut tracker, &[det(100.0, [1.0, 0.0])]);
        }
        for _ in 0..3 {
            step(&mut tracker, &[]);
        }
        assert!(tracker.tracks().is_empty());
    }

    #[test]
    fn test_ids_are_per_instance() {
        let mut first = DeepSortTracker::new(TrackerConfig::default());
        step(&mut first, &[det(0.0, [1.0, 0.0])]);
        let mut second = DeepSortTracker::new(TrackerConfig::default());
        step(&mut second, &[det(0.0, [1.0, 0.0])]);
        assert_eq!(second.tracks()[0].track_id, 1);
    }
}
