//! Single target track with Kalman state and appearance history.

use ndarray::{Array1, Array2};

use crate::tracker::TrackView;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::Detection;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

#[derive(Debug, Clone)]
pub struct Track {
    /// Unique track identifier within its tracker
    pub track_id: u64,
    /// Class of the detection that created the track
    pub class_name: String,
    pub state: TrackState,
    /// Kalman filter state mean (8-dim)
    pub mean: Array1<f64>,
    /// Kalman filter state covariance (8x8)
    pub covariance: Array2<f64>,
    /// Total number of measurement updates
    pub hits: u32,
    /// Frames since the track was created
    pub age: u32,
    /// Frames since the last measurement update
    pub time_since_update: u32,
    /// Confidence of the last matched detection
    pub confidence: f32,
    /// Features gathered since the last metric fit
    pub features: Vec<Array1<f32>>,
    n_init: u32,
    max_age: u32,
}

impl Track {
    pub fn new(
        kalman_filter: &KalmanFilter,
        detection: &Detection,
        track_id: u64,
        n_init: u32,
        max_age: u32,
    ) -> Self {
        let (mean, covariance) = kalman_filter.initiate(detection.to_xyah());
        let state = if n_init <= 1 {
            TrackState::Confirmed
        } else {
            TrackState::Tentative
        };
        Self {
            track_id,
            class_name: detection.class_name.clone(),
            state,
            mean,
            covariance,
            hits: 1,
            age: 1,
            time_since_update: 0,
            confidence: detection.confidence,
            features: vec![detection.feature.clone()],
            n_init,
            max_age,
        }
    }

    pub fn to_tlwh(&self) -> Rect {
        Rect::from_xyah(
            self.mean[0] as f32,
            self.mean[1] as f32,
            self.mean[2] as f32,
            self.mean[3] as f32,
        )
    }

    pub fn predict(&mut self, kalman_filter: &KalmanFilter) {
        let (mean, covariance) = kalman_filter.predict(&self.mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;
        self.age += 1;
        self.time_since_update += 1;
    }

    pub fn update(&mut self, kalman_filter: &KalmanFilter, detection: &Detection) {
        match kalman_filter.update(&self.mean, &self.covariance, detection.to_xyah()) {
            Some((mean, covariance)) => {
                self.mean = mean;
                self.covariance = covariance;
            }
            None => tracing::warn!(
                track_id = self.track_id,
                "singular innovation covariance; keeping predicted state"
            ),
        }
        self.features.push(detection.feature.clone());
        self.confidence = detection.confidence;

        self.hits += 1;
        self.time_since_update = 0;
        if self.state == TrackState::Tentative && self.hits >= self.n_init {
            self.state = TrackState::Confirmed;
        }
    }

    /// A tentative track dies on its first miss; a confirmed one after
    /// `max_age` consecutive misses.
    pub fn mark_missed(&mut self) {
        if self.state == TrackState::Tentative || self.time_since_update > self.max_age {
            self.state = TrackState::Deleted;
        }
    }

    pub fn is_tentative(&self) -> bool {
        self.state == TrackState::Tentative
    }

    pub fn is_deleted(&self) -> bool {
        self.state == TrackState::Deleted
    }
}

impl TrackView for Track {
    fn track_id(&self) -> u64 {
        self.track_id
    }

    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    fn time_since_update(&self) -> u32 {
        self.time_since_update
    }

    fn to_tlbr(&self) -> [f32; 4] {
        self.to_tlwh().to_tlbr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn detection(x: f32) -> Detection {
        Detection::new(Rect::new(x, 50.0, 40.0, 80.0), 0.9, "person", array![1.0, 0.0])
    }

    #[test]
    fn test_confirmation_after_n_init_hits() {
        let kf = KalmanFilter::new();
        let mut track = Track::new(&kf, &detection(100.0), 1, 3, 30);
        assert!(track.is_tentative());

        for x in [102.0, 104.0] {
            track.predict(&kf);
            track.update(&kf, &detection(x));
        }
        assert!(track.is_confirmed());
        assert_eq!(track.hits, 3);
        assert_eq!(track.time_since_update, 0);
        assert_eq!(track.features.len(), 3);
    }

    #[test]
    fn test_tentative_track_deleted_on_miss() {
        let kf = KalmanFilter::new();
        let mut track = Track::new(&kf, &detection(100.0), 1, 3, 30);
        track.predict(&kf);
        track.mark_missed();
        assert!(track.is_deleted());
    }

    #[test]
    fn test_confirmed_track_survives_until_max_age() {
        let kf = KalmanFilter::new();
        let mut track = Track::new(&kf, &detection(100.0), 1, 1, 2);
        assert!(track.is_confirmed());
        for _ in 0..2 {
            track.predict(&kf);
            track.mark_missed();
            assert!(!track.is_deleted());
        }
        track.predict(&kf);
        track.mark_missed();
        assert!(track.is_deleted());
    }

    #[test]
    fn test_tlbr_projection() {
        let kf = KalmanFilter::new();
        let track = Track::new(&kf, &detection(100.0), 1, 3, 30);
        let [x1, y1, x2, y2] = track.to_tlbr();
        assert!((x1 - 100.0).abs() < 1e-3);
        assert!((y1 - 50.0).abs() < 1e-3);
        assert!((x2 - 140.0).abs() < 1e-3);
        assert!((y2 - 130.0).abs() < 1e-3);
    }
}
