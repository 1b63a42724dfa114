//! Sliding-window inference latency and the derived FPS figure.

use std::collections::VecDeque;
use std::time::Duration;

/// Sliding window of the most recent per-frame inference durations.
#[derive(Debug, Clone, Default)]
pub struct LatencyEstimator {
    samples: VecDeque<f64>,
}

impl LatencyEstimator {
    /// Number of samples kept.
    pub const WINDOW: usize = 20;

    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(Self::WINDOW),
        }
    }

    /// Append a sample, evicting the oldest once the window is full.
    pub fn record(&mut self, duration: Duration) {
        self.samples.push_back(duration.as_secs_f64());
        while self.samples.len() > Self::WINDOW {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of the window in milliseconds.
    pub fn mean_ms(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        Some(mean * 1000.0)
    }

    /// Frames per second over the window. Infinite when every sample is zero.
    pub fn fps(&self) -> Option<f64> {
        self.mean_ms().map(|ms| 1000.0 / ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_bounded() {
        let mut estimator = LatencyEstimator::new();
        assert_eq!(estimator.fps(), None);
        for step in 1..=25 {
            estimator.record(Duration::from_millis(100));
            assert!(estimator.len() <= LatencyEstimator::WINDOW);
            assert_eq!(estimator.len(), step.min(LatencyEstimator::WINDOW));
            if step >= LatencyEstimator::WINDOW {
                assert!((estimator.fps().unwrap() - 10.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_oldest_sample_is_evicted() {
        let mut estimator = LatencyEstimator::new();
        estimator.record(Duration::from_secs(1));
        for _ in 0..LatencyEstimator::WINDOW {
            estimator.record(Duration::from_millis(50));
        }
        assert!((estimator.mean_ms().unwrap() - 50.0).abs() < 1e-6);
        assert!((estimator.fps().unwrap() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_uses_partial_window() {
        let mut estimator = LatencyEstimator::new();
        estimator.record(Duration::from_millis(200));
        estimator.record(Duration::from_millis(300));
        assert!((estimator.fps().unwrap() - 4.0).abs() < 1e-9);
    }
}
