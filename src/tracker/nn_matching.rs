//! Nearest-neighbour appearance metric over per-track feature galleries.

use std::collections::HashMap;

use ndarray::{Array1, Array2};

use crate::tracker::matching::INFTY_COST;

/// Distance between two appearance embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`
    #[default]
    Cosine,
    /// Squared euclidean distance
    Euclidean,
}

impl DistanceMetric {
    fn distance(self, a: &Array1<f32>, b: &Array1<f32>) -> f32 {
        match self {
            Self::Cosine => {
                let norm = |v: &Array1<f32>| v.dot(v).sqrt().max(f32::EPSILON);
                1.0 - a.dot(b) / (norm(a) * norm(b))
            }
            Self::Euclidean => {
                let diff = a - b;
                diff.dot(&diff).max(0.0)
            }
        }
    }
}

/// For each target, the distance to a query feature is the smallest distance
/// to any feature observed for that target so far.
#[derive(Debug, Clone)]
pub struct NearestNeighborDistanceMetric {
    metric: DistanceMetric,
    matching_threshold: f32,
    budget: Option<usize>,
    samples: HashMap<u64, Vec<Array1<f32>>>,
}

impl NearestNeighborDistanceMetric {
    /// `budget` caps the gallery size per target; oldest samples go first.
    pub fn new(metric: DistanceMetric, matching_threshold: f32, budget: Option<usize>) -> Self {
        Self {
            metric,
            matching_threshold,
            budget,
            samples: HashMap::new(),
        }
    }

    pub fn matching_threshold(&self) -> f32 {
        self.matching_threshold
    }

    /// Add `features[i]` to the gallery of `targets[i]`, then forget every
    /// target not in `active_targets`.
    pub fn partial_fit(&mut self, features: &[Array1<f32>], targets: &[u64], active_targets: &[u64]) {
        for (feature, &target) in features.iter().zip(targets) {
            let gallery = self.samples.entry(target).or_default();
            gallery.push(feature.clone());
            if let Some(budget) = self.budget {
                if gallery.len() > budget {
                    let excess = gallery.len() - budget;
                    gallery.drain(..excess);
                }
            }
        }
        self.samples.retain(|target, _| active_targets.contains(target));
    }

    /// Cost matrix of shape `(targets, features)`.
    ///
    /// Targets without any stored sample get [`INFTY_COST`] rows.
    pub fn distance(&self, features: &[&Array1<f32>], targets: &[u64]) -> Array2<f32> {
        let mut cost = Array2::from_elem((targets.len(), features.len()), INFTY_COST);
        for (i, target) in targets.iter().enumerate() {
            let Some(gallery) = self.samples.get(target).filter(|g| !g.is_empty()) else {
                continue;
            };
            for (j, feature) in features.iter().enumerate() {
                cost[[i, j]] = gallery
                    .iter()
                    .map(|sample| self.metric.distance(sample, feature))
                    .fold(f32::INFINITY, f32::min);
            }
        }
        cost
    }

    pub fn gallery_len(&self, target: u64) -> usize {
        self.samples.get(&target).map_or(0, Vec::len)
    }
}
