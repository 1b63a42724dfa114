//! Constant-velocity Kalman filter over `(cx, cy, a, h)` box measurements.
//!
//! State is 8-dimensional: the measurement plus its per-frame velocity.
//! Matrix algebra runs on ndarray; the 4x4 inverse and Cholesky steps go
//! through nalgebra.

use nalgebra::{Matrix4, Vector4};
use ndarray::{Array1, Array2};

/// 0.95 quantile of the chi-square distribution with 4 degrees of freedom,
/// the gate for a full `(cx, cy, a, h)` measurement.
pub const CHI2INV95_4DOF: f64 = 9.4877;

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let ndim = 4;
        let mut motion_mat = Array2::<f64>::eye(2 * ndim);
        for i in 0..ndim {
            motion_mat[[i, ndim + i]] = 1.0;
        }
        let update_mat = Array2::<f64>::eye(2 * ndim)
            .slice(ndarray::s![..ndim, ..])
            .to_owned();

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Create a track state from an unassociated measurement; velocities start at zero.
    pub fn initiate(&self, measurement: [f64; 4]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(8);
        for (i, v) in measurement.iter().enumerate() {
            mean[i] = *v;
        }

        let h = measurement[3];
        let pos = 2.0 * self.std_weight_position * h;
        let vel = 10.0 * self.std_weight_velocity * h;
        let cov = diag_squared(&[pos, pos, 1e-2, pos, vel, vel, 1e-5, vel]);

        (mean, cov)
    }

    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let h = mean[3];
        let pos = self.std_weight_position * h;
        let vel = self.std_weight_velocity * h;
        let motion_cov = diag_squared(&[pos, pos, 1e-2, pos, vel, vel, 1e-5, vel]);

        let new_mean = self.motion_mat.dot(mean);
        let new_covariance =
            self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + motion_cov;

        (new_mean, new_covariance)
    }

    /// Project the state into measurement space, adding measurement noise.
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let h = mean[3];
        let pos = self.std_weight_position * h;
        let innovation_cov = diag_squared(&[pos, pos, 1e-1, pos]);

        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean_proj, covariance_proj)
    }

    /// Correct the state with a measurement.
    ///
    /// Returns `None` if the projected covariance is singular.
    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> Option<(Array1<f64>, Array2<f64>)> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);
        let s_inv = from_matrix4(&to_matrix4(&projected_cov).try_inverse()?);

        // K = P * H^T * S^-1, where P * H^T is the first four columns of P.
        let pht = covariance.dot(&self.update_mat.t());
        let kalman_gain = pht.dot(&s_inv);

        let innovation = Array1::from(measurement.to_vec()) - projected_mean;
        let new_mean = mean + &kalman_gain.dot(&innovation);
        let new_covariance = covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        Some((new_mean, new_covariance))
    }

    /// Squared Mahalanobis distance between the state and each measurement.
    ///
    /// Compare against [`CHI2INV95_4DOF`] to gate unlikely associations. A
    /// degenerate covariance yields `f64::INFINITY` for every measurement.
    pub fn gating_distance(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurements: &[[f64; 4]],
    ) -> Vec<f64> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);
        let Some(cholesky) = to_matrix4(&projected_cov).cholesky() else {
            return vec![f64::INFINITY; measurements.len()];
        };
        let lower = cholesky.l();
        let center = Vector4::new(
            projected_mean[0],
            projected_mean[1],
            projected_mean[2],
            projected_mean[3],
        );

        measurements
            .iter()
            .map(|m| {
                let d = Vector4::new(m[0], m[1], m[2], m[3]) - center;
                lower
                    .solve_lower_triangular(&d)
                    .map_or(f64::INFINITY, |z| z.norm_squared())
            })
            .collect()
    }
}

fn diag_squared(std: &[f64]) -> Array2<f64> {
    Array2::from_diag(&Array1::from_iter(std.iter().map(|s| s * s)))
}

fn to_matrix4(m: &Array2<f64>) -> Matrix4<f64> {
    Matrix4::from_fn(|i, j| m[[i, j]])
}

fn from_matrix4(m: &Matrix4<f64>) -> Array2<f64> {
    Array2::from_shape_fn((4, 4), |(i, j)| m[(i, j)])
}
