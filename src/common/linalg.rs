//! Linear algebra utilities
//!
//! Kalman measurement update, covariance symmetrization and the small
//! angle helpers shared by the propagator, the seed estimators and the fitter.

use nalgebra::{Matrix2, Matrix5, SMatrix, Vector2, Vector5};
use std::f64::consts::PI;

/// Projection of the 5-parameter track state onto a 2D measurement.
pub type Projection = SMatrix<f64, 2, 5>;

/// Result of a single Kalman measurement update.
#[derive(Debug, Clone)]
pub struct KalmanUpdate {
    /// Filtered state vector
    pub state: Vector5<f64>,
    /// Filtered covariance (symmetric)
    pub covariance: Matrix5<f64>,
    /// Predicted residual `m - H x`
    pub residual: Vector2<f64>,
    /// χ² contribution of this measurement
    pub chisq: f64,
}

/// Kalman filter update step
///
/// Performs a single measurement update with a linear projection `h`.
/// `residual` is supplied by the caller because angular components need
/// wrapping that a plain `m - H x` would get wrong.
///
/// Returns `None` if the innovation covariance is not positive definite.
pub fn kalman_update(
    x_pred: &Vector5<f64>,
    p_pred: &Matrix5<f64>,
    residual: &Vector2<f64>,
    h: &Projection,
    v: &Matrix2<f64>,
) -> Option<KalmanUpdate> {
    // Innovation covariance
    let s = h * p_pred * h.transpose() + v;
    let chol = s.cholesky()?;

    // Kalman gain K = P Hᵀ S⁻¹
    let pht = p_pred * h.transpose();
    let k = pht * chol.inverse();

    let state = x_pred + k * residual;

    // Joseph form keeps the covariance positive semi-definite
    let i_minus_kh = Matrix5::identity() - k * h;
    let covariance = symmetrize(&(i_minus_kh * p_pred * i_minus_kh.transpose() + k * v * k.transpose()));

    let chisq = residual.dot(&chol.solve(residual));

    Some(KalmanUpdate {
        state,
        covariance,
        residual: *residual,
        chisq,
    })
}

/// χ² of a residual against its covariance, without updating anything.
///
/// Returns `f64::INFINITY` when the covariance is singular.
pub fn residual_chisq(residual: &Vector2<f64>, covariance: &Matrix2<f64>) -> f64 {
    match covariance.cholesky() {
        Some(chol) => residual.dot(&chol.solve(residual)),
        None => f64::INFINITY,
    }
}

/// Make matrix symmetric
///
/// Ensures a matrix is symmetric by averaging with its transpose. Every
/// covariance produced by this crate goes through here, so the two
/// triangles are never updated independently.
pub fn symmetrize<const N: usize>(matrix: &SMatrix<f64, N, N>) -> SMatrix<f64, N, N> {
    (matrix + matrix.transpose()) * 0.5
}

/// Check if matrix is positive definite
pub fn is_positive_definite<const N: usize>(matrix: &SMatrix<f64, N, N>) -> bool {
    matrix.cholesky().is_some()
}

/// Wrap an angle into `(-π, π]`.
#[inline]
pub fn wrap_angle(angle: f64) -> f64 {
    let mut a = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// `sin(x) / x`, stable at the origin.
#[inline]
pub fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-4 {
        1.0 - x * x / 6.0
    } else {
        x.sin() / x
    }
}
