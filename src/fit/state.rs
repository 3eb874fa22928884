//! Track parameters evaluated on a surface

use crate::common::constants::{BFIELD_CONSTANT, PT_MAX};
use crate::event::HitId;
use crate::geometry::Surface;
use nalgebra::{Matrix5, Point3, Vector3, Vector5};
use serde::{Deserialize, Serialize};

/// Indices into the 5-parameter state vector.
///
/// The state lives on a cylinder of radius `r`:
/// `φ` is the azimuth of the crossing point, `z` its longitudinal position,
/// `α` the transverse direction minus `φ`, `tan λ` the dip and `q/pT` the
/// signed inverse transverse momentum (GeV⁻¹).
pub mod param {
    pub const PHI: usize = 0;
    pub const Z: usize = 1;
    pub const ALPHA: usize = 2;
    pub const TAN_LAMBDA: usize = 3;
    pub const QPT: usize = 4;
}

/// Fit status of a state in a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateStatus {
    /// Filtered while fitting towards larger path length
    Forward,
    /// Filtered while fitting towards smaller path length
    Backward,
    /// Final state, using every hit of the candidate
    Optimal,
    /// Not a usable estimate
    Invalid,
}

/// Track parameters and covariance on a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackState {
    /// `(φ, z, α, tan λ, q/pT)`
    pub params: Vector5<f64>,
    /// Symmetric 5×5 covariance
    pub covariance: Matrix5<f64>,
    /// Surface the state is evaluated on
    pub surface: Surface,
    /// Path length from the seed state (mm)
    pub path_length: f64,
    pub status: StateStatus,
    /// Running χ² up to and including this state
    pub chisq: f64,
    /// Hit whose measurement produced this state, `None` for the seed
    pub hit: Option<HitId>,
}

impl TrackState {
    /// Seed-like state with zero path length and no hit.
    pub fn new(params: Vector5<f64>, covariance: Matrix5<f64>, surface: Surface, status: StateStatus) -> Self {
        Self {
            params,
            covariance,
            surface,
            path_length: 0.0,
            status,
            chisq: 0.0,
            hit: None,
        }
    }

    #[inline]
    pub fn phi(&self) -> f64 {
        self.params[param::PHI]
    }

    #[inline]
    pub fn z(&self) -> f64 {
        self.params[param::Z]
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.params[param::ALPHA]
    }

    #[inline]
    pub fn tan_lambda(&self) -> f64 {
        self.params[param::TAN_LAMBDA]
    }

    #[inline]
    pub fn qpt(&self) -> f64 {
        self.params[param::QPT]
    }

    /// Transverse direction angle `ψ = φ + α`
    #[inline]
    pub fn psi(&self) -> f64 {
        self.phi() + self.alpha()
    }

    /// Global position of the state.
    pub fn position(&self) -> Point3<f64> {
        let r = self.surface.radius;
        let (s, c) = self.phi().sin_cos();
        Point3::new(r * c, r * s, self.z())
    }

    /// Unit direction of motion.
    pub fn direction(&self) -> Vector3<f64> {
        let (s, c) = self.psi().sin_cos();
        Vector3::new(c, s, self.tan_lambda()).normalize()
    }

    /// Transverse momentum (GeV), infinite for a straight track.
    pub fn pt(&self) -> f64 {
        let q = self.qpt().abs();
        if q < 1.0 / PT_MAX {
            f64::INFINITY
        } else {
            1.0 / q
        }
    }

    /// Total momentum (GeV)
    pub fn momentum(&self) -> f64 {
        self.pt() * (1.0 + self.tan_lambda().powi(2)).sqrt()
    }

    /// Charge sign, `0` for a straight track.
    pub fn charge(&self) -> i8 {
        let q = self.qpt();
        if q.abs() < 1.0 / PT_MAX {
            0
        } else if q > 0.0 {
            1
        } else {
            -1
        }
    }

    /// Signed transverse curvature (1/mm) in a field `bz` (T).
    ///
    /// Positive for counter-clockwise motion seen from +z.
    #[inline]
    pub fn curvature(&self, bz: f64) -> f64 {
        -BFIELD_CONSTANT * bz * self.qpt()
    }

    /// Standard deviation of parameter `i`.
    pub fn sigma(&self, i: usize) -> f64 {
        self.covariance[(i, i)].max(0.0).sqrt()
    }

    /// Finite parameters and a covariance with positive diagonal.
    pub fn is_valid(&self) -> bool {
        self.status != StateStatus::Invalid
            && self.params.iter().all(|v| v.is_finite())
            && self.covariance.iter().all(|v| v.is_finite())
            && (0..5).all(|i| self.covariance[(i, i)] > 0.0)
            && self.surface.radius > 0.0
    }
}
