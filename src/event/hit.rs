//! Digitized hits and their identifiers

use nalgebra::{Matrix2, Matrix3, Point3, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detector layer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Index of a hit in the event's hit slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HitId(pub usize);

impl HitId {
    /// Position in the event slice
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for HitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Truth particle that produced a hit (simulation only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticleId(pub u64);

/// A digitized hit with position, covariance and owning layer.
///
/// Hits belong to the event and are never modified by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Owning layer
    pub layer: LayerId,
    /// Global position (mm)
    pub position: Point3<f64>,
    /// Position covariance (mm²)
    pub covariance: Matrix3<f64>,
    /// Hit time if the detector measures it (ns)
    #[serde(default)]
    pub time: Option<f64>,
    /// Generating particle, for studies only
    #[serde(default)]
    pub truth: Option<ParticleId>,
}

impl Hit {
    /// Create a hit with the given position and covariance.
    pub fn new(layer: LayerId, position: Point3<f64>, covariance: Matrix3<f64>) -> Self {
        Self {
            layer,
            position,
            covariance,
            time: None,
            truth: None,
        }
    }

    /// Create a hit with independent resolutions in r·φ and z.
    ///
    /// The r·φ resolution is rotated into x/y at the hit's azimuth.
    pub fn with_resolution(layer: LayerId, position: Point3<f64>, sigma_rphi: f64, sigma_z: f64) -> Self {
        let phi = position.y.atan2(position.x);
        let (s, c) = phi.sin_cos();
        let v = sigma_rphi * sigma_rphi;
        #[rustfmt::skip]
        let covariance = Matrix3::new(
            v * s * s,  -v * s * c, 0.0,
            -v * s * c, v * c * c,  0.0,
            0.0,        0.0,        sigma_z * sigma_z,
        );
        Self::new(layer, position, covariance)
    }

    /// Attach a truth particle.
    pub fn with_truth(mut self, particle: ParticleId) -> Self {
        self.truth = Some(particle);
        self
    }

    /// Attach a hit time.
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    /// Transverse radius
    #[inline]
    pub fn r(&self) -> f64 {
        self.position.x.hypot(self.position.y)
    }

    /// Azimuth in `(-π, π]`
    #[inline]
    pub fn phi(&self) -> f64 {
        self.position.y.atan2(self.position.x)
    }

    #[inline]
    pub fn z(&self) -> f64 {
        self.position.z
    }

    /// Measurement vector `(φ, z)` used by the fitter.
    pub fn measurement(&self) -> Vector2<f64> {
        Vector2::new(self.phi(), self.z())
    }

    /// Covariance projected onto `(φ, z)`.
    ///
    /// `J = [[-y/r², x/r², 0], [0, 0, 1]]`, `V = J C Jᵀ`.
    pub fn measurement_covariance(&self) -> Matrix2<f64> {
        let (x, y) = (self.position.x, self.position.y);
        let r2 = x * x + y * y;
        #[rustfmt::skip]
        let j = nalgebra::Matrix2x3::new(
            -y / r2, x / r2, 0.0,
            0.0,     0.0,    1.0,
        );
        crate::common::linalg::symmetrize(&(j * self.covariance * j.transpose()))
    }

    /// Variance of the r·φ coordinate.
    pub fn sigma_rphi_squared(&self) -> f64 {
        self.measurement_covariance()[(0, 0)] * (self.position.x.powi(2) + self.position.y.powi(2))
    }

    /// Variance of z
    #[inline]
    pub fn sigma_z_squared(&self) -> f64 {
        self.covariance[(2, 2)]
    }
}
