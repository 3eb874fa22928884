//! Geometry and field queries
//!
//! The tracker only talks to the detector through [`GeometryQuery`]: surface
//! lookup by layer, the magnetic field, and state propagation between
//! surfaces. [`BarrelGeometry`] is a self-contained implementation for
//! concentric cylinders in a uniform solenoidal field.

mod barrel;
pub(crate) mod helix;

pub use barrel::{BarrelGeometry, BarrelGeometryBuilder};

use crate::errors::PropagationError;
use crate::event::LayerId;
use crate::fit::TrackState;
use crate::material::Material;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Direction of a propagation along the trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropagationDirection {
    /// Increasing path length
    Forward,
    /// Decreasing path length
    Backward,
    /// Whichever crossing is closest
    Nearest,
}

/// A detector surface: a finite cylinder coaxial with the field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub layer: LayerId,
    /// Radius (mm)
    pub radius: f64,
    /// Half-length in z (mm)
    pub half_length: f64,
    pub material: Material,
}

impl Surface {
    pub fn new(layer: LayerId, radius: f64, half_length: f64, material: Material) -> Self {
        Self {
            layer,
            radius,
            half_length,
            material,
        }
    }

    /// Whether a point with longitudinal position `z` lies on the surface.
    #[inline]
    pub fn contains_z(&self, z: f64) -> bool {
        z.abs() <= self.half_length
    }
}

/// Result of a successful propagation.
#[derive(Debug, Clone)]
pub struct Propagated {
    /// State on the target surface
    pub state: TrackState,
    /// Signed 3D path length of the step (mm)
    pub path_length: f64,
}

/// Detector geometry and magnetic field as seen by the tracker.
///
/// Implementations are shared read-only across worker threads.
pub trait GeometryQuery: Send + Sync {
    /// Surface of a layer, `None` if the layer is unknown.
    fn surface_for(&self, layer: LayerId) -> Option<Surface>;

    /// Magnetic field (T) at a position.
    fn field_at(&self, position: &Point3<f64>) -> Vector3<f64>;

    /// Move `state` onto `target`, transporting its covariance.
    ///
    /// Material effects of the target are not applied here.
    fn propagate(
        &self,
        state: &TrackState,
        target: &Surface,
        direction: PropagationDirection,
    ) -> Result<Propagated, PropagationError>;

    /// Whether `layer` is part of the geometry.
    fn contains_layer(&self, layer: LayerId) -> bool {
        self.surface_for(layer).is_some()
    }

    /// Solenoidal field component at a position.
    fn bz_at(&self, position: &Point3<f64>) -> f64 {
        self.field_at(position).z
    }
}
