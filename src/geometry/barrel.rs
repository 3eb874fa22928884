//! Concentric-cylinder barrel detector in a uniform solenoidal field

use super::{helix, GeometryQuery, Propagated, PropagationDirection, Surface};
use crate::common::constants::{BFIELD_CONSTANT, PATH_EPSILON};
use crate::common::linalg::symmetrize;
use crate::errors::{ConfigError, PropagationError};
use crate::event::LayerId;
use crate::fit::param::{TAN_LAMBDA, Z};
use crate::fit::TrackState;
use crate::material::Material;
use nalgebra::{Point3, Vector3};
use std::collections::HashSet;

/// Barrel geometry: cylinders sorted by radius and a field along z.
#[derive(Debug, Clone, PartialEq)]
pub struct BarrelGeometry {
    surfaces: Vec<Surface>,
    bz: f64,
}

impl BarrelGeometry {
    pub fn builder() -> BarrelGeometryBuilder {
        BarrelGeometryBuilder::default()
    }

    /// Surfaces in increasing radius
    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    /// Field along z (T)
    pub fn bz(&self) -> f64 {
        self.bz
    }

    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.surfaces.iter().map(|s| s.layer).collect()
    }

    pub fn radius_of(&self, layer: LayerId) -> Option<f64> {
        self.surface_for(layer).map(|s| s.radius)
    }
}

impl GeometryQuery for BarrelGeometry {
    fn surface_for(&self, layer: LayerId) -> Option<Surface> {
        self.surfaces.iter().find(|s| s.layer == layer).copied()
    }

    fn field_at(&self, _position: &Point3<f64>) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, self.bz)
    }

    fn propagate(
        &self,
        state: &TrackState,
        target: &Surface,
        direction: PropagationDirection,
    ) -> Result<Propagated, PropagationError> {
        if !state.params.iter().all(|v| v.is_finite()) || state.surface.radius <= 0.0 {
            return Err(PropagationError::InvalidState {
                description: format!("non-finite parameters on layer {}", state.surface.layer),
            });
        }
        let no_intersection = || PropagationError::NoIntersection {
            layer: target.layer,
        };

        let field_factor = -BFIELD_CONSTANT * self.bz_at(&state.position());
        let r0 = state.surface.radius;
        let r1 = target.radius;

        let s = helix::intersect(&state.params, r0, r1, field_factor, direction).ok_or_else(no_intersection)?;
        let params = helix::evaluate(&state.params, r0, field_factor, s);
        if !target.contains_z(params[Z]) {
            return Err(PropagationError::OutOfBounds {
                layer: target.layer,
                z: params[Z],
                half_length: target.half_length,
            });
        }

        let branch = if s.abs() <= PATH_EPSILON {
            PropagationDirection::Nearest
        } else if s > 0.0 {
            PropagationDirection::Forward
        } else {
            PropagationDirection::Backward
        };
        let jac = helix::jacobian(&state.params, r0, r1, field_factor, branch).ok_or_else(no_intersection)?;
        let covariance = symmetrize(&(jac * state.covariance * jac.transpose()));
        let path_length = s * (1.0 + state.params[TAN_LAMBDA].powi(2)).sqrt();

        Ok(Propagated {
            state: TrackState {
                params,
                covariance,
                surface: *target,
                path_length: state.path_length + path_length,
                status: state.status,
                chisq: state.chisq,
                hit: None,
            },
            path_length,
        })
    }
}

/// Builder for [`BarrelGeometry`].
#[derive(Debug, Clone, Default)]
pub struct BarrelGeometryBuilder {
    bz: f64,
    surfaces: Vec<Surface>,
}

impl BarrelGeometryBuilder {
    /// Uniform field along z (T).
    pub fn field(mut self, bz: f64) -> Self {
        self.bz = bz;
        self
    }

    /// Add a cylinder.
    pub fn layer(mut self, layer: u32, radius: f64, half_length: f64, material: Material) -> Self {
        self.surfaces
            .push(Surface::new(LayerId(layer), radius, half_length, material));
        self
    }

    pub fn build(mut self) -> Result<BarrelGeometry, ConfigError> {
        let invalid = |description: String| Err(ConfigError::InvalidGeometry { description });
        if !self.bz.is_finite() {
            return invalid(format!("field {} T is not finite", self.bz));
        }
        if self.surfaces.is_empty() {
            return invalid("no layers".to_string());
        }
        let mut seen = HashSet::new();
        for s in &self.surfaces {
            if !seen.insert(s.layer) {
                return invalid(format!("layer {} defined twice", s.layer));
            }
            if !(s.radius.is_finite() && s.radius > 0.0) {
                return invalid(format!("layer {} has radius {}", s.layer, s.radius));
            }
            if !(s.half_length.is_finite() && s.half_length > 0.0) {
                return invalid(format!("layer {} has half-length {}", s.layer, s.half_length));
            }
        }
        self.surfaces.sort_by(|a, b| a.radius.total_cmp(&b.radius));
        Ok(BarrelGeometry {
            surfaces: self.surfaces,
            bz: self.bz,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::param::{ALPHA, PHI};
    use crate::fit::StateStatus;
    use nalgebra::{Matrix5, Vector5};

    fn geometry() -> BarrelGeometry {
        BarrelGeometry::builder()
            .field(2.0)
            .layer(3, 90.0, 300.0, Material::silicon(0.3))
            .layer(1, 30.0, 300.0, Material::silicon(0.3))
            .layer(2, 60.0, 300.0, Material::silicon(0.3))
            .build()
            .unwrap()
    }

    fn state_on(geometry: &BarrelGeometry, layer: u32, params: Vector5<f64>) -> TrackState {
        let surface = geometry.surface_for(LayerId(layer)).unwrap();
        TrackState::new(params, Matrix5::identity() * 1e-4, surface, StateStatus::Forward)
    }

    #[test]
    fn test_layers_sorted_by_radius() {
        let g = geometry();
        assert_eq!(g.layer_ids(), vec![LayerId(1), LayerId(2), LayerId(3)]);
        assert_eq!(g.radius_of(LayerId(2)), Some(60.0));
        assert!(g.contains_layer(LayerId(3)));
        assert!(!g.contains_layer(LayerId(4)));
        assert_eq!(g.field_at(&Point3::origin()), Vector3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_builder_rejects_bad_layers() {
        let dup = BarrelGeometry::builder()
            .layer(1, 10.0, 100.0, Material::vacuum())
            .layer(1, 20.0, 100.0, Material::vacuum())
            .build();
        assert!(matches!(dup, Err(ConfigError::InvalidGeometry { .. })));
        let negative = BarrelGeometry::builder().layer(1, -1.0, 100.0, Material::vacuum()).build();
        assert!(negative.is_err());
        assert!(BarrelGeometry::builder().build().is_err());
    }

    #[test]
    fn test_propagate_straight_track() {
        let g = geometry();
        let state = state_on(&g, 1, Vector5::new(0.4, 2.0, 0.0, 0.5, 0.0));
        let target = g.surface_for(LayerId(3)).unwrap();

        let out = g.propagate(&state, &target, PropagationDirection::Forward).unwrap();
        // 60 mm transverse at tanλ = 0.5
        assert!((out.path_length - 60.0 * 1.25f64.sqrt()).abs() < 1e-9);
        assert!((out.state.phi() - 0.4).abs() < 1e-12);
        assert!((out.state.z() - 32.0).abs() < 1e-9);
        assert_eq!(out.state.surface.layer, LayerId(3));
        assert!(out.state.hit.is_none());

        // transported covariance: α uncertainty leaks into φ
        assert!(out.state.covariance[(PHI, PHI)] > state.covariance[(PHI, PHI)]);
        assert_eq!(out.state.covariance, out.state.covariance.transpose());
    }

    #[test]
    fn test_propagate_backward_and_nearest() {
        let g = geometry();
        let state = state_on(&g, 3, Vector5::new(-1.0, 0.0, 0.0, 0.0, 0.0));
        let inner = g.surface_for(LayerId(1)).unwrap();

        let back = g.propagate(&state, &inner, PropagationDirection::Backward).unwrap();
        assert!((back.path_length + 60.0).abs() < 1e-9);

        let nearest = g.propagate(&state, &inner, PropagationDirection::Nearest).unwrap();
        assert!(nearest.path_length < 0.0);

        assert!(matches!(
            g.propagate(&state, &inner, PropagationDirection::Forward),
            Err(PropagationError::NoIntersection { .. })
        ));
    }

    #[test]
    fn test_propagate_out_of_bounds() {
        let g = geometry();
        let state = state_on(&g, 1, Vector5::new(0.0, 0.0, 0.0, 10.0, 0.0));
        let target = g.surface_for(LayerId(3)).unwrap();
        assert!(matches!(
            g.propagate(&state, &target, PropagationDirection::Forward),
            Err(PropagationError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_curved_track_keeps_charge_and_bends() {
        let g = geometry();
        // positive particle in +Bz bends clockwise: α decreases outward
        let state = state_on(&g, 1, Vector5::new(0.0, 0.0, 0.0, 0.0, 2.0));
        let target = g.surface_for(LayerId(3)).unwrap();
        let out = g.propagate(&state, &target, PropagationDirection::Forward).unwrap();
        assert!(out.state.phi() < 0.0);
        assert!(out.state.alpha() < 0.0);
        assert_eq!(out.state.qpt(), 2.0);
        assert!(out.state.params[ALPHA].is_finite());
    }

    #[test]
    fn test_invalid_state_rejected() {
        let g = geometry();
        let state = state_on(&g, 1, Vector5::new(f64::NAN, 0.0, 0.0, 0.0, 0.0));
        let target = g.surface_for(LayerId(2)).unwrap();
        assert!(matches!(
            g.propagate(&state, &target, PropagationDirection::Forward),
            Err(PropagationError::InvalidState { .. })
        ));
    }
}
