//! Detector material and its effect on a track crossing it
//!
//! - [`Material`]: per-surface description (thickness, radiation length, ...)
//! - [`EnergyLossModel`]: pluggable dE/dx with [`BetheBloch`], [`FixedRate`]
//!   and [`NoEnergyLoss`]
//! - [`EnergyLossKind`]: serializable selector stored on a strategy
//! - [`scattering`]: Highland multiple scattering and the combined
//!   covariance update applied when a state arrives on a surface

mod eloss;
pub mod scattering;

pub use eloss::{BetheBloch, EnergyLoss, EnergyLossKind, EnergyLossModel, FixedRate, NoEnergyLoss};
pub use scattering::{apply_material_effects, highland_angle, MaterialCrossing};

use serde::{Deserialize, Serialize};

/// Passive material of one detector surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Thickness along the surface normal (mm)
    pub thickness: f64,
    /// Radiation length (mm)
    pub radiation_length: f64,
    /// Density (g/cm³)
    pub density: f64,
    /// Ratio of atomic number to atomic mass (mol/g)
    pub z_over_a: f64,
    /// Mean excitation energy (GeV)
    pub mean_excitation: f64,
}

impl Material {
    /// Silicon sensor of the given thickness in mm.
    pub fn silicon(thickness: f64) -> Self {
        Self {
            thickness,
            radiation_length: 93.70,
            density: 2.329,
            z_over_a: 0.498_48,
            mean_excitation: 173.0e-9,
        }
    }

    /// No material at all.
    pub fn vacuum() -> Self {
        Self {
            thickness: 0.0,
            radiation_length: f64::INFINITY,
            density: 0.0,
            z_over_a: 0.0,
            mean_excitation: 0.0,
        }
    }

    /// True if crossing this surface has no effect.
    #[inline]
    pub fn is_vacuum(&self) -> bool {
        self.thickness <= 0.0 || self.density <= 0.0
    }

    /// Thickness in radiation lengths for a path of `length` mm.
    #[inline]
    pub fn radiation_lengths(&self, length: f64) -> f64 {
        if self.radiation_length.is_finite() && self.radiation_length > 0.0 {
            length.abs() / self.radiation_length
        } else {
            0.0
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::vacuum()
    }
}
