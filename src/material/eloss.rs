//! Energy loss models
//!
//! All models are pure functions of their inputs and safe to share across
//! concurrent fits. Energies are in GeV, path lengths in mm; a negative path
//! length means the particle is being followed backwards and gains energy.

use super::Material;
use crate::common::constants::{BETHE_K, ELECTRON_MASS};
use serde::{Deserialize, Serialize};

/// MeV/cm to GeV/mm
const MEV_PER_CM_TO_GEV_PER_MM: f64 = 1e-4;

/// Mean energy loss and its fluctuation along a path through material.
pub trait EnergyLossModel: Send + Sync {
    /// Mean energy loss per unit path length, `dE/dx` (GeV/mm, positive).
    fn rate_of_loss(&self, energy: f64) -> f64;

    /// Standard deviation of the energy loss over `path_length` (GeV).
    fn uncertainty(&self, energy: f64, path_length: f64) -> f64;

    /// Rest energy below which the particle cannot be slowed.
    fn rest_energy(&self) -> f64 {
        0.0
    }

    /// Energy after travelling `path_length`.
    ///
    /// A negative `path_length` increases the energy.
    fn apply_loss(&self, energy: f64, path_length: f64) -> f64 {
        (energy - self.rate_of_loss(energy) * path_length).max(self.rest_energy())
    }
}

// ============================================================================
// Bethe-Bloch
// ============================================================================

/// Mean ionization loss from the Bethe-Bloch formula with Bohr straggling.
///
/// No density-effect correction is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetheBloch {
    material: Material,
    mass: f64,
}

impl BetheBloch {
    /// Model for a particle of `mass` (GeV) in `material`.
    pub fn new(material: Material, mass: f64) -> Self {
        Self { material, mass }
    }

    /// `(β², γ)` for a total energy, or `None` at or below rest.
    fn kinematics(&self, energy: f64) -> Option<(f64, f64)> {
        if energy <= self.mass || self.mass <= 0.0 {
            return None;
        }
        let gamma = energy / self.mass;
        let beta2 = 1.0 - 1.0 / (gamma * gamma);
        Some((beta2, gamma))
    }
}

impl EnergyLossModel for BetheBloch {
    fn rate_of_loss(&self, energy: f64) -> f64 {
        let Some((beta2, gamma)) = self.kinematics(energy) else {
            return 0.0;
        };
        if self.material.is_vacuum() || self.material.mean_excitation <= 0.0 {
            return 0.0;
        }
        let bg2 = gamma * gamma - 1.0;
        let ratio = ELECTRON_MASS / self.mass;
        let t_max = 2.0 * ELECTRON_MASS * bg2 / (1.0 + 2.0 * gamma * ratio + ratio * ratio);
        let arg = 2.0 * ELECTRON_MASS * bg2 * t_max / self.material.mean_excitation.powi(2);
        let bracket = 0.5 * arg.ln() - beta2;
        if bracket <= 0.0 {
            return 0.0;
        }
        let de_dx = BETHE_K * self.material.z_over_a * self.material.density / beta2 * bracket;
        de_dx * MEV_PER_CM_TO_GEV_PER_MM
    }

    fn uncertainty(&self, energy: f64, path_length: f64) -> f64 {
        let Some((beta2, gamma)) = self.kinematics(energy) else {
            return 0.0;
        };
        let x_cm = path_length.abs() / 10.0;
        let electron_mev = ELECTRON_MASS * 1e3;
        let variance_mev2 = BETHE_K
            * electron_mev
            * self.material.z_over_a
            * self.material.density
            * x_cm
            * gamma
            * gamma
            * (1.0 - 0.5 * beta2);
        variance_mev2.max(0.0).sqrt() * 1e-3
    }

    fn rest_energy(&self) -> f64 {
        self.mass
    }
}

// ============================================================================
// Fixed rate
// ============================================================================

/// Constant `dE/dx` with a loss uncertainty proportional to the loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRate {
    /// Loss per mm of material (GeV/mm)
    pub rate: f64,
    /// σ of the loss as a fraction of the mean loss
    pub relative_sigma: f64,
    /// Particle mass (GeV)
    pub mass: f64,
}

impl EnergyLossModel for FixedRate {
    fn rate_of_loss(&self, _energy: f64) -> f64 {
        self.rate
    }

    fn uncertainty(&self, _energy: f64, path_length: f64) -> f64 {
        self.relative_sigma * self.rate * path_length.abs()
    }

    fn rest_energy(&self) -> f64 {
        self.mass
    }
}

// ============================================================================
// No energy loss
// ============================================================================

/// Model that never changes the energy. Useful for tests and vacuum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NoEnergyLoss;

impl EnergyLossModel for NoEnergyLoss {
    fn rate_of_loss(&self, _energy: f64) -> f64 {
        0.0
    }

    fn uncertainty(&self, _energy: f64, _path_length: f64) -> f64 {
        0.0
    }

    fn apply_loss(&self, energy: f64, _path_length: f64) -> f64 {
        energy
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Energy loss model chosen on a strategy, instantiated per material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum EnergyLossKind {
    /// Bethe-Bloch with the surface's material constants
    #[default]
    BetheBloch,
    /// Constant rate in GeV/mm of material
    FixedRate {
        /// Loss per mm (GeV/mm)
        rate: f64,
        /// σ as a fraction of the mean loss
        relative_sigma: f64,
    },
    /// Ignore energy loss
    Disabled,
}

impl EnergyLossKind {
    /// Concrete model for a particle of `mass` crossing `material`.
    pub fn for_material(&self, material: &Material, mass: f64) -> EnergyLoss {
        if material.is_vacuum() {
            return EnergyLoss::Disabled(NoEnergyLoss);
        }
        match *self {
            EnergyLossKind::BetheBloch => EnergyLoss::BetheBloch(BetheBloch::new(*material, mass)),
            EnergyLossKind::FixedRate {
                rate,
                relative_sigma,
            } => EnergyLoss::FixedRate(FixedRate {
                rate,
                relative_sigma,
                mass,
            }),
            EnergyLossKind::Disabled => EnergyLoss::Disabled(NoEnergyLoss),
        }
    }
}

/// Instantiated energy loss model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnergyLoss {
    BetheBloch(BetheBloch),
    FixedRate(FixedRate),
    Disabled(NoEnergyLoss),
}

impl EnergyLossModel for EnergyLoss {
    fn rate_of_loss(&self, energy: f64) -> f64 {
        match self {
            EnergyLoss::BetheBloch(m) => m.rate_of_loss(energy),
            EnergyLoss::FixedRate(m) => m.rate_of_loss(energy),
            EnergyLoss::Disabled(m) => m.rate_of_loss(energy),
        }
    }

    fn uncertainty(&self, energy: f64, path_length: f64) -> f64 {
        match self {
            EnergyLoss::BetheBloch(m) => m.uncertainty(energy, path_length),
            EnergyLoss::FixedRate(m) => m.uncertainty(energy, path_length),
            EnergyLoss::Disabled(m) => m.uncertainty(energy, path_length),
        }
    }

    fn rest_energy(&self) -> f64 {
        match self {
            EnergyLoss::BetheBloch(m) => m.rest_energy(),
            EnergyLoss::FixedRate(m) => m.rest_energy(),
            EnergyLoss::Disabled(m) => m.rest_energy(),
        }
    }

    fn apply_loss(&self, energy: f64, path_length: f64) -> f64 {
        match self {
            EnergyLoss::BetheBloch(m) => m.apply_loss(energy, path_length),
            EnergyLoss::FixedRate(m) => m.apply_loss(energy, path_length),
            EnergyLoss::Disabled(m) => m.apply_loss(energy, path_length),
        }
    }
}
