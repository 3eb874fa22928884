//! Multiple scattering and the combined material update
//!
//! When a state arrives on a surface with material, the path through the
//! layer is corrected for the incidence angle, the energy loss model shifts
//! q/pT and the Highland angle inflates the direction and curvature
//! variances.

use super::{EnergyLossModel, Material};
use crate::common::constants::PT_MAX;
use crate::common::linalg::symmetrize;
use crate::fit::param::{ALPHA, QPT, TAN_LAMBDA};
use nalgebra::{Matrix5, Vector5};

/// Highland scattering coefficient (GeV)
const HIGHLAND_SCALE: f64 = 0.0136;

/// Highland logarithmic correction
const HIGHLAND_LOG: f64 = 0.038;

/// Smallest |cos α| used for the incidence correction.
const MIN_INCIDENCE_COSINE: f64 = 1e-3;

/// RMS plane scattering angle for momentum `p` (GeV), velocity `beta` and
/// `x_over_x0` radiation lengths.
pub fn highland_angle(p: f64, beta: f64, x_over_x0: f64) -> f64 {
    if x_over_x0 <= 0.0 || p <= 0.0 || beta <= 0.0 {
        return 0.0;
    }
    let log_term = (1.0 + HIGHLAND_LOG * x_over_x0.ln()).max(0.0);
    HIGHLAND_SCALE / (beta * p) * x_over_x0.sqrt() * log_term
}

/// What a surface crossing did to the state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MaterialCrossing {
    /// Signed path length inside the material (mm)
    pub path_in_material: f64,
    /// Energy before the crossing (GeV)
    pub energy_before: f64,
    /// Energy after the crossing (GeV)
    pub energy_after: f64,
    /// Highland angle (rad)
    pub scattering_angle: f64,
}

impl MaterialCrossing {
    /// True if the state was left untouched.
    pub fn is_empty(&self) -> bool {
        self.path_in_material == 0.0
    }
}

/// Apply energy loss and multiple scattering of `material` to a state on a
/// cylinder.
///
/// `direction` is `+1.0` when following the particle and `-1.0` when going
/// backwards, in which case energy is added instead of removed. States with
/// `|q/pT| < 1/PT_MAX` are treated as infinite momentum and left unchanged.
pub fn apply_material_effects<M: EnergyLossModel + ?Sized>(
    params: &mut Vector5<f64>,
    covariance: &mut Matrix5<f64>,
    material: &Material,
    model: &M,
    mass: f64,
    direction: f64,
) -> MaterialCrossing {
    let qpt = params[QPT];
    if material.is_vacuum() || qpt.abs() < 1.0 / PT_MAX {
        return MaterialCrossing::default();
    }

    let tan_lambda = params[TAN_LAMBDA];
    let sec2 = 1.0 + tan_lambda * tan_lambda;
    let cos_lambda = 1.0 / sec2.sqrt();
    let cos_alpha = params[ALPHA].cos().abs().max(MIN_INCIDENCE_COSINE);
    let length = material.thickness / (cos_alpha * cos_lambda);
    let signed_length = length * direction.signum();

    // Energy loss
    let p = 1.0 / (qpt.abs() * cos_lambda);
    let energy = (p * p + mass * mass).sqrt();
    let sigma_e = model.uncertainty(energy, signed_length);
    let new_energy = model.apply_loss(energy, signed_length);
    let new_p = (new_energy * new_energy - mass * mass).max(0.0).sqrt().max(1e-9);
    let new_qpt = qpt.signum() / (new_p * cos_lambda);

    let scale = new_qpt / qpt;
    let mut cov = *covariance;
    for i in 0..5 {
        cov[(QPT, i)] *= scale;
        cov[(i, QPT)] *= scale;
    }
    let dqpt_de = new_qpt * new_energy / (new_p * new_p);
    cov[(QPT, QPT)] += (dqpt_de * sigma_e).powi(2);
    params[QPT] = new_qpt;

    // Multiple scattering
    let beta = new_p / new_energy;
    let theta0 = highland_angle(new_p, beta, material.radiation_lengths(length));
    let theta2 = theta0 * theta0;
    cov[(ALPHA, ALPHA)] += theta2 * sec2;
    cov[(TAN_LAMBDA, TAN_LAMBDA)] += theta2 * sec2 * sec2;
    cov[(QPT, QPT)] += theta2 * (new_qpt * tan_lambda).powi(2);
    let cross = theta2 * sec2 * new_qpt * tan_lambda;
    cov[(TAN_LAMBDA, QPT)] += cross;
    cov[(QPT, TAN_LAMBDA)] += cross;

    *covariance = symmetrize(&cov);

    MaterialCrossing {
        path_in_material: signed_length,
        energy_before: energy,
        energy_after: new_energy,
        scattering_angle: theta0,
    }
}
