//! Helix transport between coaxial cylinders
//!
//! The transverse motion is parametrised by the transverse arc length `s`:
//!
//! `p(s) = p0 + s·sinc(κs/2)·(cos(ψ + κs/2), sin(ψ + κs/2))`
//!
//! which stays finite as `κ → 0`. `κ = f·(q/pT)` with `f = -k·Bz`.

use super::PropagationDirection;
use crate::common::constants::{
    JACOBIAN_STEP, MAX_NEWTON_ITERATIONS, NEARLY_STRAIGHT_LIMIT, PATH_EPSILON,
};
use crate::common::linalg::{sinc, wrap_angle};
use crate::fit::param::{ALPHA, PHI, QPT, TAN_LAMBDA, Z};
use nalgebra::{Matrix5, Vector2, Vector5};
use std::f64::consts::PI;

/// Transverse position on a helix `s` after the state point.
fn position_at(params: &Vector5<f64>, r0: f64, kappa: f64, s: f64) -> Vector2<f64> {
    let phi = params[PHI];
    let psi = phi + params[ALPHA];
    let half = 0.5 * kappa * s;
    let chord = s * sinc(half);
    Vector2::new(
        r0 * phi.cos() + chord * (psi + half).cos(),
        r0 * phi.sin() + chord * (psi + half).sin(),
    )
}

/// State parameters after a transverse arc length `s`.
pub(crate) fn evaluate(params: &Vector5<f64>, r0: f64, field_factor: f64, s: f64) -> Vector5<f64> {
    let kappa = field_factor * params[QPT];
    let p = position_at(params, r0, kappa, s);
    let phi1 = p.y.atan2(p.x);
    let psi1 = params[PHI] + params[ALPHA] + kappa * s;
    Vector5::new(
        phi1,
        params[Z] + s * params[TAN_LAMBDA],
        wrap_angle(psi1 - phi1),
        params[TAN_LAMBDA],
        params[QPT],
    )
}

/// Pick the root that `direction` selects.
fn select(candidates: &[f64], direction: PropagationDirection) -> Option<f64> {
    let finite = candidates.iter().copied().filter(|s| s.is_finite());
    match direction {
        PropagationDirection::Forward => finite.filter(|&s| s >= -PATH_EPSILON).min_by(f64::total_cmp),
        PropagationDirection::Backward => finite.filter(|&s| s <= PATH_EPSILON).max_by(f64::total_cmp),
        PropagationDirection::Nearest => finite.min_by(|a, b| a.abs().total_cmp(&b.abs())),
    }
}

/// Newton refinement of `|p(s)|² = r1²`.
fn refine(params: &Vector5<f64>, r0: f64, kappa: f64, r1: f64, mut s: f64) -> f64 {
    let psi = params[PHI] + params[ALPHA];
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let p = position_at(params, r0, kappa, s);
        let f = p.norm_squared() - r1 * r1;
        let t = psi + kappa * s;
        let df = 2.0 * (p.x * t.cos() + p.y * t.sin());
        if df.abs() < f64::EPSILON {
            break;
        }
        let step = f / df;
        s -= step;
        if step.abs() <= 1e-13 * s.abs().max(1.0) {
            break;
        }
    }
    s
}

/// Transverse arc length to the cylinder of radius `r1`, or `None` if the
/// helix never reaches it in the requested direction.
pub(crate) fn intersect(
    params: &Vector5<f64>,
    r0: f64,
    r1: f64,
    field_factor: f64,
    direction: PropagationDirection,
) -> Option<f64> {
    let kappa = field_factor * params[QPT];
    let phi = params[PHI];
    let psi = phi + params[ALPHA];
    let p0 = Vector2::new(r0 * phi.cos(), r0 * phi.sin());

    if kappa.abs() * r0.max(r1) < NEARLY_STRAIGHT_LIMIT {
        let d = Vector2::new(psi.cos(), psi.sin());
        let b = p0.dot(&d);
        let disc = b * b - (r0 * r0 - r1 * r1);
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        let s = select(&[-b - sq, -b + sq], direction)?;
        if kappa == 0.0 {
            return Some(s);
        }
        return Some(refine(params, r0, kappa, r1, s));
    }

    // Exact circle-circle intersection
    let radius = 1.0 / kappa.abs();
    let normal = Vector2::new(-psi.sin(), psi.cos());
    let center = p0 + normal / kappa;
    let d = center.norm();
    if d < f64::EPSILON || d > radius + r1 || d < (radius - r1).abs() {
        return None;
    }
    let a = (r1 * r1 - radius * radius + d * d) / (2.0 * d);
    let h = (r1 * r1 - a * a).max(0.0).sqrt();
    let c_hat = center / d;
    let c_perp = Vector2::new(-c_hat.y, c_hat.x);
    let period = 2.0 * PI / kappa.abs();

    let u0 = p0 - center;
    let mut candidates = [0.0; 6];
    for (k, sign) in [1.0, -1.0].into_iter().enumerate() {
        let point = c_hat * a + c_perp * (sign * h);
        let u = point - center;
        let delta = (u0.x * u.y - u0.y * u.x).atan2(u0.dot(&u));
        let s = delta / kappa;
        candidates[3 * k] = s;
        candidates[3 * k + 1] = s + period;
        candidates[3 * k + 2] = s - period;
    }
    select(&candidates, direction)
}

/// Central-difference Jacobian `∂params(s)/∂params(0)` of the transport to
/// radius `r1`, holding the branch fixed by `direction`.
pub(crate) fn jacobian(
    params: &Vector5<f64>,
    r0: f64,
    r1: f64,
    field_factor: f64,
    direction: PropagationDirection,
) -> Option<Matrix5<f64>> {
    let transported = |x: &Vector5<f64>| {
        intersect(x, r0, r1, field_factor, direction).map(|s| evaluate(x, r0, field_factor, s))
    };
    let difference = |a: &Vector5<f64>, b: &Vector5<f64>| {
        let mut d = a - b;
        d[PHI] = wrap_angle(d[PHI]);
        d[ALPHA] = wrap_angle(d[ALPHA]);
        d
    };

    let center = transported(params)?;
    let mut jac = Matrix5::zeros();
    for j in 0..5 {
        let h = JACOBIAN_STEP * params[j].abs().max(1.0);
        let mut plus = *params;
        let mut minus = *params;
        plus[j] += h;
        minus[j] -= h;
        let column = match (transported(&plus), transported(&minus)) {
            (Some(fp), Some(fm)) => difference(&fp, &fm) / (2.0 * h),
            (Some(fp), None) => difference(&fp, &center) / h,
            (None, Some(fm)) => difference(&center, &fm) / h,
            (None, None) => return None,
        };
        jac.set_column(j, &column);
    }
    Some(jac)
}
