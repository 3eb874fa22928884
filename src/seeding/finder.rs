//! Combinatorial seed search for one strategy
//!
//! Seed layers are visited inner to outer. For every hit on the innermost
//! seed layer the finder opens an azimuth window on the next layer, applies
//! the O(1) pair test, then (for three seed layers) opens a window on the
//! outermost layer and applies the triplet test. Survivors get a closed-form
//! helix estimate and are fitted before they leave the finder.

use super::circle::{fit_circle, Circle};
use super::line::{fit_line, LineFit};
use super::{CandidateHits, SeedCandidate, SequenceKey};
use crate::common::constants::BFIELD_CONSTANT;
use crate::common::linalg::wrap_angle;
use crate::diagnostics::{Diagnostics, NoOpDiagnostics, RejectionReason};
use crate::event::{Hit, HitId, HitIndex, SearchWindow};
use crate::fit::param::{ALPHA, PHI, QPT, TAN_LAMBDA, Z};
use crate::fit::{TrackState, TrajectoryFitter};
use crate::geometry::{GeometryQuery, Surface};
use crate::strategy::{FitOrder, SeedStrategy};
use log::{debug, trace};
use nalgebra::{Matrix5, Point2, Point3, Vector5};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

static NO_DIAGNOSTICS: NoOpDiagnostics = NoOpDiagnostics;

/// Smallest variance put on the seed covariance diagonal.
const MIN_SEED_VARIANCE: f64 = 1e-12;

// ============================================================================
// Cuts
// ============================================================================

/// Strategy cutoffs resolved against the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedCuts {
    /// Smallest radius of curvature, `None` without a field
    pub min_radius: Option<f64>,
    pub max_dca: f64,
    pub max_z0: f64,
    pub phi_tolerance: f64,
    pub max_cone_angle: f64,
    pub max_chisq: f64,
}

impl SeedCuts {
    pub fn from_strategy(strategy: &SeedStrategy, bz: f64) -> Self {
        Self {
            min_radius: strategy.min_radius(bz),
            max_dca: strategy.max_dca(),
            max_z0: strategy.max_z0(),
            phi_tolerance: strategy.pair_phi_tolerance(),
            max_cone_angle: strategy.max_cone_angle(),
            max_chisq: strategy.max_chisq(),
        }
    }

    /// Largest azimuth difference between hits at radii `r1` and `r2`.
    ///
    /// A circle of radius `R` from the beam line reaches radius `r` at an
    /// azimuth offset of `asin(r/2R)`; an impact parameter `d` adds up to
    /// `asin(d/r)` at each end.
    pub fn max_delta_phi(&self, r1: f64, r2: f64) -> f64 {
        let asin = |x: f64| x.clamp(-1.0, 1.0).asin();
        let bend = match self.min_radius {
            Some(rmin) => (asin(r2 / (2.0 * rmin)) - asin(r1 / (2.0 * rmin))).abs(),
            None => 0.0,
        };
        bend + asin(self.max_dca / r1) + asin(self.max_dca / r2) + self.phi_tolerance
    }
}

// ============================================================================
// Pair and triplet tests
// ============================================================================

/// O(1) compatibility test for an inner/outer hit pair.
///
/// Checks the azimuth difference against [`SeedCuts::max_delta_phi`] and
/// the straight r-z extrapolation to the beam line against `max_z0`,
/// widened by three standard deviations of the extrapolation.
pub fn pair_check(inner: &Hit, outer: &Hit, cuts: &SeedCuts) -> Result<(), RejectionReason> {
    let (r1, r2) = (inner.r(), outer.r());
    if !(r2 > r1) {
        return Err(RejectionReason::RadialOrder);
    }
    if wrap_angle(outer.phi() - inner.phi()).abs() > cuts.max_delta_phi(r1, r2) {
        return Err(RejectionReason::PhiWindow);
    }

    let dr = r2 - r1;
    let z0 = inner.z() - r1 * (outer.z() - inner.z()) / dr;
    let sigma = ((r2 / dr).powi(2) * inner.sigma_z_squared() + (r1 / dr).powi(2) * outer.sigma_z_squared()).sqrt();
    if z0.abs() > cuts.max_z0 + 3.0 * sigma {
        return Err(RejectionReason::ZOrigin);
    }
    Ok(())
}

/// Closed-form helix estimate through two or three hits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedEstimate {
    /// Circle through the transverse points, `None` when they are collinear
    pub circle: Option<Circle>,
    /// Signed curvature (1/mm), positive counter-clockwise
    pub curvature: f64,
    /// Transverse direction of travel at the innermost hit
    pub direction: f64,
    /// Distance of closest approach to the beam line
    pub dca: f64,
    /// z against arc length measured from the innermost hit
    pub line: LineFit,
    /// Arc length from the point of closest approach to the innermost hit
    pub s_origin: f64,
    /// Transverse arc length of each hit from the innermost one
    pub arc_lengths: [f64; 3],
    /// Transverse lever arm of the points used for the circle
    pub lever_arm: f64,
}

impl SeedEstimate {
    /// Extrapolated z at the beam line.
    pub fn z0(&self) -> f64 {
        self.line.z_at(-self.s_origin)
    }

    /// Standard deviation of [`z0`](Self::z0).
    pub fn z0_sigma(&self) -> f64 {
        self.line.z_variance_at(-self.s_origin).max(0.0).sqrt()
    }

    pub fn radius(&self) -> f64 {
        self.curvature.abs().recip()
    }
}

fn transverse(hit: &Hit) -> Point2<f64> {
    Point2::new(hit.position.x, hit.position.y)
}

/// Estimate a helix through hits given inner to outer.
///
/// Two hits are completed with the beam line as the first circle point.
/// Collinear points fall back to a straight line with zero curvature.
pub fn estimate(hits: &[&Hit]) -> Result<SeedEstimate, RejectionReason> {
    let points: Vec<Point2<f64>> = hits.iter().map(|h| transverse(h)).collect();
    let (a, b, c) = match points.as_slice() {
        [p1, p2] => (Point2::origin(), *p1, *p2),
        [p1, p2, p3] => (*p1, *p2, *p3),
        _ => return Err(RejectionReason::LineFit),
    };
    let lever_arm = (c - a).norm();
    let first = points[0];
    let circle = fit_circle(&a, &b, &c).ok();

    let (curvature, direction, dca, s_origin) = match circle {
        Some(circle) => {
            let t = circle.tangent_at(&first);
            (
                circle.curvature(),
                t.y.atan2(t.x),
                circle.dca(),
                circle.arc_length(&circle.closest_approach(), &first),
            )
        }
        None => {
            let d = (c - a).try_normalize(f64::EPSILON).ok_or(RejectionReason::RadialOrder)?;
            (0.0, d.y.atan2(d.x), first.coords.perp(&d).abs(), first.coords.dot(&d))
        }
    };

    let mut arc_lengths = [0.0; 3];
    for (s, p) in arc_lengths.iter_mut().zip(&points) {
        *s = match &circle {
            Some(circle) => circle.arc_length(&first, p),
            None => (p - first).norm(),
        };
    }
    let samples: Vec<(f64, f64, f64)> = hits
        .iter()
        .zip(&arc_lengths)
        .map(|(h, &s)| (s, h.z(), h.sigma_z_squared()))
        .collect();
    let line = fit_line(&samples).ok_or(RejectionReason::LineFit)?;

    Ok(SeedEstimate {
        circle,
        curvature,
        direction,
        dca,
        line,
        s_origin,
        arc_lengths,
        lever_arm,
    })
}

/// Angle between the segments `h1→h2` and `h2→h3` in 3D.
pub fn cone_angle(h1: &Hit, h2: &Hit, h3: &Hit) -> f64 {
    let a = h2.position - h1.position;
    let b = h3.position - h2.position;
    let denom = a.norm() * b.norm();
    if denom <= 0.0 {
        return std::f64::consts::PI;
    }
    (a.dot(&b) / denom).clamp(-1.0, 1.0).acos()
}

/// Apply the seed cuts to an estimate.
///
/// `hits` are the estimate's hits inner to outer; the cone angle is only
/// tested when there are three.
pub fn check_estimate(estimate: &SeedEstimate, hits: &[&Hit], cuts: &SeedCuts) -> Result<(), RejectionReason> {
    if let Some(rmin) = cuts.min_radius {
        if estimate.radius() < rmin {
            return Err(RejectionReason::RadiusTooSmall);
        }
    }
    if estimate.dca > cuts.max_dca {
        return Err(RejectionReason::ImpactParameter);
    }
    if let [h1, h2, h3] = hits {
        if cone_angle(h1, h2, h3) > cuts.max_cone_angle {
            return Err(RejectionReason::ConeAngle);
        }
    }
    if !(estimate.line.chisq <= cuts.max_chisq) {
        return Err(RejectionReason::LineFit);
    }
    if estimate.z0().abs() > cuts.max_z0 + 3.0 * estimate.z0_sigma() {
        return Err(RejectionReason::ZOrigin);
    }
    Ok(())
}

// ============================================================================
// SeedFinder
// ============================================================================

/// Hits of an unfitted seed in fit order plus its starting state.
type RawSeed = (CandidateHits, TrackState);

/// Seed search for a single strategy.
pub struct SeedFinder<'a> {
    geometry: &'a dyn GeometryQuery,
    strategy: &'a SeedStrategy,
    strategy_index: usize,
    diagnostics: &'a dyn Diagnostics,
    cuts: SeedCuts,
    bz: f64,
}

impl<'a> SeedFinder<'a> {
    /// `strategy_index` is the strategy's position in the tracker and
    /// becomes the first component of every candidate's [`SequenceKey`].
    pub fn new(geometry: &'a dyn GeometryQuery, strategy: &'a SeedStrategy, strategy_index: usize) -> Self {
        let bz = geometry.bz_at(&Point3::origin());
        Self {
            geometry,
            strategy,
            strategy_index,
            diagnostics: &NO_DIAGNOSTICS,
            cuts: SeedCuts::from_strategy(strategy, bz),
            bz,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: &'a dyn Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn cuts(&self) -> &SeedCuts {
        &self.cuts
    }

    /// Seed and fit: every candidate returned has been fitted successfully.
    pub fn find(&self, index: &HitIndex<'_>) -> Vec<SeedCandidate> {
        let seeds = self.generate(index);
        self.fit_seeds(seeds, index.hits())
    }

    /// Unfitted seeds in a stable order.
    pub fn generate(&self, index: &HitIndex<'_>) -> Vec<SeedCandidate> {
        let Some(layers) = self.seed_surfaces() else {
            return Vec::new();
        };
        let first = index.hits_in_layer(layers[0].layer);

        #[cfg(feature = "rayon")]
        let per_hit: Vec<Vec<RawSeed>> = first
            .par_iter()
            .map(|&h1| self.seeds_from(h1, &layers, index))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let per_hit: Vec<Vec<RawSeed>> = first
            .iter()
            .map(|&h1| self.seeds_from(h1, &layers, index))
            .collect();

        let order = self.strategy.fit_order();
        let seeds: Vec<SeedCandidate> = per_hit
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(ordinal, (hits, state))| {
                SeedCandidate::new(
                    self.strategy.name(),
                    SequenceKey::new(self.strategy_index, ordinal),
                    hits,
                    state,
                    order,
                )
            })
            .collect();
        debug!(
            "strategy '{}': {} seeds from {} starting hits",
            self.strategy.name(),
            seeds.len(),
            first.len()
        );
        seeds
    }

    /// Fit seeds, reporting failures to the diagnostics sink.
    pub fn fit_seeds(&self, seeds: Vec<SeedCandidate>, hits: &[Hit]) -> Vec<SeedCandidate> {
        let fitter = TrajectoryFitter::new(self.geometry, self.strategy);
        let fit_one = |mut candidate: SeedCandidate| {
            let outcome = fitter.fit(&mut candidate, hits);
            if outcome.is_success() {
                Some(candidate)
            } else {
                trace!("seed {:?} failed: {}", candidate.key(), outcome);
                self.diagnostics.on_fit_failed(&candidate, outcome);
                None
            }
        };

        #[cfg(feature = "rayon")]
        let fitted: Vec<SeedCandidate> = seeds.into_par_iter().filter_map(fit_one).collect();
        #[cfg(not(feature = "rayon"))]
        let fitted: Vec<SeedCandidate> = seeds.into_iter().filter_map(fit_one).collect();
        fitted
    }

    /// Seed layer surfaces sorted inner to outer.
    fn seed_surfaces(&self) -> Option<Vec<Surface>> {
        let mut surfaces = self
            .strategy
            .seed_layers()
            .into_iter()
            .map(|l| self.geometry.surface_for(l))
            .collect::<Option<Vec<_>>>()?;
        surfaces.sort_by(|a, b| a.radius.total_cmp(&b.radius));
        (surfaces.len() >= 2).then_some(surfaces)
    }

    fn window(&self, from: &Hit, to: &Surface) -> SearchWindow {
        SearchWindow {
            phi_center: from.phi(),
            phi_half_width: self.cuts.max_delta_phi(from.r(), to.radius),
            z_min: f64::NEG_INFINITY,
            z_max: f64::INFINITY,
        }
    }

    fn seeds_from(&self, h1: HitId, layers: &[Surface], index: &HitIndex<'_>) -> Vec<RawSeed> {
        let mut out = Vec::new();
        let hit1 = index.hit(h1);
        for h2 in index.hits_in_layer_near(layers[1].layer, &self.window(hit1, &layers[1])) {
            let hit2 = index.hit(h2);
            if let Err(reason) = pair_check(hit1, hit2, &self.cuts) {
                self.diagnostics.on_pair_rejected(h1, h2, reason);
                continue;
            }

            if layers.len() == 2 {
                match self.build_seed(&[h1, h2], &[hit1, hit2]) {
                    Ok(seed) => out.push(seed),
                    Err(reason) => self.diagnostics.on_pair_rejected(h1, h2, reason),
                }
                continue;
            }

            for h3 in index.hits_in_layer_near(layers[2].layer, &self.window(hit2, &layers[2])) {
                let hit3 = index.hit(h3);
                match self.build_seed(&[h1, h2, h3], &[hit1, hit2, hit3]) {
                    Ok(seed) => out.push(seed),
                    Err(reason) => self.diagnostics.on_triplet_rejected([h1, h2, h3], reason),
                }
            }
        }
        out
    }

    /// Estimate, cut and place the seed state. `ids` and `hits` are inner
    /// to outer.
    fn build_seed(&self, ids: &[HitId], hits: &[&Hit]) -> Result<RawSeed, RejectionReason> {
        let estimate = estimate(hits)?;
        check_estimate(&estimate, hits, &self.cuts)?;

        let order = self.strategy.fit_order();
        let seed_index = match order {
            FitOrder::Forward => 0,
            FitOrder::Backward => hits.len() - 1,
        };
        let state = self
            .seed_state(&estimate, hits, seed_index)
            .ok_or(RejectionReason::RadialOrder)?;

        let mut fit_ids: CandidateHits = ids.iter().copied().collect();
        if order == FitOrder::Backward {
            fit_ids.reverse();
        }
        Ok((fit_ids, state))
    }

    /// Track state on the surface of `hits[seed_index]`.
    fn seed_state(&self, estimate: &SeedEstimate, hits: &[&Hit], seed_index: usize) -> Option<TrackState> {
        let hit = hits[seed_index];
        let surface = self.geometry.surface_for(hit.layer)?;
        let s = estimate.arc_lengths[seed_index];

        // Direction of travel at the seed hit
        let psi = estimate.direction + estimate.curvature * s;
        let phi = hit.phi();
        let field = BFIELD_CONSTANT * self.bz;
        let qpt = if field.abs() > f64::EPSILON {
            -estimate.curvature / field
        } else {
            0.0
        };
        let params = Vector5::new(phi, estimate.line.z_at(s), wrap_angle(psi - phi), estimate.line.slope, qpt);

        let lever = estimate.lever_arm;
        if !(lever > 0.0) {
            return None;
        }
        let sigma_rphi = hits.iter().map(|h| h.sigma_rphi_squared().max(0.0).sqrt()).sum::<f64>() / hits.len() as f64;
        let var_alpha = 2.0 * (sigma_rphi / lever).powi(2);
        let var_curvature = 1.5 * (8.0 * sigma_rphi / (lever * lever)).powi(2);
        let var_qpt = if field.abs() > f64::EPSILON {
            var_curvature / (field * field)
        } else {
            1.0
        };

        let mut cov = Matrix5::zeros();
        cov[(PHI, PHI)] = hit.measurement_covariance()[(0, 0)];
        cov[(Z, Z)] = estimate.line.z_variance_at(s);
        cov[(Z, TAN_LAMBDA)] = estimate.line.z_slope_covariance_at(s);
        cov[(TAN_LAMBDA, Z)] = cov[(Z, TAN_LAMBDA)];
        cov[(TAN_LAMBDA, TAN_LAMBDA)] = estimate.line.slope_variance;
        cov[(ALPHA, ALPHA)] = var_alpha;
        cov[(QPT, QPT)] = var_qpt;
        for i in 0..5 {
            cov[(i, i)] = cov[(i, i)].max(MIN_SEED_VARIANCE);
        }

        let state = TrackState::new(params, cov, surface, self.strategy.fit_order().state_status());
        state.is_valid().then_some(state)
    }
}
