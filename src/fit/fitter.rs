//! Recursive (Kalman) trajectory fitter
//!
//! Every public operation works on a private copy of the candidate and
//! writes it back only on [`FitOutcome::Success`].

use super::param::{ALPHA, PHI, Z};
use super::{FitOutcome, StateStatus, TrackState, TrajectoryHistory};
use crate::common::constants::{PATH_EPSILON, SEED_COVARIANCE_INFLATION};
use crate::common::linalg::{kalman_update, symmetrize, wrap_angle, Projection};
use crate::event::{Hit, HitId, HitIndex, SearchWindow};
use crate::geometry::{GeometryQuery, Propagated, PropagationDirection, Surface};
use crate::material::apply_material_effects;
use crate::seeding::SeedCandidate;
use crate::strategy::{LayerRole, SeedLayer, SeedStrategy};
use log::trace;
use nalgebra::Vector2;

/// Projection of the state onto the `(φ, z)` measurement.
fn measurement_projection() -> Projection {
    let mut h = Projection::zeros();
    h[(0, PHI)] = 1.0;
    h[(1, Z)] = 1.0;
    h
}

/// Kalman fitter bound to one geometry and one strategy.
#[derive(Clone, Copy)]
pub struct TrajectoryFitter<'a> {
    geometry: &'a dyn GeometryQuery,
    strategy: &'a SeedStrategy,
}

impl<'a> TrajectoryFitter<'a> {
    pub fn new(geometry: &'a dyn GeometryQuery, strategy: &'a SeedStrategy) -> Self {
        Self { geometry, strategy }
    }

    pub fn strategy(&self) -> &'a SeedStrategy {
        self.strategy
    }

    /// Fit the candidate's hits starting from its seed state.
    ///
    /// On success the history holds the seed plus one state per hit, the
    /// last tagged `Optimal`. On failure the candidate is unchanged.
    pub fn fit(&self, candidate: &mut SeedCandidate, hits: &[Hit]) -> FitOutcome {
        let Some(seed) = candidate.history.first().cloned() else {
            return FitOutcome::TooFewStates;
        };
        if candidate.hits.is_empty() {
            return FitOutcome::TooFewStates;
        }
        match self.run_fit(&seed, &candidate.hits, hits) {
            Ok((history, chisq)) => {
                candidate.confirm_hits = self.count_confirm(&candidate.hits, hits);
                candidate.history = history;
                candidate.chisq = chisq;
                candidate.valid = true;
                FitOutcome::Success
            }
            Err(outcome) => outcome,
        }
    }

    /// Append `hit` to the candidate and refit.
    ///
    /// The hit must lie beyond the current last hit in fit order.
    pub fn add_hit(&self, candidate: &mut SeedCandidate, hit: HitId, hits: &[Hit]) -> FitOutcome {
        let Some(seed) = candidate.history.first().cloned() else {
            return FitOutcome::TooFewStates;
        };
        let mut ids = candidate.hits.clone();
        ids.push(hit);
        match self.run_fit(&seed, &ids, hits) {
            Ok((history, chisq)) => {
                candidate.confirm_hits = self.count_confirm(&ids, hits);
                candidate.hits = ids;
                candidate.history = history;
                candidate.chisq = chisq;
                candidate.valid = true;
                FitOutcome::Success
            }
            Err(outcome) => outcome,
        }
    }

    /// Grow a fitted candidate through the strategy's confirm and extend
    /// layers that lie beyond its last hit.
    ///
    /// On each layer the hit with the lowest χ² increment inside the search
    /// window is attached if it passes `bad_hit_chisq` and keeps the total
    /// within `max_chisq`. A layer the trajectory cannot reach counts as a
    /// miss. The result is committed only if `min_confirm` and `min_hits`
    /// are met.
    pub fn extend(&self, candidate: &mut SeedCandidate, index: &HitIndex<'_>) -> FitOutcome {
        let hits = index.hits();
        let Some(last) = candidate.history.last().cloned() else {
            return FitOutcome::TooFewStates;
        };
        let Some(last_hit) = last.hit else {
            return FitOutcome::TooFewStates;
        };
        let order = self.strategy.fit_order();
        let reference_v = hits[last_hit.index()].measurement_covariance();

        let mut layers: Vec<(SeedLayer, Surface)> = self
            .strategy
            .layers()
            .iter()
            .filter(|l| l.role != LayerRole::Seed)
            .filter(|l| !candidate.hits.iter().any(|h| hits[h.index()].layer == l.layer))
            .filter_map(|l| self.geometry.surface_for(l.layer).map(|s| (*l, s)))
            .filter(|(_, s)| order.is_beyond(last.surface.radius, s.radius))
            .collect();
        order.sort_by_radius(&mut layers, |(_, s)| s.radius);

        let mut work = candidate.clone();
        let mut state = last;
        let mut chisq = candidate.chisq;

        for (layer, surface) in layers {
            if work.hits.len() >= self.strategy.max_hits() {
                break;
            }
            let predicted = match self.step(&state, &surface, order.propagation_direction()) {
                Ok(p) => p,
                Err(outcome) => {
                    trace!("extension miss on {}: {}", layer.layer, outcome);
                    continue;
                }
            };

            let sigma_phi = (predicted.covariance[(PHI, PHI)] + reference_v[(0, 0)]).max(0.0).sqrt();
            let sigma_z = (predicted.covariance[(Z, Z)] + reference_v[(1, 1)]).max(0.0).sqrt();
            let window = SearchWindow::around(
                predicted.phi(),
                predicted.z(),
                sigma_phi,
                sigma_z,
                self.strategy.search_sigma(),
            );

            let best = index
                .hits_in_layer_near(layer.layer, &window)
                .into_iter()
                .filter_map(|id| self.update(&predicted, index.hit(id), id).map(|(s, dchi)| (id, s, dchi)))
                .min_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)));

            match best {
                Some((id, mut updated, dchi))
                    if dchi <= self.strategy.bad_hit_chisq() && chisq + dchi <= self.strategy.max_chisq() =>
                {
                    chisq += dchi;
                    updated.chisq = chisq;
                    updated.status = StateStatus::Optimal;
                    work.history.set_last_status(order.state_status());
                    if work.history.push(updated.clone()).is_err() {
                        return FitOutcome::PathDirectionInconsistent;
                    }
                    work.hits.push(id);
                    state = updated;
                }
                Some((id, _, dchi)) => {
                    trace!("extension on {}: best hit {} rejected with Δχ² {:.3}", layer.layer, id, dchi);
                    state = predicted;
                }
                None => {
                    state = predicted;
                }
            }
        }

        work.confirm_hits = self.count_confirm(&work.hits, hits);
        if work.confirm_hits < self.strategy.min_confirm() {
            return FitOutcome::InsufficientHits {
                found: work.confirm_hits,
                required: self.strategy.min_confirm(),
            };
        }
        if work.hits.len() < self.strategy.min_hits() {
            return FitOutcome::InsufficientHits {
                found: work.hits.len(),
                required: self.strategy.min_hits(),
            };
        }
        work.chisq = chisq;
        work.valid = true;
        *candidate = work;
        FitOutcome::Success
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn run_fit(
        &self,
        seed: &TrackState,
        ids: &[HitId],
        hits: &[Hit],
    ) -> Result<(TrajectoryHistory, f64), FitOutcome> {
        if !seed.is_valid() {
            return Err(FitOutcome::InvalidStartState);
        }
        let order = self.strategy.fit_order();
        let mut stored_seed = seed.clone();
        stored_seed.status = order.state_status();
        stored_seed.chisq = 0.0;
        let mut history = TrajectoryHistory::with_seed(order, stored_seed);

        let mut state = seed.clone();
        state.covariance = symmetrize(&(state.covariance * SEED_COVARIANCE_INFLATION));
        state.chisq = 0.0;

        let mut chisq = 0.0;
        for (i, &id) in ids.iter().enumerate() {
            let hit = &hits[id.index()];
            let target = self
                .geometry
                .surface_for(hit.layer)
                .ok_or(FitOutcome::PropagationFailed)?;
            // the seed sits on the first hit's surface
            let direction = if i == 0 {
                PropagationDirection::Nearest
            } else {
                order.propagation_direction()
            };
            let predicted = self.step(&state, &target, direction)?;
            let (mut updated, dchi) = self.update(&predicted, hit, id).ok_or(FitOutcome::UpdateFailed)?;

            chisq += dchi;
            if chisq > self.strategy.max_chisq() {
                trace!("χ² {:.3} above {} after {} hits", chisq, self.strategy.max_chisq(), i);
                return Err(FitOutcome::ChisqExceeded { accepted_hits: i });
            }
            updated.chisq = chisq;
            updated.status = if i + 1 == ids.len() {
                StateStatus::Optimal
            } else {
                order.state_status()
            };
            history
                .push(updated.clone())
                .map_err(|_| FitOutcome::PathDirectionInconsistent)?;
            state = updated;
        }
        Ok((history, chisq))
    }

    /// Propagate to `target`, check the direction and apply its material.
    fn step(
        &self,
        state: &TrackState,
        target: &Surface,
        direction: PropagationDirection,
    ) -> Result<TrackState, FitOutcome> {
        let Propagated {
            state: mut next,
            path_length,
        } = match self.geometry.propagate(state, target, direction) {
            Ok(propagated) => propagated,
            // reachable, but only against the fit order
            Err(_)
                if direction != PropagationDirection::Nearest
                    && self.geometry.propagate(state, target, PropagationDirection::Nearest).is_ok() =>
            {
                return Err(FitOutcome::PathDirectionInconsistent);
            }
            Err(e) => {
                trace!("propagation to {} failed: {}", target.layer, e);
                return Err(FitOutcome::PropagationFailed);
            }
        };

        if !self.strategy.fit_order().accepts_step(path_length, PATH_EPSILON) {
            return Err(FitOutcome::PathDirectionInconsistent);
        }
        if path_length.abs() > PATH_EPSILON {
            let mass = self.strategy.particle_mass();
            let model = self.strategy.energy_loss().for_material(&target.material, mass);
            apply_material_effects(
                &mut next.params,
                &mut next.covariance,
                &target.material,
                &model,
                mass,
                path_length.signum(),
            );
        }
        Ok(next)
    }

    /// Kalman update of a predicted state with one hit.
    fn update(&self, predicted: &TrackState, hit: &Hit, id: HitId) -> Option<(TrackState, f64)> {
        let m = hit.measurement();
        let residual = Vector2::new(wrap_angle(m[0] - predicted.phi()), m[1] - predicted.z());
        let v = hit.measurement_covariance();
        let upd = kalman_update(
            &predicted.params,
            &predicted.covariance,
            &residual,
            &measurement_projection(),
            &v,
        )?;
        let mut params = upd.state;
        params[PHI] = wrap_angle(params[PHI]);
        params[ALPHA] = wrap_angle(params[ALPHA]);
        Some((
            TrackState {
                params,
                covariance: upd.covariance,
                hit: Some(id),
                ..predicted.clone()
            },
            upd.chisq,
        ))
    }

    fn count_confirm(&self, ids: &[HitId], hits: &[Hit]) -> usize {
        ids.iter()
            .filter(|h| self.strategy.role_of(hits[h.index()].layer) == Some(LayerRole::Confirm))
            .count()
    }
}
