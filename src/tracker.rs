//! The tracking pipeline
//!
//! [`SeedTracker`] owns the validated strategies and drives one event:
//!
//! 1. build the [`HitIndex`]
//! 2. seed and fit every strategy (in parallel across strategies and
//!    starting hits)
//! 3. extend every fitted seed through its confirm and extend layers
//!    (in parallel across candidates)
//! 4. merge overlapping candidates (sequential)
//!
//! An iterative tracker repeats these steps once per pass, each pass seeing
//! only the hits that no earlier pass put on a track.
//!
//! Results do not depend on the number of worker threads: every stage
//! collects in input order and candidates carry a
//! [`SequenceKey`](crate::seeding::SequenceKey) fixed
//! at seeding time.

use crate::diagnostics::{Diagnostics, NoOpDiagnostics};
use crate::errors::{ConfigError, TrackingError};
use crate::event::{Hit, HitId, HitIndex, LayerId};
use crate::fit::TrajectoryFitter;
use crate::geometry::GeometryQuery;
use crate::merge::{CandidateMerger, MergePolicy};
use crate::seeding::{SeedCandidate, SeedFinder};
use crate::strategy::{FitOrder, LayerRole, SeedStrategy};
use log::debug;
use serde::Serialize;
use std::collections::HashSet;
use std::ops::Range;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Candidate counts at each stage of one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackingSummary {
    /// Hits in the event
    pub hits: usize,
    /// Seeds that passed the pair and triplet tests
    pub seeds: usize,
    /// Seeds whose initial fit succeeded
    pub fitted: usize,
    /// Fitted seeds that met the confirm and hit-count requirements
    pub extended: usize,
    /// Candidates dropped by the merger
    pub merged_away: usize,
    /// Candidates returned
    pub tracks: usize,
}

impl std::ops::AddAssign for TrackingSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.hits = self.hits.max(rhs.hits);
        self.seeds += rhs.seeds;
        self.fitted += rhs.fitted;
        self.extended += rhs.extended;
        self.merged_away += rhs.merged_away;
        self.tracks += rhs.tracks;
    }
}

/// Seed-and-fit tracker over a fixed geometry and strategy list.
pub struct SeedTracker<'g> {
    geometry: &'g dyn GeometryQuery,
    strategies: Vec<SeedStrategy>,
    /// Consecutive ranges of `strategies`, one per pass
    passes: Vec<Range<usize>>,
    merger: CandidateMerger,
    diagnostics: Box<dyn Diagnostics>,
}

impl<'g> SeedTracker<'g> {
    /// Validate `strategies` against `geometry`.
    ///
    /// Fails if the list is empty, a strategy names a layer the geometry
    /// does not have, or a confirm or extend layer sits on the wrong side of
    /// the seed layers for the strategy's fit order.
    pub fn new(
        geometry: &'g dyn GeometryQuery,
        strategies: impl IntoIterator<Item = SeedStrategy>,
    ) -> Result<Self, ConfigError> {
        Self::iterative(geometry, [strategies])
    }

    /// Tracker that runs the strategy lists one after another.
    ///
    /// Each pass indexes only the hits not used by tracks from earlier
    /// passes. Strategies are numbered across all passes, so sequence keys
    /// stay unique. Validation is as for [`new`](Self::new) and every pass
    /// must hold at least one strategy.
    pub fn iterative<S>(
        geometry: &'g dyn GeometryQuery,
        passes: impl IntoIterator<Item = S>,
    ) -> Result<Self, ConfigError>
    where
        S: IntoIterator<Item = SeedStrategy>,
    {
        let mut strategies = Vec::new();
        let mut ranges = Vec::new();
        for pass in passes {
            let start = strategies.len();
            strategies.extend(pass);
            if strategies.len() == start {
                return Err(ConfigError::NoStrategies);
            }
            ranges.push(start..strategies.len());
        }
        if strategies.is_empty() {
            return Err(ConfigError::NoStrategies);
        }
        for strategy in &strategies {
            if let Some(missing) = strategy.layers().iter().find(|l| !geometry.contains_layer(l.layer)) {
                return Err(ConfigError::UnknownLayer {
                    strategy: strategy.name().to_string(),
                    layer: missing.layer,
                });
            }
            if let Some(layer) = unreachable_layer(geometry, strategy) {
                return Err(ConfigError::UnreachableLayer {
                    strategy: strategy.name().to_string(),
                    layer,
                });
            }
        }
        Ok(Self {
            geometry,
            strategies,
            passes: ranges,
            merger: CandidateMerger::default(),
            diagnostics: Box::new(NoOpDiagnostics),
        })
    }

    /// Route rejections, fit failures and merge decisions to `diagnostics`.
    pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Box::new(diagnostics);
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merger = CandidateMerger::new(policy);
        self
    }

    /// All strategies, numbered across passes.
    pub fn strategies(&self) -> &[SeedStrategy] {
        &self.strategies
    }

    /// Strategies of each pass, in run order.
    pub fn passes(&self) -> impl Iterator<Item = &[SeedStrategy]> + '_ {
        self.passes.iter().map(|r| &self.strategies[r.clone()])
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.merger.policy()
    }

    /// Find tracks in one event.
    pub fn find_tracks(&self, hits: &[Hit]) -> Vec<SeedCandidate> {
        self.find_tracks_with_summary(hits).0
    }

    /// Find tracks and report how many candidates survived each stage.
    ///
    /// Counts are summed over passes.
    pub fn find_tracks_with_summary(&self, hits: &[Hit]) -> (Vec<SeedCandidate>, TrackingSummary) {
        let mut summary = TrackingSummary {
            hits: hits.len(),
            ..TrackingSummary::default()
        };
        let mut used: HashSet<HitId> = HashSet::new();
        let mut tracks = Vec::new();

        for (pass, range) in self.passes.iter().enumerate() {
            let index = if used.is_empty() {
                HitIndex::build(hits)
            } else {
                HitIndex::build_filtered(hits, |id| !used.contains(&id))
            };
            let (found, partial) = self.run_pass(range.clone(), &index);
            debug!(
                "pass {}: {} unused hits, {} tracks",
                pass,
                index.len(),
                found.len()
            );
            summary += partial;
            used.extend(found.iter().flat_map(|t| t.hits().iter().copied()));
            tracks.extend(found);
        }

        debug!(
            "event: {} hits, {} seeds, {} fitted, {} extended, {} tracks",
            summary.hits, summary.seeds, summary.fitted, summary.extended, summary.tracks
        );
        (tracks, summary)
    }

    /// Seed, fit, extend and merge the strategies in `range`.
    fn run_pass(&self, range: Range<usize>, index: &HitIndex<'_>) -> (Vec<SeedCandidate>, TrackingSummary) {
        let offset = range.start;
        let strategies = &self.strategies[range];

        #[cfg(feature = "rayon")]
        let per_strategy: Vec<(Vec<SeedCandidate>, TrackingSummary)> = strategies
            .par_iter()
            .enumerate()
            .map(|(i, s)| self.run_strategy(offset + i, s, index))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let per_strategy: Vec<(Vec<SeedCandidate>, TrackingSummary)> = strategies
            .iter()
            .enumerate()
            .map(|(i, s)| self.run_strategy(offset + i, s, index))
            .collect();

        let mut summary = TrackingSummary::default();
        let mut candidates = Vec::new();
        for (found, partial) in per_strategy {
            summary += partial;
            candidates.extend(found);
        }

        let before = candidates.len();
        let tracks = self.merger.merge(candidates, self.diagnostics.as_ref());
        summary.merged_away = before - tracks.len();
        summary.tracks = tracks.len();
        (tracks, summary)
    }

    fn run_strategy(
        &self,
        strategy_index: usize,
        strategy: &SeedStrategy,
        index: &HitIndex<'_>,
    ) -> (Vec<SeedCandidate>, TrackingSummary) {
        let diagnostics = self.diagnostics.as_ref();
        diagnostics.on_strategy_started(strategy, strategy_index);

        let finder = SeedFinder::new(self.geometry, strategy, strategy_index).with_diagnostics(diagnostics);
        let seeds = finder.generate(index);
        let seed_count = seeds.len();
        let fitted = finder.fit_seeds(seeds, index.hits());
        let fitted_count = fitted.len();

        let fitter = TrajectoryFitter::new(self.geometry, strategy);
        let extend_one = |mut candidate: SeedCandidate| {
            let outcome = fitter.extend(&mut candidate, index);
            if outcome.is_success() {
                Some(candidate)
            } else {
                diagnostics.on_fit_failed(&candidate, outcome);
                None
            }
        };

        #[cfg(feature = "rayon")]
        let extended: Vec<SeedCandidate> = fitted.into_par_iter().filter_map(extend_one).collect();
        #[cfg(not(feature = "rayon"))]
        let extended: Vec<SeedCandidate> = fitted.into_iter().filter_map(extend_one).collect();

        debug!(
            "strategy '{}': {} seeds, {} fitted, {} extended",
            strategy.name(),
            seed_count,
            fitted_count,
            extended.len()
        );
        let summary = TrackingSummary {
            seeds: seed_count,
            fitted: fitted_count,
            extended: extended.len(),
            ..TrackingSummary::default()
        };
        (extended, summary)
    }
}

impl std::fmt::Debug for SeedTracker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedTracker")
            .field(
                "passes",
                &self
                    .passes()
                    .map(|pass| pass.iter().map(|s| s.name()).collect::<Vec<_>>())
                    .collect::<Vec<_>>(),
            )
            .field("merger", &self.merger)
            .finish()
    }
}

/// First confirm or extend layer that extension would never visit.
///
/// Extension only searches layers beyond the last seed hit in fit order, so
/// every non-seed layer must lie outside the seed radii (forward) or inside
/// them (backward).
fn unreachable_layer(geometry: &dyn GeometryQuery, strategy: &SeedStrategy) -> Option<LayerId> {
    let order = strategy.fit_order();
    let radius = |layer: LayerId| geometry.surface_for(layer).map(|s| s.radius);
    let seed_radii = strategy.seed_layers().into_iter().filter_map(|l| radius(l));
    let last_seed = match order {
        FitOrder::Forward => seed_radii.fold(f64::NEG_INFINITY, f64::max),
        FitOrder::Backward => seed_radii.fold(f64::INFINITY, f64::min),
    };
    strategy
        .layers()
        .iter()
        .filter(|l| l.role != LayerRole::Seed)
        .map(|l| l.layer)
        .find(|&layer| radius(layer).is_some_and(|r| !order.is_beyond(last_seed, r)))
}

/// Run the full pipeline on one event with default settings.
///
/// Equivalent to `SeedTracker::new(geometry, strategies)?.find_tracks(hits)`.
pub fn find_tracks(
    hits: &[Hit],
    strategies: &[SeedStrategy],
    geometry: &dyn GeometryQuery,
) -> Result<Vec<SeedCandidate>, TrackingError> {
    let tracker = SeedTracker::new(geometry, strategies.iter().cloned())?;
    Ok(tracker.find_tracks(hits))
}
