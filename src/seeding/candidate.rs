//! Seed candidates: hits, fitted trajectory and bookkeeping

use crate::event::{Hit, HitId, ParticleId};
use crate::fit::{TrackState, TrajectoryHistory};
use crate::strategy::FitOrder;
use serde::Serialize;
use smallvec::SmallVec;

/// Hit list of a candidate, in fit order.
pub type CandidateHits = SmallVec<[HitId; 8]>;

/// Stable ordering key: strategy position, then generation order within it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SequenceKey {
    pub strategy: usize,
    pub ordinal: usize,
}

impl SequenceKey {
    pub fn new(strategy: usize, ordinal: usize) -> Self {
        Self { strategy, ordinal }
    }
}

/// A track candidate built from a seed and grown by the fitter.
///
/// The history always starts with the seed state; after a successful fit
/// it holds one more state per hit and ends with an `Optimal` state.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedCandidate {
    pub(crate) hits: CandidateHits,
    pub(crate) history: TrajectoryHistory,
    pub(crate) chisq: f64,
    pub(crate) valid: bool,
    pub(crate) strategy: String,
    pub(crate) key: SequenceKey,
    pub(crate) confirm_hits: usize,
}

impl SeedCandidate {
    /// Unfitted candidate with a seed state.
    pub fn new(
        strategy: impl Into<String>,
        key: SequenceKey,
        hits: impl IntoIterator<Item = HitId>,
        seed: TrackState,
        order: FitOrder,
    ) -> Self {
        Self {
            hits: hits.into_iter().collect(),
            history: TrajectoryHistory::with_seed(order, seed),
            chisq: 0.0,
            valid: false,
            strategy: strategy.into(),
            key,
            confirm_hits: 0,
        }
    }

    /// Hits in fit order
    pub fn hits(&self) -> &[HitId] {
        &self.hits
    }

    pub fn num_hits(&self) -> usize {
        self.hits.len()
    }

    pub fn history(&self) -> &TrajectoryHistory {
        &self.history
    }

    /// Total χ² of the last successful fit
    pub fn chisq(&self) -> f64 {
        self.chisq
    }

    /// Two measured coordinates per hit, five fitted parameters.
    pub fn degrees_of_freedom(&self) -> usize {
        (2 * self.hits.len()).saturating_sub(5).max(1)
    }

    pub fn chisq_per_dof(&self) -> f64 {
        self.chisq / self.degrees_of_freedom() as f64
    }

    /// True once a fit has been committed
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Name of the strategy that produced the candidate
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn key(&self) -> SequenceKey {
        self.key
    }

    /// Hits on confirmation layers
    pub fn confirm_hits(&self) -> usize {
        self.confirm_hits
    }

    pub fn seed_state(&self) -> Option<&TrackState> {
        self.history.first()
    }

    /// Best estimate of the track parameters.
    pub fn final_state(&self) -> Option<&TrackState> {
        self.history.last()
    }

    pub fn contains_hit(&self, hit: HitId) -> bool {
        self.hits.contains(&hit)
    }

    pub fn shares_hit_with(&self, other: &SeedCandidate) -> bool {
        self.hits.iter().any(|h| other.contains_hit(*h))
    }

    /// Truth particle shared by every hit, if there is one.
    pub fn truth_particle(&self, hits: &[Hit]) -> Option<ParticleId> {
        let mut particles = self.hits.iter().map(|h| hits[h.index()].truth);
        let first = particles.next()??;
        particles.all(|p| p == Some(first)).then_some(first)
    }

    /// All hits come from the same simulated particle.
    pub fn is_true_seed(&self, hits: &[Hit]) -> bool {
        self.truth_particle(hits).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LayerId;
    use crate::fit::StateStatus;
    use crate::geometry::Surface;
    use crate::material::Material;
    use nalgebra::{Matrix3, Matrix5, Point3, Vector5};

    fn seed() -> TrackState {
        let surface = Surface::new(LayerId(1), 30.0, 100.0, Material::vacuum());
        TrackState::new(Vector5::zeros(), Matrix5::identity(), surface, StateStatus::Forward)
    }

    fn hit(truth: Option<u64>) -> Hit {
        let h = Hit::new(LayerId(1), Point3::new(1.0, 0.0, 0.0), Matrix3::identity());
        match truth {
            Some(p) => h.with_truth(ParticleId(p)),
            None => h,
        }
    }

    #[test]
    fn test_new_candidate_is_unfitted() {
        let c = SeedCandidate::new("s", SequenceKey::new(0, 3), [HitId(0), HitId(1), HitId(2)], seed(), FitOrder::Forward);
        assert!(!c.is_valid());
        assert_eq!(c.num_hits(), 3);
        assert_eq!(c.history().len(), 1);
        assert_eq!(c.degrees_of_freedom(), 1);
        assert_eq!(c.key(), SequenceKey::new(0, 3));
    }

    #[test]
    fn test_true_seed() {
        let hits = vec![hit(Some(7)), hit(Some(7)), hit(Some(8)), hit(None)];
        let same = SeedCandidate::new("s", SequenceKey::default(), [HitId(0), HitId(1)], seed(), FitOrder::Forward);
        let mixed = SeedCandidate::new("s", SequenceKey::default(), [HitId(0), HitId(2)], seed(), FitOrder::Forward);
        let noise = SeedCandidate::new("s", SequenceKey::default(), [HitId(3), HitId(0)], seed(), FitOrder::Forward);
        assert!(same.is_true_seed(&hits));
        assert_eq!(same.truth_particle(&hits), Some(ParticleId(7)));
        assert!(!mixed.is_true_seed(&hits));
        assert!(!noise.is_true_seed(&hits));
    }

    #[test]
    fn test_shared_hits() {
        let a = SeedCandidate::new("s", SequenceKey::default(), [HitId(0), HitId(1)], seed(), FitOrder::Forward);
        let b = SeedCandidate::new("s", SequenceKey::default(), [HitId(1), HitId(5)], seed(), FitOrder::Forward);
        let c = SeedCandidate::new("s", SequenceKey::default(), [HitId(6)], seed(), FitOrder::Forward);
        assert!(a.shares_hit_with(&b));
        assert!(!a.shares_hit_with(&c));
    }

    #[test]
    fn test_sequence_key_order() {
        assert!(SequenceKey::new(0, 9) < SequenceKey::new(1, 0));
        assert!(SequenceKey::new(1, 2) < SequenceKey::new(1, 3));
    }
}
