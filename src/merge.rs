//! Resolution of candidates that share hits
//!
//! [`CandidateMerger`] ranks all candidates with a total order and walks
//! them best first. A candidate survives only if none of its hits has been
//! claimed by a survivor already; otherwise it is dropped and the decision
//! is reported to the diagnostics sink.
//!
//! Overlap is resolved against the survivors only. In a chain `A ∩ B`,
//! `B ∩ C` with `A ∩ C = ∅` and rank `A > B > C`, both `A` and `C` are
//! kept: `B` is gone by the time `C` is considered.

use crate::diagnostics::Diagnostics;
use crate::event::HitId;
use crate::seeding::SeedCandidate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Ranking applied when two candidates overlap.
///
/// Both policies end in the candidate's [`SequenceKey`](crate::seeding::SequenceKey),
/// so the order is total and independent of input order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// More hits, then lower χ²/dof, then lower sequence key
    #[default]
    MostHits,
    /// Lower χ²/dof, then more hits, then lower sequence key
    BestChisq,
}

impl MergePolicy {
    /// `Less` when `a` should be preferred over `b`.
    pub fn compare(self, a: &SeedCandidate, b: &SeedCandidate) -> Ordering {
        let by_hits = b.num_hits().cmp(&a.num_hits());
        let by_chisq = a.chisq_per_dof().total_cmp(&b.chisq_per_dof());
        let primary = match self {
            MergePolicy::MostHits => by_hits.then(by_chisq),
            MergePolicy::BestChisq => by_chisq.then(by_hits),
        };
        primary.then(a.key().cmp(&b.key()))
    }
}

/// Greedy overlap removal.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateMerger {
    policy: MergePolicy,
}

impl CandidateMerger {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Keep one candidate per group of hit-sharing candidates.
    ///
    /// Survivors are returned best first.
    pub fn merge(&self, mut candidates: Vec<SeedCandidate>, diagnostics: &dyn Diagnostics) -> Vec<SeedCandidate> {
        candidates.sort_by(|a, b| self.policy.compare(a, b));
        let total = candidates.len();

        let mut kept: Vec<SeedCandidate> = Vec::with_capacity(total);
        let mut owner: HashMap<HitId, usize> = HashMap::new();

        for candidate in candidates {
            let conflict = candidate.hits().iter().find_map(|h| owner.get(h).copied());
            match conflict {
                Some(k) => diagnostics.on_merge_decision(&kept[k], &candidate),
                None => {
                    let slot = kept.len();
                    owner.extend(candidate.hits().iter().map(|&h| (h, slot)));
                    kept.push(candidate);
                }
            }
        }

        debug!("merge: kept {} of {} candidates", kept.len(), total);
        kept
    }
}
