//! Observability for seed finding, fitting and merging.
//!
//! This module provides the [`Diagnostics`] trait. A sink receives a
//! callback whenever the tracker throws a combination away, so cut tuning
//! can be studied offline without touching the search itself.
//!
//! # Sinks
//!
//! - [`NoOpDiagnostics`]: the default, every callback is empty
//! - [`RecordingDiagnostics`]: stores every event for later inspection
//! - [`LoggingDiagnostics`]: forwards events to the `log` facade
//! - [`CompositeDiagnostics`]: fans out to several sinks
//!
//! # Example
//!
//! ```
//! use seedtrack::diagnostics::{Diagnostics, RecordingDiagnostics, RejectionReason};
//! use seedtrack::event::HitId;
//!
//! let sink = RecordingDiagnostics::new();
//! sink.on_pair_rejected(HitId(0), HitId(3), RejectionReason::PhiWindow);
//! assert_eq!(sink.pair_rejections().len(), 1);
//! ```

use crate::event::HitId;
use crate::fit::FitOutcome;
use crate::seeding::{SeedCandidate, SequenceKey};
use crate::strategy::SeedStrategy;
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

// ============================================================================
// Rejection reasons
// ============================================================================

/// Why a hit pair or triplet did not become a seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Azimuth difference too large for any allowed curvature
    PhiWindow,
    /// Extrapolated z at the beam line outside `max_z0`
    ZOrigin,
    /// Circle radius below the `min_pt` limit
    RadiusTooSmall,
    /// Distance of closest approach above `max_dca`
    ImpactParameter,
    /// Kink between consecutive segments above `max_cone_angle`
    ConeAngle,
    /// The s-z line fit failed or its χ² exceeds `max_chisq`
    LineFit,
    /// Hits on the same radius or out of radial order
    RadialOrder,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionReason::PhiWindow => "phi window",
            RejectionReason::ZOrigin => "z origin",
            RejectionReason::RadiusTooSmall => "radius below pT limit",
            RejectionReason::ImpactParameter => "impact parameter",
            RejectionReason::ConeAngle => "cone angle",
            RejectionReason::LineFit => "s-z line fit",
            RejectionReason::RadialOrder => "radial order",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Diagnostics trait
// ============================================================================

/// Callbacks invoked by the tracker.
///
/// All methods default to no-ops, so an implementation only overrides the
/// events it cares about. Callbacks take `&self` because they are invoked
/// from parallel workers; sinks that record use interior mutability.
///
/// Callbacks must not panic. Under the `rayon` feature their order across
/// starting hits is not defined.
pub trait Diagnostics: Send + Sync {
    /// A strategy is about to be searched.
    fn on_strategy_started(&self, _strategy: &SeedStrategy, _index: usize) {}

    /// Two hits failed the pair test.
    fn on_pair_rejected(&self, _inner: HitId, _outer: HitId, _reason: RejectionReason) {}

    /// Three hits failed the triplet test (physical order, inner first).
    fn on_triplet_rejected(&self, _hits: [HitId; 3], _reason: RejectionReason) {}

    /// A seed or its extension did not produce a track.
    fn on_fit_failed(&self, _candidate: &SeedCandidate, _outcome: FitOutcome) {}

    /// The merger dropped `discarded` in favour of `kept`.
    fn on_merge_decision(&self, _kept: &SeedCandidate, _discarded: &SeedCandidate) {}
}

// ============================================================================
// NoOpDiagnostics
// ============================================================================

/// Sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpDiagnostics;

impl NoOpDiagnostics {
    pub fn new() -> Self {
        Self
    }
}

impl Diagnostics for NoOpDiagnostics {}

// ============================================================================
// RecordingDiagnostics
// ============================================================================

/// One recorded callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    StrategyStarted {
        index: usize,
        name: String,
    },
    PairRejected {
        inner: HitId,
        outer: HitId,
        reason: RejectionReason,
    },
    TripletRejected {
        hits: [HitId; 3],
        reason: RejectionReason,
    },
    FitFailed {
        key: SequenceKey,
        hits: Vec<HitId>,
        code: i32,
        outcome: String,
    },
    MergeDecision {
        kept: SequenceKey,
        discarded: SequenceKey,
        shared_hits: Vec<HitId>,
    },
}

/// Sink that stores every event.
///
/// Stores owned copies of the relevant ids only, not whole candidates.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: DiagnosticEvent) {
        // A poisoned lock only means another callback panicked mid-push.
        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event);
    }

    /// Copy of all events recorded so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drop every recorded event.
    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rejected pairs as `(inner, outer, reason)`.
    pub fn pair_rejections(&self) -> Vec<(HitId, HitId, RejectionReason)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DiagnosticEvent::PairRejected { inner, outer, reason } => Some((inner, outer, reason)),
                _ => None,
            })
            .collect()
    }

    /// Rejected triplets with their reasons.
    pub fn triplet_rejections(&self) -> Vec<([HitId; 3], RejectionReason)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DiagnosticEvent::TripletRejected { hits, reason } => Some((hits, reason)),
                _ => None,
            })
            .collect()
    }

    /// Failed fits as `(candidate key, outcome code)`.
    pub fn fit_failures(&self) -> Vec<(SequenceKey, i32)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DiagnosticEvent::FitFailed { key, code, .. } => Some((key, code)),
                _ => None,
            })
            .collect()
    }

    /// Merge decisions as `(kept, discarded)`.
    pub fn merge_decisions(&self) -> Vec<(SequenceKey, SequenceKey)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DiagnosticEvent::MergeDecision { kept, discarded, .. } => Some((kept, discarded)),
                _ => None,
            })
            .collect()
    }

    /// All events as a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.events())
    }
}

fn shared_hits(a: &SeedCandidate, b: &SeedCandidate) -> Vec<HitId> {
    a.hits().iter().copied().filter(|h| b.contains_hit(*h)).collect()
}

impl Diagnostics for RecordingDiagnostics {
    fn on_strategy_started(&self, strategy: &SeedStrategy, index: usize) {
        self.record(DiagnosticEvent::StrategyStarted {
            index,
            name: strategy.name().to_string(),
        });
    }

    fn on_pair_rejected(&self, inner: HitId, outer: HitId, reason: RejectionReason) {
        self.record(DiagnosticEvent::PairRejected { inner, outer, reason });
    }

    fn on_triplet_rejected(&self, hits: [HitId; 3], reason: RejectionReason) {
        self.record(DiagnosticEvent::TripletRejected { hits, reason });
    }

    fn on_fit_failed(&self, candidate: &SeedCandidate, outcome: FitOutcome) {
        self.record(DiagnosticEvent::FitFailed {
            key: candidate.key(),
            hits: candidate.hits().to_vec(),
            code: outcome.code(),
            outcome: outcome.to_string(),
        });
    }

    fn on_merge_decision(&self, kept: &SeedCandidate, discarded: &SeedCandidate) {
        self.record(DiagnosticEvent::MergeDecision {
            kept: kept.key(),
            discarded: discarded.key(),
            shared_hits: shared_hits(kept, discarded),
        });
    }
}

// ============================================================================
// LoggingDiagnostics
// ============================================================================

/// Sink that forwards events to the `log` crate.
///
/// Strategy starts and merge decisions go to DEBUG, rejections and fit
/// failures to TRACE. With `verbose` the strategy cutoffs are dumped as
/// JSON when a strategy starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDiagnostics {
    verbose: bool,
}

impl LoggingDiagnostics {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl Diagnostics for LoggingDiagnostics {
    fn on_strategy_started(&self, strategy: &SeedStrategy, index: usize) {
        log::debug!("strategy {} '{}' started", index, strategy.name());
        if self.verbose {
            match serde_json::to_string(&strategy.snapshot()) {
                Ok(json) => log::debug!("  cutoffs: {}", json),
                Err(e) => log::debug!("  cutoffs unavailable: {}", e),
            }
        }
    }

    fn on_pair_rejected(&self, inner: HitId, outer: HitId, reason: RejectionReason) {
        log::trace!("pair {} {} rejected: {}", inner, outer, reason);
    }

    fn on_triplet_rejected(&self, hits: [HitId; 3], reason: RejectionReason) {
        log::trace!("triplet {} {} {} rejected: {}", hits[0], hits[1], hits[2], reason);
    }

    fn on_fit_failed(&self, candidate: &SeedCandidate, outcome: FitOutcome) {
        log::trace!(
            "candidate {:?} with {} hits failed: {} (code {})",
            candidate.key(),
            candidate.num_hits(),
            outcome,
            outcome.code()
        );
    }

    fn on_merge_decision(&self, kept: &SeedCandidate, discarded: &SeedCandidate) {
        log::debug!(
            "merge: kept {:?} ({} hits, χ²/dof {:.3}) over {:?} ({} hits, χ²/dof {:.3})",
            kept.key(),
            kept.num_hits(),
            kept.chisq_per_dof(),
            discarded.key(),
            discarded.num_hits(),
            discarded.chisq_per_dof()
        );
    }
}

// ============================================================================
// CompositeDiagnostics
// ============================================================================

/// Sink that forwards each event to every child, in insertion order.
#[derive(Default)]
pub struct CompositeDiagnostics {
    sinks: Vec<Box<dyn Diagnostics>>,
}

impl CompositeDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sink.
    pub fn with(mut self, sink: impl Diagnostics + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn Diagnostics>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for CompositeDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeDiagnostics")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Diagnostics for CompositeDiagnostics {
    fn on_strategy_started(&self, strategy: &SeedStrategy, index: usize) {
        self.sinks.iter().for_each(|s| s.on_strategy_started(strategy, index));
    }

    fn on_pair_rejected(&self, inner: HitId, outer: HitId, reason: RejectionReason) {
        self.sinks.iter().for_each(|s| s.on_pair_rejected(inner, outer, reason));
    }

    fn on_triplet_rejected(&self, hits: [HitId; 3], reason: RejectionReason) {
        self.sinks.iter().for_each(|s| s.on_triplet_rejected(hits, reason));
    }

    fn on_fit_failed(&self, candidate: &SeedCandidate, outcome: FitOutcome) {
        self.sinks.iter().for_each(|s| s.on_fit_failed(candidate, outcome));
    }

    fn on_merge_decision(&self, kept: &SeedCandidate, discarded: &SeedCandidate) {
        self.sinks.iter().for_each(|s| s.on_merge_decision(kept, discarded));
    }
}

// Shared sinks: lets a caller keep a handle on a recorder it also hands
// to the tracker.
impl<D: Diagnostics + ?Sized> Diagnostics for std::sync::Arc<D> {
    fn on_strategy_started(&self, strategy: &SeedStrategy, index: usize) {
        (**self).on_strategy_started(strategy, index)
    }

    fn on_pair_rejected(&self, inner: HitId, outer: HitId, reason: RejectionReason) {
        (**self).on_pair_rejected(inner, outer, reason)
    }

    fn on_triplet_rejected(&self, hits: [HitId; 3], reason: RejectionReason) {
        (**self).on_triplet_rejected(hits, reason)
    }

    fn on_fit_failed(&self, candidate: &SeedCandidate, outcome: FitOutcome) {
        (**self).on_fit_failed(candidate, outcome)
    }

    fn on_merge_decision(&self, kept: &SeedCandidate, discarded: &SeedCandidate) {
        (**self).on_merge_decision(kept, discarded)
    }
}
