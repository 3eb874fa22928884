/*!
# seedtrack - Seed finding and Kalman fitting for layered trackers

Rust implementation of a charged-particle track finder: combinatorial seed
search over detector layers, a progressive (Kalman) trajectory fit through
material, and deterministic removal of candidates that share hits.

## Features

- Closed-form seeds from 2 or 3 layers (three-point circle, weighted s-z line fit)
- Forward or backward Kalman fit with χ² control and atomic commits
- Energy loss (Bethe-Bloch, fixed rate) and multiple scattering
- Strategy configuration with validation and JSON loading
- Optional parallel search with `rayon`, identical results at any thread count

## Modules

- [`event`] - Hits, identifiers and the per-layer [`HitIndex`]
- [`strategy`] - Seeding strategies and their validation
- [`geometry`] - The [`GeometryQuery`] interface and a barrel reference geometry
- [`material`] - Materials, energy loss and multiple scattering
- [`fit`] - Track states, histories and the [`TrajectoryFitter`]
- [`seeding`] - Seed estimators and the [`SeedFinder`]
- [`merge`] - Overlap removal
- [`diagnostics`] - Callbacks for rejected combinations and failed fits
- [`tracker`] - The [`SeedTracker`] pipeline
- [`common`] - Linear algebra, constants, synthetic events

## Example

```rust
use seedtrack::common::synthetic::{barrel_detector, generate_event, EventConfig, TruthTrack};
use seedtrack::{find_tracks, SeedStrategy};

let geometry = barrel_detector(&[30.0, 60.0, 90.0, 120.0], 500.0, 2.0, 0.3).unwrap();
let event = generate_event(&geometry, &[TruthTrack::straight(0.4, 0.1)], &EventConfig::default());

let strategy = SeedStrategy::builder("barrel")
    .seed_layer(1)
    .seed_layer(2)
    .seed_layer(3)
    .confirm_layer(4)
    .min_hits(4)
    .build()
    .unwrap();

let tracks = find_tracks(&event.hits, &[strategy], &geometry).unwrap();
assert_eq!(tracks.len(), 1);
assert_eq!(tracks[0].num_hits(), 4);
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// Digitized hits and per-layer lookup
pub mod event;

/// Seeding strategies
pub mod strategy;

/// Geometry, field and propagation
pub mod geometry;

/// Material effects
pub mod material;

/// Track states and the Kalman fitter
pub mod fit;

/// Seed estimators and combinatorial search
pub mod seeding;

/// Overlap removal between candidates
pub mod merge;

/// Observability hooks
pub mod diagnostics;

/// The event pipeline
pub mod tracker;

/// Low-level utilities (linear algebra, constants, synthetic events)
pub mod common;

/// Error types
pub mod errors;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Event data
pub use event::{Hit, HitId, HitIndex, LayerId, ParticleId, SearchWindow};

// Configuration
pub use strategy::{FitOrder, LayerRole, SeedLayer, SeedStrategy, SeedStrategyBuilder, StrategyList};

// Geometry and material
pub use geometry::{BarrelGeometry, GeometryQuery, PropagationDirection, Surface};
pub use material::{EnergyLossKind, EnergyLossModel, Material};

// Fitting
pub use fit::{FitOutcome, StateStatus, TrackState, TrajectoryFitter, TrajectoryHistory};

// Seeding and merging
pub use merge::{CandidateMerger, MergePolicy};
pub use seeding::{SeedCandidate, SeedFinder, SequenceKey};

// Pipeline
pub use tracker::{find_tracks, SeedTracker, TrackingSummary};

// Diagnostics
pub use diagnostics::{Diagnostics, NoOpDiagnostics, RecordingDiagnostics, RejectionReason};

// Errors
pub use errors::{ConfigError, HistoryError, PropagationError, TrackingError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
