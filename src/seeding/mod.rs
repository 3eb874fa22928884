//! Seed finding
//!
//! Closed-form estimators ([`fit_circle`], [`fit_line`]), the pair and
//! triplet tests, and the [`SeedFinder`] that turns hit combinations into
//! fitted [`SeedCandidate`]s.

mod candidate;
mod circle;
mod finder;
mod line;

pub use candidate::{CandidateHits, SeedCandidate, SequenceKey};
pub use circle::{fit_circle, Circle, DegenerateCircle};
pub use finder::{check_estimate, cone_angle, estimate, pair_check, SeedCuts, SeedEstimate, SeedFinder};
pub use line::{fit_line, LineFit};
