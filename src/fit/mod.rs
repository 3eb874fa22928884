//! Track states, trajectory histories and the Kalman fitter
//!
//! [`TrajectoryFitter`] takes a [`SeedCandidate`](crate::seeding::SeedCandidate)
//! and runs a progressive least-squares fit over its hits:
//!
//! 1. propagate the current state to the next hit's surface
//! 2. apply the surface material (energy loss, multiple scattering)
//! 3. Kalman update with the hit's `(φ, z)` measurement
//! 4. accumulate χ² and abort once it passes the strategy maximum
//!
//! The seed covariance is inflated by
//! [`SEED_COVARIANCE_INFLATION`](crate::common::constants::SEED_COVARIANCE_INFLATION)
//! before the first propagation.

mod fitter;
mod history;
mod outcome;
mod state;

pub use fitter::TrajectoryFitter;
pub use history::TrajectoryHistory;
pub use outcome::FitOutcome;
pub use state::{param, StateStatus, TrackState};
