//! Terminal status of a fit attempt

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of [`TrajectoryFitter::fit`](super::TrajectoryFitter::fit) and
/// friends.
///
/// Every variant other than `Success` leaves the candidate untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FitOutcome {
    Success,
    /// Candidate has no seed state or no hits to fit
    TooFewStates,
    /// Seed parameters or covariance are unusable
    InvalidStartState,
    /// No crossing with the next surface
    PropagationFailed,
    /// Crossing lies against the configured fit order
    PathDirectionInconsistent,
    /// Running χ² passed the strategy maximum after `accepted_hits` hits.
    /// `accepted_hits == 0` means the initial fit failed.
    ChisqExceeded { accepted_hits: usize },
    /// Innovation covariance was not positive definite
    UpdateFailed,
    /// Extension ended below the required hit or confirm count
    InsufficientHits { found: usize, required: usize },
}

impl FitOutcome {
    /// Stable integer code, `0` for success.
    pub fn code(&self) -> i32 {
        match self {
            FitOutcome::Success => 0,
            FitOutcome::TooFewStates => 1,
            FitOutcome::InvalidStartState => 2,
            FitOutcome::PropagationFailed => 3,
            FitOutcome::PathDirectionInconsistent => 5,
            FitOutcome::UpdateFailed => 6,
            FitOutcome::ChisqExceeded { .. } => 7,
            FitOutcome::InsufficientHits { .. } => 8,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, FitOutcome::Success)
    }

    /// χ² cut failed on the very first hit
    pub fn is_initial_fit_failure(&self) -> bool {
        matches!(self, FitOutcome::ChisqExceeded { accepted_hits: 0 })
    }
}

impl fmt::Display for FitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitOutcome::Success => write!(f, "success"),
            FitOutcome::TooFewStates => write!(f, "too few states"),
            FitOutcome::InvalidStartState => write!(f, "invalid start state"),
            FitOutcome::PropagationFailed => write!(f, "propagation failed"),
            FitOutcome::PathDirectionInconsistent => write!(f, "path direction inconsistent"),
            FitOutcome::ChisqExceeded { accepted_hits: 0 } => write!(f, "initial fit failed χ² cut"),
            FitOutcome::ChisqExceeded { accepted_hits } => {
                write!(f, "χ² cut exceeded after {} hits", accepted_hits)
            }
            FitOutcome::UpdateFailed => write!(f, "measurement update failed"),
            FitOutcome::InsufficientHits { found, required } => {
                write!(f, "insufficient hits: {} of {}", found, required)
            }
        }
    }
}
