//! Error types for configuration, propagation and trajectory bookkeeping
//!
//! Only [`ConfigError`] is fatal. Propagation and history errors are values
//! that the fitter turns into a [`FitOutcome`](crate::fit::FitOutcome); they
//! never escape a per-event call.

use crate::event::LayerId;
use thiserror::Error;

/// Errors in a [`SeedStrategy`](crate::strategy::SeedStrategy) or in the
/// combination of strategies and geometry handed to the tracker.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Strategy has no name
    #[error("strategy name must not be empty")]
    EmptyName,

    /// Seed layer count is not 2 or 3
    #[error("strategy '{strategy}' has {count} seed layers, expected 2 or 3")]
    SeedLayerCount {
        /// Strategy name
        strategy: String,
        /// Number of seed layers found
        count: usize,
    },

    /// Same layer listed twice
    #[error("strategy '{strategy}' lists layer {layer} more than once")]
    DuplicateLayer {
        /// Strategy name
        strategy: String,
        /// Repeated layer
        layer: LayerId,
    },

    /// Numeric cutoff outside its valid range
    #[error("strategy '{strategy}': {parameter} = {value} is invalid ({reason})")]
    InvalidParameter {
        /// Strategy name
        strategy: String,
        /// Parameter name
        parameter: &'static str,
        /// Offending value
        value: f64,
        /// Expected range
        reason: &'static str,
    },

    /// Two hit-count cutoffs contradict each other
    #[error("strategy '{strategy}': {description}")]
    InconsistentCounts {
        /// Strategy name
        strategy: String,
        /// Description of the contradiction
        description: String,
    },

    /// Strategy refers to a layer the geometry does not know
    #[error("strategy '{strategy}' references layer {layer} which is not in the geometry")]
    UnknownLayer {
        /// Strategy name
        strategy: String,
        /// Missing layer
        layer: LayerId,
    },

    /// Confirm or extend layer that extension never visits
    #[error("strategy '{strategy}': layer {layer} does not lie beyond the seed layers in fit order")]
    UnreachableLayer {
        /// Strategy name
        strategy: String,
        /// Layer that is never searched
        layer: LayerId,
    },

    /// Geometry description is unusable
    #[error("invalid geometry: {description}")]
    InvalidGeometry {
        /// Description of the problem
        description: String,
    },

    /// No strategies supplied
    #[error("at least one strategy is required")]
    NoStrategies,

    /// Strategy file could not be parsed
    #[error("failed to parse strategy list: {message}")]
    Parse {
        /// Parser message
        message: String,
    },
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse {
            message: e.to_string(),
        }
    }
}

/// Failure to move a track state onto a target surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropagationError {
    /// Trajectory never reaches the target radius
    #[error("no intersection with surface at layer {layer}")]
    NoIntersection {
        /// Target layer
        layer: LayerId,
    },

    /// Intersection lies outside the surface bounds
    #[error("crossing at z = {z:.3} outside layer {layer} (half-length {half_length:.3})")]
    OutOfBounds {
        /// Target layer
        layer: LayerId,
        /// z of the crossing
        z: f64,
        /// Half-length of the surface
        half_length: f64,
    },

    /// Layer not present in the geometry
    #[error("unknown layer {layer}")]
    UnknownSurface {
        /// Requested layer
        layer: LayerId,
    },

    /// Track parameters are not finite or not on a valid surface
    #[error("invalid state: {description}")]
    InvalidState {
        /// Description of the problem
        description: String,
    },
}

/// Attempt to break the ordering invariant of a
/// [`TrajectoryHistory`](crate::fit::TrajectoryHistory).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    /// Path length goes against the fit order
    #[error("path length {next:.6} breaks ordering after {last:.6}")]
    NonMonotonic {
        /// Path length of the last stored state
        last: f64,
        /// Path length of the rejected state
        next: f64,
    },

    /// State duplicates one already stored
    #[error("duplicate state at path length {path_length:.6}")]
    Duplicate {
        /// Path length of the duplicate
        path_length: f64,
    },
}

/// Top-level error of the tracking pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let e = ConfigError::SeedLayerCount {
            strategy: "inner".into(),
            count: 4,
        };
        assert_eq!(
            e.to_string(),
            "strategy 'inner' has 4 seed layers, expected 2 or 3"
        );
    }

    #[test]
    fn test_parse_error_from_json() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let e: ConfigError = err.into();
        assert!(matches!(e, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_tracking_error_wraps_config() {
        let e: TrackingError = ConfigError::NoStrategies.into();
        assert!(e.to_string().contains("at least one strategy"));
    }
}
