//! Seeding strategies
//!
//! A [`SeedStrategy`] names the layers to seed from, the layers that must
//! confirm a seed, the optional layers used to extend it, and every cutoff
//! applied along the way. Strategies are validated when they are built or
//! deserialized, so per-event code never sees a malformed one.

mod config;

pub use config::{SeedStrategy, SeedStrategyBuilder, StrategyList, StrategySnapshot};

use crate::event::LayerId;
use crate::fit::StateStatus;
use crate::geometry::PropagationDirection;
use serde::{Deserialize, Serialize};

/// Direction in which a candidate's hits are fitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitOrder {
    /// Inner layers first, path length increasing
    #[default]
    Forward,
    /// Outer layers first, path length decreasing
    Backward,
}

impl FitOrder {
    /// Propagation direction used when moving to the next layer.
    pub fn propagation_direction(self) -> PropagationDirection {
        match self {
            FitOrder::Forward => PropagationDirection::Forward,
            FitOrder::Backward => PropagationDirection::Backward,
        }
    }

    /// Status of an intermediate state produced by this order.
    pub fn state_status(self) -> StateStatus {
        match self {
            FitOrder::Forward => StateStatus::Forward,
            FitOrder::Backward => StateStatus::Backward,
        }
    }

    /// `+1.0` for forward, `-1.0` for backward.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            FitOrder::Forward => 1.0,
            FitOrder::Backward => -1.0,
        }
    }

    /// Whether a step of `ds` along the path agrees with this order.
    ///
    /// Steps within `tolerance` of zero are always accepted.
    pub fn accepts_step(self, ds: f64, tolerance: f64) -> bool {
        ds * self.sign() >= -tolerance
    }

    /// Whether `next` may follow `last` in a history fitted in this order.
    pub fn is_ordered(self, last: f64, next: f64) -> bool {
        match self {
            FitOrder::Forward => next >= last,
            FitOrder::Backward => next <= last,
        }
    }

    /// Sort radii so that the first element is visited first.
    pub fn sort_by_radius<T>(self, items: &mut [T], radius: impl Fn(&T) -> f64) {
        items.sort_by(|a, b| {
            let ord = radius(a).total_cmp(&radius(b));
            match self {
                FitOrder::Forward => ord,
                FitOrder::Backward => ord.reverse(),
            }
        });
    }

    /// Whether radius `r` lies beyond `reference` in this order.
    pub fn is_beyond(self, reference: f64, r: f64) -> bool {
        match self {
            FitOrder::Forward => r > reference,
            FitOrder::Backward => r < reference,
        }
    }
}

/// Role of a layer in a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerRole {
    /// Used to form the 2 or 3 hit seed
    Seed,
    /// Required confirmation layer
    Confirm,
    /// Optional extension layer
    Extend,
}

/// A layer and its role in a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedLayer {
    pub layer: LayerId,
    pub role: LayerRole,
}

impl SeedLayer {
    pub fn new(layer: LayerId, role: LayerRole) -> Self {
        Self { layer, role }
    }

    pub fn seed(layer: u32) -> Self {
        Self::new(LayerId(layer), LayerRole::Seed)
    }

    pub fn confirm(layer: u32) -> Self {
        Self::new(LayerId(layer), LayerRole::Confirm)
    }

    pub fn extend(layer: u32) -> Self {
        Self::new(LayerId(layer), LayerRole::Extend)
    }
}
