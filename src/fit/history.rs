//! Path-length ordered sequence of track states

use super::{StateStatus, TrackState};
use crate::common::constants::PATH_EPSILON;
use crate::errors::HistoryError;
use crate::strategy::FitOrder;

/// States of one candidate, ordered by path length in the fit direction.
///
/// A history is owned by its candidate and replaced wholesale when a fit
/// commits, so readers never see a partially updated sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryHistory {
    order: FitOrder,
    states: Vec<TrackState>,
}

impl TrajectoryHistory {
    /// Empty history for a fit in `order`.
    pub fn new(order: FitOrder) -> Self {
        Self {
            order,
            states: Vec::new(),
        }
    }

    /// History holding only a seed state.
    pub fn with_seed(order: FitOrder, seed: TrackState) -> Self {
        Self {
            order,
            states: vec![seed],
        }
    }

    pub fn order(&self) -> FitOrder {
        self.order
    }

    /// Append a state, enforcing ordering and uniqueness.
    pub fn push(&mut self, state: TrackState) -> Result<(), HistoryError> {
        if let Some(last) = self.states.last() {
            if !self.order.is_ordered(last.path_length, state.path_length) {
                return Err(HistoryError::NonMonotonic {
                    last: last.path_length,
                    next: state.path_length,
                });
            }
        }
        let duplicate = self.states.iter().any(|s| {
            s.hit == state.hit
                && s.surface.layer == state.surface.layer
                && (s.path_length - state.path_length).abs() <= PATH_EPSILON
        });
        if duplicate {
            return Err(HistoryError::Duplicate {
                path_length: state.path_length,
            });
        }
        self.states.push(state);
        Ok(())
    }

    /// Change the status of the last state.
    pub(crate) fn set_last_status(&mut self, status: StateStatus) {
        if let Some(last) = self.states.last_mut() {
            last.status = status;
        }
    }

    pub fn states(&self) -> &[TrackState] {
        &self.states
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrackState> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// The seed state
    pub fn first(&self) -> Option<&TrackState> {
        self.states.first()
    }

    /// The most recent state
    pub fn last(&self) -> Option<&TrackState> {
        self.states.last()
    }

    /// Path lengths in stored order.
    pub fn path_lengths(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.path_length).collect()
    }

    /// Whether stored path lengths follow the fit order.
    pub fn is_monotonic(&self) -> bool {
        self.states
            .windows(2)
            .all(|w| self.order.is_ordered(w[0].path_length, w[1].path_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{HitId, LayerId};
    use crate::geometry::Surface;
    use crate::material::Material;
    use nalgebra::{Matrix5, Vector5};

    fn state(layer: u32, path: f64, hit: Option<usize>) -> TrackState {
        let surface = Surface::new(LayerId(layer), 10.0 * layer as f64, 100.0, Material::vacuum());
        let mut s = TrackState::new(Vector5::zeros(), Matrix5::identity(), surface, StateStatus::Forward);
        s.path_length = path;
        s.hit = hit.map(HitId);
        s
    }

    #[test]
    fn test_forward_ordering() {
        let mut h = TrajectoryHistory::with_seed(FitOrder::Forward, state(1, 0.0, None));
        h.push(state(1, 0.0, Some(0))).unwrap();
        h.push(state(2, 10.0, Some(1))).unwrap();
        assert_eq!(h.len(), 3);
        assert!(h.is_monotonic());

        let err = h.push(state(3, 5.0, Some(2))).unwrap_err();
        assert!(matches!(err, HistoryError::NonMonotonic { .. }));
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn test_backward_ordering() {
        let mut h = TrajectoryHistory::with_seed(FitOrder::Backward, state(3, 0.0, None));
        h.push(state(2, -10.0, Some(1))).unwrap();
        assert!(h.push(state(4, 5.0, Some(4))).is_err());
        assert_eq!(h.path_lengths(), vec![0.0, -10.0]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut h = TrajectoryHistory::new(FitOrder::Forward);
        h.push(state(2, 10.0, Some(1))).unwrap();
        assert!(matches!(
            h.push(state(2, 10.0, Some(1))),
            Err(HistoryError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_set_last_status() {
        let mut h = TrajectoryHistory::with_seed(FitOrder::Forward, state(1, 0.0, None));
        h.set_last_status(StateStatus::Optimal);
        assert_eq!(h.last().unwrap().status, StateStatus::Optimal);
    }
}
