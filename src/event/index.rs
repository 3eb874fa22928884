//! Per-layer hit lookup
//!
//! [`HitIndex`] partitions an event's hits by layer once and keeps each
//! layer's hits sorted by azimuth, so windowed queries cost a binary search
//! plus the size of the answer.

use super::hit::{Hit, HitId, LayerId};
use crate::common::linalg::wrap_angle;
use std::collections::HashMap;
use std::f64::consts::PI;

/// Geometric window for compatible-hit lookup on one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchWindow {
    /// Window centre in azimuth
    pub phi_center: f64,
    /// Half-width in azimuth (radians); `>= π` selects the full ring
    pub phi_half_width: f64,
    /// Lower z bound (mm)
    pub z_min: f64,
    /// Upper z bound (mm)
    pub z_max: f64,
}

impl SearchWindow {
    /// Window over the full azimuth with the given z range.
    pub fn full_ring(z_min: f64, z_max: f64) -> Self {
        Self {
            phi_center: 0.0,
            phi_half_width: PI,
            z_min,
            z_max,
        }
    }

    /// Window of `n_sigma` standard deviations around a predicted `(φ, z)`.
    pub fn around(phi: f64, z: f64, sigma_phi: f64, sigma_z: f64, n_sigma: f64) -> Self {
        let dz = n_sigma * sigma_z;
        Self {
            phi_center: wrap_angle(phi),
            phi_half_width: n_sigma * sigma_phi,
            z_min: z - dz,
            z_max: z + dz,
        }
    }

    /// Whether a point lies inside the window.
    pub fn contains(&self, phi: f64, z: f64) -> bool {
        z >= self.z_min
            && z <= self.z_max
            && wrap_angle(phi - self.phi_center).abs() <= self.phi_half_width
    }
}

/// Hits of one event grouped by layer and sorted by azimuth.
///
/// Built once per event; read-only and shareable across workers afterwards.
#[derive(Debug, Clone)]
pub struct HitIndex<'a> {
    hits: &'a [Hit],
    by_layer: HashMap<LayerId, Vec<(f64, HitId)>>,
    indexed: usize,
}

impl<'a> HitIndex<'a> {
    /// Partition `hits` by layer.
    pub fn build(hits: &'a [Hit]) -> Self {
        Self::build_filtered(hits, |_| true)
    }

    /// Partition only the hits for which `keep` returns true.
    ///
    /// Ids still index the full `hits` slice, so candidates built from a
    /// filtered index refer to the same hits as the event.
    pub fn build_filtered(hits: &'a [Hit], keep: impl Fn(HitId) -> bool) -> Self {
        let mut by_layer: HashMap<LayerId, Vec<(f64, HitId)>> = HashMap::new();
        let mut indexed = 0;
        for (i, hit) in hits.iter().enumerate() {
            if !keep(HitId(i)) {
                continue;
            }
            by_layer
                .entry(hit.layer)
                .or_default()
                .push((hit.phi(), HitId(i)));
            indexed += 1;
        }
        for entries in by_layer.values_mut() {
            entries.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        }
        Self { hits, by_layer, indexed }
    }

    /// The underlying event slice
    #[inline]
    pub fn hits(&self) -> &'a [Hit] {
        self.hits
    }

    /// Look up a hit by id.
    #[inline]
    pub fn hit(&self, id: HitId) -> &'a Hit {
        &self.hits[id.index()]
    }

    /// Number of indexed hits
    #[inline]
    pub fn len(&self) -> usize {
        self.indexed
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indexed == 0
    }

    /// Layers that have at least one hit, in ascending id order.
    pub fn layers(&self) -> Vec<LayerId> {
        let mut layers: Vec<_> = self.by_layer.keys().copied().collect();
        layers.sort();
        layers
    }

    /// All hits on a layer, ordered by azimuth.
    pub fn hits_in_layer(&self, layer: LayerId) -> Vec<HitId> {
        self.by_layer
            .get(&layer)
            .map(|entries| entries.iter().map(|&(_, id)| id).collect())
            .unwrap_or_default()
    }

    /// Number of hits on a layer.
    pub fn count_in_layer(&self, layer: LayerId) -> usize {
        self.by_layer.get(&layer).map_or(0, Vec::len)
    }

    /// Hits on a layer inside `window`, walking the window in increasing
    /// azimuth (across the ±π seam when it wraps).
    pub fn hits_in_layer_near(&self, layer: LayerId, window: &SearchWindow) -> Vec<HitId> {
        let Some(entries) = self.by_layer.get(&layer) else {
            return Vec::new();
        };
        let in_z = |id: HitId| {
            let z = self.hits[id.index()].z();
            z >= window.z_min && z <= window.z_max
        };

        if window.phi_half_width >= PI {
            return entries.iter().map(|&(_, id)| id).filter(|&id| in_z(id)).collect();
        }
        if window.phi_half_width < 0.0 {
            return Vec::new();
        }

        let lo = wrap_angle(window.phi_center - window.phi_half_width);
        let hi = wrap_angle(window.phi_center + window.phi_half_width);
        let start = |bound: f64| entries.partition_point(|&(phi, _)| phi < bound);
        let end = |bound: f64| entries.partition_point(|&(phi, _)| phi <= bound);

        let ranges: [&[(f64, HitId)]; 2] = if lo <= hi {
            [&entries[start(lo)..end(hi)], &[]]
        } else {
            [&entries[start(lo)..], &entries[..end(hi)]]
        };

        ranges
            .iter()
            .flat_map(|r| r.iter())
            .map(|&(_, id)| id)
            .filter(|&id| in_z(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Point3};

    fn hit_at(layer: u32, phi: f64, z: f64) -> Hit {
        let r = 10.0 * (layer as f64 + 1.0);
        Hit::new(
            LayerId(layer),
            Point3::new(r * phi.cos(), r * phi.sin(), z),
            Matrix3::identity() * 1e-4,
        )
    }

    #[test]
    fn test_partition_by_layer() {
        let hits = vec![hit_at(0, 0.1, 0.0), hit_at(1, 0.2, 0.0), hit_at(0, -0.5, 0.0)];
        let index = HitIndex::build(&hits);

        assert_eq!(index.layers(), vec![LayerId(0), LayerId(1)]);
        // sorted by φ
        assert_eq!(index.hits_in_layer(LayerId(0)), vec![HitId(2), HitId(0)]);
        assert_eq!(index.hits_in_layer(LayerId(1)), vec![HitId(1)]);
        assert!(index.hits_in_layer(LayerId(9)).is_empty());
        assert_eq!(index.count_in_layer(LayerId(0)), 2);
    }

    #[test]
    fn test_filtered_index_keeps_event_ids() {
        let hits = vec![hit_at(0, 0.1, 0.0), hit_at(1, 0.2, 0.0), hit_at(0, -0.5, 0.0), hit_at(1, 0.4, 0.0)];
        let index = HitIndex::build_filtered(&hits, |id| id != HitId(1) && id != HitId(2));

        assert_eq!(index.len(), 2);
        assert_eq!(index.hits().len(), 4);
        assert_eq!(index.hits_in_layer(LayerId(0)), vec![HitId(0)]);
        assert_eq!(index.hits_in_layer(LayerId(1)), vec![HitId(3)]);
        assert_eq!(index.hit(HitId(3)).layer, LayerId(1));
        assert!(index
            .hits_in_layer_near(LayerId(1), &SearchWindow::full_ring(-1.0, 1.0))
            .iter()
            .all(|&id| id == HitId(3)));

        let none = HitIndex::build_filtered(&hits, |_| false);
        assert!(none.is_empty());
        assert!(none.layers().is_empty());
    }

    #[test]
    fn test_window_query() {
        let hits = vec![
            hit_at(0, 0.0, 0.0),
            hit_at(0, 0.3, 0.0),
            hit_at(0, 0.05, 50.0),
            hit_at(0, -0.04, 1.0),
        ];
        let index = HitIndex::build(&hits);
        let window = SearchWindow {
            phi_center: 0.0,
            phi_half_width: 0.1,
            z_min: -5.0,
            z_max: 5.0,
        };
        assert_eq!(index.hits_in_layer_near(LayerId(0), &window), vec![HitId(3), HitId(0)]);
    }

    #[test]
    fn test_window_wraps_across_pi() {
        let hits = vec![hit_at(0, PI - 0.02, 0.0), hit_at(0, -PI + 0.03, 0.0), hit_at(0, 0.0, 0.0)];
        let index = HitIndex::build(&hits);
        let window = SearchWindow {
            phi_center: PI,
            phi_half_width: 0.05,
            z_min: -1.0,
            z_max: 1.0,
        };
        let found = index.hits_in_layer_near(LayerId(0), &window);
        assert_eq!(found, vec![HitId(0), HitId(1)]);
    }

    #[test]
    fn test_full_ring_window() {
        let hits = vec![hit_at(2, 1.0, 0.0), hit_at(2, -2.0, 0.0), hit_at(2, 3.0, 100.0)];
        let index = HitIndex::build(&hits);
        let found = index.hits_in_layer_near(LayerId(2), &SearchWindow::full_ring(-10.0, 10.0));
        assert_eq!(found, vec![HitId(1), HitId(0)]);
    }

    #[test]
    fn test_window_contains() {
        let w = SearchWindow::around(PI - 0.01, 0.0, 0.01, 1.0, 3.0);
        assert!(w.contains(-PI + 0.01, 0.5));
        assert!(!w.contains(0.0, 0.0));
        assert!(!w.contains(PI, 5.0));
    }
}
