//! Shared setup for the integration tests

#![allow(dead_code)]

use nalgebra::Point3;
use seedtrack::common::synthetic::{barrel_detector, SyntheticEvent};
use seedtrack::{BarrelGeometry, EnergyLossKind, FitOrder, Hit, HitId, LayerId, SeedCandidate, SeedStrategy, SequenceKey};

pub const RADII: [f64; 5] = [30.0, 60.0, 90.0, 120.0, 150.0];
pub const BZ: f64 = 2.0;

//=============================================================================
// Detector and strategies
//=============================================================================

/// Five-layer barrel in a 2 T field.
pub fn detector() -> BarrelGeometry {
    barrel_detector(&RADII, 500.0, BZ, 0.3).unwrap()
}

/// Seed on layers 1-3, confirm on 4, extend on 5.
pub fn barrel_strategy(name: &str, order: FitOrder) -> SeedStrategy {
    SeedStrategy::builder(name)
        .seed_layer(1)
        .seed_layer(2)
        .seed_layer(3)
        .confirm_layer(4)
        .extend_layer(5)
        .min_hits(4)
        .fit_order(order)
        .build()
        .unwrap()
}

/// Seed on layers 3-5 and fit inwards, confirm on 2, extend on 1.
pub fn outside_in_strategy(name: &str) -> SeedStrategy {
    SeedStrategy::builder(name)
        .seed_layer(3)
        .seed_layer(4)
        .seed_layer(5)
        .confirm_layer(2)
        .extend_layer(1)
        .min_hits(4)
        .fit_order(FitOrder::Backward)
        .build()
        .unwrap()
}

/// Layers 1-4 without material effects.
pub fn ideal_strategy(name: &str) -> SeedStrategy {
    SeedStrategy::builder(name)
        .seed_layer(1)
        .seed_layer(2)
        .seed_layer(3)
        .confirm_layer(4)
        .min_hits(4)
        .energy_loss(EnergyLossKind::Disabled)
        .build()
        .unwrap()
}

//=============================================================================
// Hits
//=============================================================================

/// Hits of a straight radial track on the first `n` layers.
pub fn straight_track(n: usize, phi: f64, tan_l: f64) -> Vec<Hit> {
    RADII
        .iter()
        .take(n)
        .enumerate()
        .map(|(i, &r)| {
            Hit::with_resolution(
                LayerId(i as u32 + 1),
                Point3::new(r * phi.cos(), r * phi.sin(), r * tan_l),
                0.01,
                0.05,
            )
        })
        .collect()
}

//=============================================================================
// Comparison
//=============================================================================

/// Order-sensitive fingerprint of a result: key, hits and χ² bits.
pub fn digest(tracks: &[SeedCandidate]) -> Vec<(SequenceKey, Vec<HitId>, u64)> {
    tracks
        .iter()
        .map(|c| (c.key(), c.hits().to_vec(), c.chisq().to_bits()))
        .collect()
}

/// Number of truth tracks reconstructed by a candidate made only of their hits.
pub fn found_tracks(event: &SyntheticEvent, tracks: &[SeedCandidate]) -> usize {
    let mut found: Vec<u64> = tracks
        .iter()
        .filter_map(|c| c.truth_particle(&event.hits))
        .map(|p| p.0)
        .collect();
    found.sort_unstable();
    found.dedup();
    found.len()
}
