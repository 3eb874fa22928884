//! Synthetic events for tests and benchmarks
//!
//! Builds a barrel detector and generates truth tracks from the origin,
//! their hits (optionally smeared) and uniformly scattered noise hits.
//! Everything is driven by a seeded [`StdRng`], so the same seed always
//! gives the same event.

use crate::common::constants::BFIELD_CONSTANT;
use crate::common::linalg::sinc;
use crate::errors::ConfigError;
use crate::event::{Hit, LayerId, ParticleId};
use crate::geometry::BarrelGeometry;
use crate::material::Material;
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Curvatures below this (1/mm) are generated as straight lines.
const STRAIGHT_CURVATURE: f64 = 1e-12;

/// Barrel with layers `1..=radii.len()` at the given radii.
pub fn barrel_detector(radii: &[f64], half_length: f64, bz: f64, thickness: f64) -> Result<BarrelGeometry, ConfigError> {
    radii
        .iter()
        .enumerate()
        .fold(BarrelGeometry::builder().field(bz), |b, (i, &r)| {
            b.layer(i as u32 + 1, r, half_length, Material::silicon(thickness))
        })
        .build()
}

/// Truth particle leaving the beam line at `z0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruthTrack {
    /// Initial transverse direction
    pub phi0: f64,
    pub tan_lambda: f64,
    /// Signed inverse transverse momentum (1/GeV), `0` for a straight track
    pub qpt: f64,
    /// z at the beam line (mm)
    pub z0: f64,
}

impl TruthTrack {
    pub fn straight(phi0: f64, tan_lambda: f64) -> Self {
        Self {
            phi0,
            tan_lambda,
            qpt: 0.0,
            z0: 0.0,
        }
    }

    pub fn helix(phi0: f64, tan_lambda: f64, qpt: f64) -> Self {
        Self {
            phi0,
            tan_lambda,
            qpt,
            z0: 0.0,
        }
    }

    pub fn with_z0(mut self, z0: f64) -> Self {
        self.z0 = z0;
        self
    }

    /// Signed curvature (1/mm) in a field `bz`.
    pub fn curvature(&self, bz: f64) -> f64 {
        -BFIELD_CONSTANT * bz * self.qpt
    }

    /// First point where the trajectory reaches transverse radius `r`.
    ///
    /// `None` if the track curls up before getting there.
    pub fn crossing(&self, r: f64, bz: f64) -> Option<Point3<f64>> {
        let kappa = self.curvature(bz);
        let s = if kappa.abs() < STRAIGHT_CURVATURE {
            r
        } else {
            let x = kappa * r / 2.0;
            if x.abs() > 1.0 {
                return None;
            }
            2.0 * x.asin() / kappa
        };
        let half_turn = kappa * s / 2.0;
        let chord = s * sinc(half_turn);
        let dir = self.phi0 + half_turn;
        Some(Point3::new(
            chord * dir.cos(),
            chord * dir.sin(),
            self.z0 + s * self.tan_lambda,
        ))
    }
}

/// Resolution, smearing and noise settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    /// r·φ resolution (mm)
    pub sigma_rphi: f64,
    /// z resolution (mm)
    pub sigma_z: f64,
    /// Smear hit positions with the resolutions
    pub smear: bool,
    /// Uniform noise hits added to every layer
    pub noise_per_layer: usize,
    pub seed: u64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            sigma_rphi: 0.01,
            sigma_z: 0.05,
            smear: false,
            noise_per_layer: 0,
            seed: 42,
        }
    }
}

/// Generated hits plus the tracks that produced them.
///
/// Hits of track `i` carry `ParticleId(i)`; noise hits carry no truth.
#[derive(Debug, Clone)]
pub struct SyntheticEvent {
    pub hits: Vec<Hit>,
    pub tracks: Vec<TruthTrack>,
}

impl SyntheticEvent {
    /// Hits produced by track `i`, in layer order.
    pub fn hits_of(&self, track: usize) -> Vec<usize> {
        self.hits
            .iter()
            .enumerate()
            .filter(|(_, h)| h.truth == Some(ParticleId(track as u64)))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn noise_count(&self) -> usize {
        self.hits.iter().filter(|h| h.truth.is_none()).count()
    }
}

/// Hits of `tracks` in `geometry` plus noise.
///
/// Track hits come first, track by track and inner to outer; noise hits
/// follow, layer by layer.
pub fn generate_event(geometry: &BarrelGeometry, tracks: &[TruthTrack], config: &EventConfig) -> SyntheticEvent {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut hits = Vec::new();
    let bz = geometry.bz();

    for (i, track) in tracks.iter().enumerate() {
        for surface in geometry.surfaces() {
            let Some(mut p) = track.crossing(surface.radius, bz) else {
                break;
            };
            if !surface.contains_z(p.z) {
                continue;
            }
            if config.smear {
                let r = p.x.hypot(p.y);
                let d_rphi: f64 = rng.sample::<f64, _>(StandardNormal) * config.sigma_rphi;
                let d_z: f64 = rng.sample::<f64, _>(StandardNormal) * config.sigma_z;
                let phi = p.y.atan2(p.x) + d_rphi / r;
                p = Point3::new(r * phi.cos(), r * phi.sin(), p.z + d_z);
            }
            hits.push(
                Hit::with_resolution(surface.layer, p, config.sigma_rphi, config.sigma_z)
                    .with_truth(ParticleId(i as u64)),
            );
        }
    }

    for surface in geometry.surfaces() {
        for _ in 0..config.noise_per_layer {
            hits.push(noise_hit(&mut rng, surface.layer, surface.radius, surface.half_length, config));
        }
    }

    SyntheticEvent {
        hits,
        tracks: tracks.to_vec(),
    }
}

/// A hit placed uniformly on a cylinder.
pub fn noise_hit(rng: &mut impl Rng, layer: LayerId, radius: f64, half_length: f64, config: &EventConfig) -> Hit {
    let phi = rng.gen_range(-PI..PI);
    let z = rng.gen_range(-half_length..=half_length);
    Hit::with_resolution(
        layer,
        Point3::new(radius * phi.cos(), radius * phi.sin(), z),
        config.sigma_rphi,
        config.sigma_z,
    )
}

/// `n` random tracks with `pT` uniform in `pt_range` (GeV), random charge,
/// and `tan λ` uniform in `±max_tan_lambda`.
pub fn random_tracks(n: usize, pt_range: (f64, f64), max_tan_lambda: f64, seed: u64) -> Vec<TruthTrack> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let pt = rng.gen_range(pt_range.0..=pt_range.1);
            let charge = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            TruthTrack::helix(
                rng.gen_range(-PI..PI),
                rng.gen_range(-max_tan_lambda..=max_tan_lambda),
                charge / pt,
            )
        })
        .collect()
}
