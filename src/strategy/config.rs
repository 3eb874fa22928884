//! Strategy configuration, builder and JSON loading

use super::{FitOrder, LayerRole, SeedLayer};
use crate::common::constants::{BFIELD_CONSTANT, PION_MASS};
use crate::errors::ConfigError;
use crate::event::LayerId;
use crate::material::EnergyLossKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::PI;
use std::io::Read;

// ============================================================================
// Defaults
// ============================================================================

const DEFAULT_MIN_PT: f64 = 1.0;
const DEFAULT_MAX_DCA: f64 = 10.0;
const DEFAULT_MAX_Z0: f64 = 10.0;
const DEFAULT_MAX_CHISQ: f64 = 100.0;
const DEFAULT_BAD_HIT_CHISQ: f64 = 15.0;
const DEFAULT_MIN_CONFIRM: usize = 1;
const DEFAULT_MIN_HITS: usize = 7;
const DEFAULT_MAX_HITS: usize = 20;
const DEFAULT_PAIR_PHI_TOLERANCE: f64 = 0.01;
const DEFAULT_MAX_CONE_ANGLE: f64 = 0.3;
const DEFAULT_SEARCH_SIGMA: f64 = 5.0;

// ============================================================================
// SeedStrategy
// ============================================================================

/// Immutable, validated seeding strategy.
///
/// Built with [`SeedStrategy::builder`] or deserialized; both paths run the
/// same validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeedStrategyBuilder")]
pub struct SeedStrategy {
    name: String,
    layers: Vec<SeedLayer>,
    min_pt: f64,
    max_dca: f64,
    max_z0: f64,
    max_chisq: f64,
    bad_hit_chisq: f64,
    min_confirm: usize,
    min_hits: usize,
    max_hits: usize,
    pair_phi_tolerance: f64,
    max_cone_angle: f64,
    search_sigma: f64,
    fit_order: FitOrder,
    energy_loss: EnergyLossKind,
    particle_mass: f64,
}

impl SeedStrategy {
    /// Start a builder for a strategy called `name`.
    pub fn builder(name: impl Into<String>) -> SeedStrategyBuilder {
        SeedStrategyBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All layers in declaration order
    pub fn layers(&self) -> &[SeedLayer] {
        &self.layers
    }

    fn layers_with(&self, role: LayerRole) -> Vec<LayerId> {
        self.layers
            .iter()
            .filter(|l| l.role == role)
            .map(|l| l.layer)
            .collect()
    }

    pub fn seed_layers(&self) -> Vec<LayerId> {
        self.layers_with(LayerRole::Seed)
    }

    pub fn confirm_layers(&self) -> Vec<LayerId> {
        self.layers_with(LayerRole::Confirm)
    }

    pub fn extend_layers(&self) -> Vec<LayerId> {
        self.layers_with(LayerRole::Extend)
    }

    /// Seed and confirm layers
    pub fn required_layers(&self) -> Vec<LayerId> {
        self.layers
            .iter()
            .filter(|l| l.role != LayerRole::Extend)
            .map(|l| l.layer)
            .collect()
    }

    /// Role of `layer` in this strategy, if it takes part.
    pub fn role_of(&self, layer: LayerId) -> Option<LayerRole> {
        self.layers.iter().find(|l| l.layer == layer).map(|l| l.role)
    }

    /// Minimum transverse momentum (GeV)
    pub fn min_pt(&self) -> f64 {
        self.min_pt
    }

    /// Maximum distance of closest approach to the beam axis (mm)
    pub fn max_dca(&self) -> f64 {
        self.max_dca
    }

    /// Maximum |z| at closest approach (mm)
    pub fn max_z0(&self) -> f64 {
        self.max_z0
    }

    /// Maximum total χ² of a candidate
    pub fn max_chisq(&self) -> f64 {
        self.max_chisq
    }

    /// Maximum χ² increment of a hit attached during extension
    pub fn bad_hit_chisq(&self) -> f64 {
        self.bad_hit_chisq
    }

    pub fn min_confirm(&self) -> usize {
        self.min_confirm
    }

    pub fn min_hits(&self) -> usize {
        self.min_hits
    }

    pub fn max_hits(&self) -> usize {
        self.max_hits
    }

    /// Extra azimuthal tolerance of the pair test (rad)
    pub fn pair_phi_tolerance(&self) -> f64 {
        self.pair_phi_tolerance
    }

    /// Maximum 3D angle between consecutive seed segments (rad)
    pub fn max_cone_angle(&self) -> f64 {
        self.max_cone_angle
    }

    /// Extension search window in standard deviations
    pub fn search_sigma(&self) -> f64 {
        self.search_sigma
    }

    pub fn fit_order(&self) -> FitOrder {
        self.fit_order
    }

    pub fn energy_loss(&self) -> EnergyLossKind {
        self.energy_loss
    }

    /// Mass hypothesis (GeV)
    pub fn particle_mass(&self) -> f64 {
        self.particle_mass
    }

    /// Smallest radius of curvature allowed by `min_pt` in a field `bz` (T).
    ///
    /// `None` when the field vanishes and every track is straight.
    pub fn min_radius(&self, bz: f64) -> Option<f64> {
        let scale = BFIELD_CONSTANT * bz.abs();
        (scale > f64::EPSILON).then(|| self.min_pt / scale)
    }

    /// Copy every numeric cutoff from `other`, keeping name and layers.
    ///
    /// The result is validated; on error `self` is left unchanged.
    pub fn copy_cutoffs_from(&mut self, other: &SeedStrategy) -> Result<(), ConfigError> {
        let updated = SeedStrategy {
            name: self.name.clone(),
            layers: self.layers.clone(),
            ..other.clone()
        };
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Serializable summary for logs and debugging output.
    pub fn snapshot(&self) -> StrategySnapshot {
        let ids = |v: Vec<LayerId>| v.into_iter().map(|l| l.0).collect();
        StrategySnapshot {
            name: self.name.clone(),
            seed_layers: ids(self.seed_layers()),
            confirm_layers: ids(self.confirm_layers()),
            extend_layers: ids(self.extend_layers()),
            min_pt: self.min_pt,
            max_dca: self.max_dca,
            max_z0: self.max_z0,
            max_chisq: self.max_chisq,
            bad_hit_chisq: self.bad_hit_chisq,
            min_confirm: self.min_confirm,
            min_hits: self.min_hits,
            max_hits: self.max_hits,
            fit_order: self.fit_order,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.name;
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let mut seen = HashSet::new();
        for l in &self.layers {
            if !seen.insert(l.layer) {
                return Err(ConfigError::DuplicateLayer {
                    strategy: name.clone(),
                    layer: l.layer,
                });
            }
        }

        let n_seed = self.seed_layers().len();
        if !(2..=3).contains(&n_seed) {
            return Err(ConfigError::SeedLayerCount {
                strategy: name.clone(),
                count: n_seed,
            });
        }

        let invalid = |parameter: &'static str, value: f64, reason: &'static str| {
            Err(ConfigError::InvalidParameter {
                strategy: name.clone(),
                parameter,
                value,
                reason,
            })
        };
        let positive = |v: f64| v.is_finite() && v > 0.0;
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;

        if !positive(self.min_pt) {
            return invalid("min_pt", self.min_pt, "must be > 0");
        }
        if !positive(self.max_chisq) {
            return invalid("max_chisq", self.max_chisq, "must be > 0");
        }
        if !positive(self.search_sigma) {
            return invalid("search_sigma", self.search_sigma, "must be > 0");
        }
        if !positive(self.particle_mass) {
            return invalid("particle_mass", self.particle_mass, "must be > 0");
        }
        if !non_negative(self.max_dca) {
            return invalid("max_dca", self.max_dca, "must be >= 0");
        }
        if !non_negative(self.max_z0) {
            return invalid("max_z0", self.max_z0, "must be >= 0");
        }
        if !non_negative(self.pair_phi_tolerance) {
            return invalid("pair_phi_tolerance", self.pair_phi_tolerance, "must be >= 0");
        }
        if !(self.max_cone_angle > 0.0 && self.max_cone_angle <= PI) {
            return invalid("max_cone_angle", self.max_cone_angle, "must be in (0, π]");
        }
        if !(self.bad_hit_chisq > 0.0 && self.bad_hit_chisq <= self.max_chisq) {
            return invalid("bad_hit_chisq", self.bad_hit_chisq, "must be in (0, max_chisq]");
        }
        if let EnergyLossKind::FixedRate {
            rate,
            relative_sigma,
        } = self.energy_loss
        {
            if !non_negative(rate) {
                return invalid("energy_loss.rate", rate, "must be >= 0");
            }
            if !non_negative(relative_sigma) {
                return invalid("energy_loss.relative_sigma", relative_sigma, "must be >= 0");
            }
        }

        let inconsistent = |description: String| {
            Err(ConfigError::InconsistentCounts {
                strategy: name.clone(),
                description,
            })
        };
        let n_confirm = self.confirm_layers().len();
        if self.min_confirm > n_confirm {
            return inconsistent(format!(
                "min_confirm {} exceeds {} confirm layers",
                self.min_confirm, n_confirm
            ));
        }
        if self.min_hits < n_seed {
            return inconsistent(format!(
                "min_hits {} is below the {} seed layers",
                self.min_hits, n_seed
            ));
        }
        if self.min_hits > self.layers.len() {
            return inconsistent(format!(
                "min_hits {} exceeds the {} layers of the strategy",
                self.min_hits,
                self.layers.len()
            ));
        }
        if self.max_hits < self.min_hits {
            return inconsistent(format!(
                "max_hits {} is below min_hits {}",
                self.max_hits, self.min_hits
            ));
        }
        Ok(())
    }
}

impl TryFrom<SeedStrategyBuilder> for SeedStrategy {
    type Error = ConfigError;

    fn try_from(builder: SeedStrategyBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SeedStrategy`]. Unset cutoffs take the standard defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedStrategyBuilder {
    #[serde(default)]
    name: String,
    #[serde(default)]
    layers: Vec<SeedLayer>,
    min_pt: Option<f64>,
    max_dca: Option<f64>,
    max_z0: Option<f64>,
    max_chisq: Option<f64>,
    bad_hit_chisq: Option<f64>,
    min_confirm: Option<usize>,
    min_hits: Option<usize>,
    max_hits: Option<usize>,
    pair_phi_tolerance: Option<f64>,
    max_cone_angle: Option<f64>,
    search_sigma: Option<f64>,
    fit_order: Option<FitOrder>,
    energy_loss: Option<EnergyLossKind>,
    particle_mass: Option<f64>,
}

impl SeedStrategyBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a layer with an explicit role.
    pub fn layer(mut self, layer: SeedLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn seed_layer(self, layer: u32) -> Self {
        self.layer(SeedLayer::seed(layer))
    }

    pub fn confirm_layer(self, layer: u32) -> Self {
        self.layer(SeedLayer::confirm(layer))
    }

    pub fn extend_layer(self, layer: u32) -> Self {
        self.layer(SeedLayer::extend(layer))
    }

    pub fn min_pt(mut self, v: f64) -> Self {
        self.min_pt = Some(v);
        self
    }

    pub fn max_dca(mut self, v: f64) -> Self {
        self.max_dca = Some(v);
        self
    }

    pub fn max_z0(mut self, v: f64) -> Self {
        self.max_z0 = Some(v);
        self
    }

    pub fn max_chisq(mut self, v: f64) -> Self {
        self.max_chisq = Some(v);
        self
    }

    pub fn bad_hit_chisq(mut self, v: f64) -> Self {
        self.bad_hit_chisq = Some(v);
        self
    }

    pub fn min_confirm(mut self, v: usize) -> Self {
        self.min_confirm = Some(v);
        self
    }

    pub fn min_hits(mut self, v: usize) -> Self {
        self.min_hits = Some(v);
        self
    }

    pub fn max_hits(mut self, v: usize) -> Self {
        self.max_hits = Some(v);
        self
    }

    pub fn pair_phi_tolerance(mut self, v: f64) -> Self {
        self.pair_phi_tolerance = Some(v);
        self
    }

    pub fn max_cone_angle(mut self, v: f64) -> Self {
        self.max_cone_angle = Some(v);
        self
    }

    pub fn search_sigma(mut self, v: f64) -> Self {
        self.search_sigma = Some(v);
        self
    }

    pub fn fit_order(mut self, v: FitOrder) -> Self {
        self.fit_order = Some(v);
        self
    }

    pub fn energy_loss(mut self, v: EnergyLossKind) -> Self {
        self.energy_loss = Some(v);
        self
    }

    pub fn particle_mass(mut self, v: f64) -> Self {
        self.particle_mass = Some(v);
        self
    }

    /// Build and validate the strategy.
    pub fn build(self) -> Result<SeedStrategy, ConfigError> {
        let strategy = SeedStrategy {
            name: self.name,
            layers: self.layers,
            min_pt: self.min_pt.unwrap_or(DEFAULT_MIN_PT),
            max_dca: self.max_dca.unwrap_or(DEFAULT_MAX_DCA),
            max_z0: self.max_z0.unwrap_or(DEFAULT_MAX_Z0),
            max_chisq: self.max_chisq.unwrap_or(DEFAULT_MAX_CHISQ),
            bad_hit_chisq: self.bad_hit_chisq.unwrap_or(DEFAULT_BAD_HIT_CHISQ),
            min_confirm: self.min_confirm.unwrap_or(DEFAULT_MIN_CONFIRM),
            min_hits: self.min_hits.unwrap_or(DEFAULT_MIN_HITS),
            max_hits: self.max_hits.unwrap_or(DEFAULT_MAX_HITS),
            pair_phi_tolerance: self.pair_phi_tolerance.unwrap_or(DEFAULT_PAIR_PHI_TOLERANCE),
            max_cone_angle: self.max_cone_angle.unwrap_or(DEFAULT_MAX_CONE_ANGLE),
            search_sigma: self.search_sigma.unwrap_or(DEFAULT_SEARCH_SIGMA),
            fit_order: self.fit_order.unwrap_or_default(),
            energy_loss: self.energy_loss.unwrap_or_default(),
            particle_mass: self.particle_mass.unwrap_or(PION_MASS),
        };
        strategy.validate()?;
        Ok(strategy)
    }
}

// ============================================================================
// Snapshot and list
// ============================================================================

/// Flat, serializable view of a strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySnapshot {
    pub name: String,
    pub seed_layers: Vec<u32>,
    pub confirm_layers: Vec<u32>,
    pub extend_layers: Vec<u32>,
    pub min_pt: f64,
    pub max_dca: f64,
    pub max_z0: f64,
    pub max_chisq: f64,
    pub bad_hit_chisq: f64,
    pub min_confirm: usize,
    pub min_hits: usize,
    pub max_hits: usize,
    pub fit_order: FitOrder,
}

/// Ordered collection of strategies as stored in a strategy file.
///
/// ```json
/// { "strategies": [ { "name": "pixel", "layers": [ ... ], "min_pt": 0.5 } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyList {
    pub strategies: Vec<SeedStrategy>,
}

impl StrategyList {
    pub fn new(strategies: Vec<SeedStrategy>) -> Self {
        Self { strategies }
    }

    /// Parse and validate a JSON strategy list.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse and validate a JSON strategy list from a reader.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SeedStrategy> {
        self.strategies.iter()
    }

    pub fn into_inner(self) -> Vec<SeedStrategy> {
        self.strategies
    }
}
