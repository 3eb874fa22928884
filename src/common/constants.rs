//! Physical and numerical constants used throughout seeding and fitting
//!
//! Physical constants use the crate's unit system: lengths in mm, energies and
//! momenta in GeV, magnetic field in Tesla. Numerical tolerances are kept
//! separate from the user-configurable [`SeedStrategy`](crate::strategy::SeedStrategy)
//! cutoffs.

/// Transverse momentum per unit field and radius of curvature.
///
/// `pT [GeV] = BFIELD_CONSTANT * B [T] * R [mm]`
pub const BFIELD_CONSTANT: f64 = 2.997_924_58e-4;

/// Charged pion mass in GeV, the default particle hypothesis.
pub const PION_MASS: f64 = 0.139_57;

/// Electron mass in GeV.
pub const ELECTRON_MASS: f64 = 0.510_998_95e-3;

/// Bethe-Bloch coefficient `K = 4π N_A r_e² m_e c²` in MeV cm²/g.
pub const BETHE_K: f64 = 0.307_075;

/// Transverse momenta above this (GeV) are treated as infinite.
///
/// Material effects are skipped for such states so straight tracks keep
/// exactly zero curvature.
pub const PT_MAX: f64 = 10_000.0;

/// Factor applied to the seed covariance before the first propagation.
///
/// The closed-form seed estimate understates the true parameter spread.
pub const SEED_COVARIANCE_INFLATION: f64 = 10.0;

/// Relative threshold for the three-point circle determinant.
///
/// The coefficient determinant is compared against the product of the two
/// chord lengths, so the test is scale-free: `|det| <= eps * |d12| * |d13|`.
pub const DEGENERATE_CIRCLE_EPSILON: f64 = 1e-10;

/// Below `|κ| * r` of this size the helix is transported with the
/// straight-line root refined by Newton iterations.
pub const NEARLY_STRAIGHT_LIMIT: f64 = 1e-3;

/// Maximum Newton iterations for the nearly-straight intersection.
pub const MAX_NEWTON_ITERATIONS: usize = 20;

/// Relative step used by the central-difference transport Jacobian.
pub const JACOBIAN_STEP: f64 = 1e-6;

/// Path lengths closer than this (mm) to zero count as "no motion".
pub const PATH_EPSILON: f64 = 1e-9;
