//! Common utilities shared by the tracking modules.
//!
//! This module contains the linear algebra helpers used by the fitter,
//! physical and numerical constants, and synthetic event generation for
//! tests and benchmarks.

pub mod constants;
pub mod linalg;
pub mod synthetic;
