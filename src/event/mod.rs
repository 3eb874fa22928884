//! Event-level input: hits and the per-layer index built over them.

mod hit;
mod index;

pub use hit::{Hit, HitId, LayerId, ParticleId};
pub use index::{HitIndex, SearchWindow};
