//! Self-tuning categorical weights
//!
//! - `map`: ordered weight and count maps
//! - `store`: flat-file persistence per domain
//! - `policy`: correction policies turning counts into new weights
//! - `sampler`: weighted draws for the next generation

pub mod map;
pub mod policy;
pub mod sampler;
pub mod store;

pub use map::{round3, ClampRange, ObservationCount, WeightChange, WeightMap};
pub use policy::CorrectionPolicy;
pub use sampler::WeightedSampler;
pub use store::{WeightDomain, WeightStore, ARCHETYPES, ARCHETYPE_RANGE, DEFAULT_TAGS, RESONANCE_RANGE};
