//! Reverie - self-tuning daily generation pipeline
//!
//! A daily cycle of journal, dream, reflection and direction artifacts
//! whose category weights correct themselves from what was observed:
//! - Weight store, correction policies and weighted sampler (`weights`)
//! - Window aggregation, weekly report and CSV summary (`metrics`)
//! - Staged orchestrator with fail-fast or continue policies (`orchestrator`)
//! - The concrete stages of the cycle (`stages`)
//!
//! # Example
//!
//! ```ignore
//! use reverie::weights::{CorrectionPolicy, WeightMap, ARCHETYPES, ARCHETYPE_RANGE};
//!
//! let weights = WeightMap::uniform(&ARCHETYPES, 1.0);
//! let counts = [("Strategist", 5), ("Idealist", 3), ("Shadow", 2), ("Child", 2)]
//!     .into_iter()
//!     .collect();
//! let next = CorrectionPolicy::uniform(&ARCHETYPES, ARCHETYPE_RANGE).correct(&weights, &counts)?;
//! assert_eq!(next.get("Strategist"), Some(0.6));
//! ```

pub mod error;
pub mod weights;
pub mod memory;
pub mod metrics;
pub mod orchestrator;
pub mod config;
pub mod generation;
pub mod stages;
pub mod cli;

pub use config::{Config, DataLayout};
pub use error::{CycleError, CycleResult};

pub use weights::{
    ClampRange,
    CorrectionPolicy,
    ObservationCount,
    WeightDomain,
    WeightMap,
    WeightStore,
    WeightedSampler,
};

pub use orchestrator::{
    CycleReport,
    FailurePolicy,
    Orchestrator,
    RunStatus,
    Stage,
    StageContext,
    StageOutcome,
};

pub use generation::{ChatClient, GenerationRequest, Generator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - self-tuning daily generation pipeline", NAME, VERSION)
}
