//! Staged cycle orchestration
//!
//! One invocation runs the daily sequence once. Stages are trait objects
//! run strictly in order; the failure policy is injected at construction.

pub mod pipeline;
pub mod report;
pub mod stage;

pub use pipeline::{FailurePolicy, Orchestrator};
pub use report::{CycleReport, RunStatus, StageRecord};
pub use stage::{ArtifactRef, Stage, StageContext, StageOutcome, StageStatus};
