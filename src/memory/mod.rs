//! Flat-file memory of the daily cycle
//!
//! Every stage output is a dated markdown file under the memory root;
//! later stages and the metrics window find them by date prefix.

pub mod artifacts;

pub use artifacts::{ArtifactKind, ArtifactStore, DatedArtifact};
