//! Error taxonomy for the weighting subsystem and the cycle pipeline
//!
//! `InsufficientData` and `ArtifactNotFound` are expected outcomes of a
//! quiet week: stages report them as notes and keep prior weights.
//! `Storage` and `StageFailure` are real failures and are subject to the
//! run's failure policy.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the weight store, correction policies and stages
#[derive(Debug, Error)]
pub enum CycleError {
    /// A correction policy's statistical precondition was not met
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A weight, report or artifact file could not be read or written
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// A stage needed a predecessor's output but none exists
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    /// A stage's underlying operation failed unexpectedly
    #[error("{0:#}")]
    StageFailure(anyhow::Error),

    /// Configuration is missing or invalid
    #[error("configuration error: {0}")]
    Config(String),
}

impl CycleError {
    /// Wrap an I/O or parse failure for `path`
    pub fn storage(path: impl Into<PathBuf>, source: impl Into<anyhow::Error>) -> Self {
        CycleError::Storage {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Whether the affected update can simply be skipped for this cycle
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CycleError::InsufficientData(_) | CycleError::ArtifactNotFound(_)
        )
    }
}

impl From<anyhow::Error> for CycleError {
    fn from(err: anyhow::Error) -> Self {
        CycleError::StageFailure(err)
    }
}

pub type CycleResult<T> = std::result::Result<T, CycleError>;
