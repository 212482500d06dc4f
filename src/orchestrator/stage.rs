//! Stage contract and the per-run context stages share
//!
//! Stages run strictly in order. An artifact produced by one stage is
//! handed to later stages through `StageContext`, but no stage may assume
//! its predecessor succeeded: `resolve` falls back to the newest matching
//! file on disk.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CycleError, CycleResult};
use crate::memory::{ArtifactKind, ArtifactStore, DatedArtifact};

/// Lifecycle of one stage within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageStatus::Succeeded | StageStatus::Failed | StageStatus::Skipped)
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "pending"),
            StageStatus::Running => write!(f, "running"),
            StageStatus::Succeeded => write!(f, "succeeded"),
            StageStatus::Failed => write!(f, "failed"),
            StageStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Reference to an artifact a stage produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

/// What a stage reports back when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// The stage ran; it may have produced an artifact and may carry a note
    Completed {
        artifact: Option<ArtifactRef>,
        note: Option<String>,
    },
    /// The operation the stage wraps is not available on this machine
    Unavailable(String),
}

impl StageOutcome {
    pub fn done() -> Self {
        StageOutcome::Completed {
            artifact: None,
            note: None,
        }
    }

    pub fn produced(kind: ArtifactKind, path: PathBuf) -> Self {
        StageOutcome::Completed {
            artifact: Some(ArtifactRef { kind, path }),
            note: None,
        }
    }

    pub fn noted(note: impl Into<String>) -> Self {
        StageOutcome::Completed {
            artifact: None,
            note: Some(note.into()),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        StageOutcome::Unavailable(reason.into())
    }
}

/// State shared by the stages of a single run
pub struct StageContext {
    pub today: NaiveDate,
    pub artifacts: ArtifactStore,
    handed: HashMap<ArtifactKind, PathBuf>,
}

impl StageContext {
    pub fn new(today: NaiveDate, artifacts: ArtifactStore) -> Self {
        Self {
            today,
            artifacts,
            handed: HashMap::new(),
        }
    }

    /// Make `path` available to later stages of this run
    pub fn hand_forward(&mut self, kind: ArtifactKind, path: PathBuf) {
        self.handed.insert(kind, path);
    }

    /// Artifact handed forward by an earlier stage of this run, if any
    pub fn handed(&self, kind: ArtifactKind) -> Option<&Path> {
        self.handed.get(&kind).map(PathBuf::as_path)
    }

    /// The artifact handed forward this run, else the newest on disk
    pub fn resolve(&self, kind: ArtifactKind) -> CycleResult<PathBuf> {
        if let Some(path) = self.handed(kind) {
            return Ok(path.to_path_buf());
        }
        self.artifacts
            .latest(kind)
            .map_err(|e| CycleError::storage(self.artifacts.dir(kind), e))?
            .map(|a| a.path)
            .ok_or_else(|| CycleError::ArtifactNotFound(format!("no {} on disk", kind)))
    }

    /// Newest artifact of `kind` dated before today, from disk only
    pub fn previous(&self, kind: ArtifactKind) -> CycleResult<Option<DatedArtifact>> {
        self.artifacts
            .latest_before(kind, self.today)
            .map_err(|e| CycleError::storage(self.artifacts.dir(kind), e))
    }
}

/// One discrete unit of work in the daily sequence
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Extra attempts allowed under the fail-fast policy
    fn retry_budget(&self) -> u32 {
        1
    }

    async fn run(&self, ctx: &mut StageContext) -> CycleResult<StageOutcome>;
}
