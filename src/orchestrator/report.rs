//! Cycle reports - the durable record of one orchestrator run
//!
//! A report is created when a run starts, gains one record per stage, and
//! is finalized into an owned value when the run ends. Every run yields a
//! report, including runs where every stage failed.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::stage::{ArtifactRef, StageStatus};
use crate::error::{CycleError, CycleResult};

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    CompletedWithWarnings,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::CompletedWithWarnings => write!(f, "completed_with_warnings"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub status: StageStatus,
    pub attempts: u32,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl StageRecord {
    pub fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StageStatus::Pending,
            attempts: 0,
            duration_seconds: 0.0,
            artifact: None,
            error: None,
            note: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub run_id: String,
    pub policy: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub stages: Vec<StageRecord>,
    /// Full detail of the failure that aborted a fail-fast run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal `<stage>: <message>` entries from a continue run
    #[serde(default)]
    pub errors: Vec<String>,
}

impl CycleReport {
    pub fn begin(policy: &str) -> Self {
        let started_at = Utc::now();
        Self {
            run_id: started_at.format("%Y-%m-%dT%H-%M-%S%.3fZ").to_string(),
            policy: policy.to_string(),
            started_at,
            ended_at: None,
            status: RunStatus::Running,
            stages: Vec::new(),
            error: None,
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, record: StageRecord) {
        self.stages.push(record);
    }

    /// Record the failure that stops a fail-fast run
    pub fn abort(&mut self, detail: String) {
        self.status = RunStatus::Failed;
        self.error = Some(detail);
    }

    /// Seal the report; the result is never mutated again
    pub fn finish(mut self) -> Self {
        self.ended_at = Some(Utc::now());
        if self.status != RunStatus::Failed {
            self.status = if self.errors.is_empty() {
                RunStatus::Succeeded
            } else {
                RunStatus::CompletedWithWarnings
            };
        }
        self
    }

    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Process exit code: zero only for a clean run
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Succeeded => 0,
            _ => 1,
        }
    }

    /// Write `<dir>/<run_id>.json` via temp file + rename
    ///
    /// A run id already on disk gets a `-NNN` suffix so an earlier run's
    /// record is never replaced.
    pub fn persist(&mut self, dir: &Path) -> CycleResult<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| CycleError::storage(dir, e))?;

        let base = self.run_id.clone();
        let mut suffix = 0;
        while dir.join(format!("{}.json", self.run_id)).exists() {
            suffix += 1;
            self.run_id = format!("{}-{:03}", base, suffix);
        }

        let path = dir.join(format!("{}.json", self.run_id));
        let json = serde_json::to_string_pretty(self).map_err(|e| CycleError::storage(&path, e))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| CycleError::storage(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(CycleError::storage(&path, e));
        }
        debug!("Run report written to {}", path.display());
        Ok(path)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run report {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse run report {}", path.display()))
    }

    /// Newest report in `dir`, by run id
    pub fn latest(dir: &Path) -> anyhow::Result<Option<Self>> {
        if !dir.exists() {
            return Ok(None);
        }
        let mut reports: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();
        // By stem, so `<id>` sorts before its `<id>-001` sibling
        reports.sort_by(|a, b| a.file_stem().cmp(&b.file_stem()));
        match reports.pop() {
            Some(path) => Ok(Some(Self::load(&path)?)),
            None => Ok(None),
        }
    }

    /// One line per stage, for the terminal
    pub fn summary(&self) -> String {
        let mut out = format!("Run {} [{}]: {}\n", self.run_id, self.policy, self.status);
        for stage in &self.stages {
            out.push_str(&format!(
                "  {:<18} {:<10} {:>7.2}s",
                stage.name,
                stage.status.to_string(),
                stage.duration_seconds
            ));
            if let Some(note) = stage.error.as_ref().or(stage.note.as_ref()) {
                out.push_str(&format!("  {}", note.lines().next().unwrap_or_default()));
            }
            out.push('\n');
        }
        for error in &self.errors {
            out.push_str(&format!("  ! {}\n", error));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_without_errors_succeeds() {
        let mut report = CycleReport::begin("continue");
        let mut record = StageRecord::pending("dream");
        record.status = StageStatus::Succeeded;
        report.push(record);

        let report = report.finish();
        assert_eq!(report.status, RunStatus::Succeeded);
        assert!(report.ended_at.is_some());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_finish_with_errors_is_warning() {
        let mut report = CycleReport::begin("continue");
        report.errors.push("reflect: no dream".to_string());
        let report = report.finish();
        assert_eq!(report.status, RunStatus::CompletedWithWarnings);
        assert_ne!(report.exit_code(), 0);
    }

    #[test]
    fn test_abort_stays_failed() {
        let mut report = CycleReport::begin("fail-fast");
        report.abort("dream failed after 2 attempts: boom".to_string());
        let report = report.finish();
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("dream failed after 2 attempts: boom"));
    }

    #[test]
    fn test_persist_and_load_latest() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = CycleReport::begin("continue");
        report.push(StageRecord::pending("weekly"));
        let mut report = report.finish();

        let path = report.persist(dir.path()).unwrap();
        assert!(path.ends_with(format!("{}.json", report.run_id)));

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"status\": \"succeeded\""), "json was: {}", json);
        assert!(json.contains("\"duration_seconds\""));

        let loaded = CycleReport::latest(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.stages, report.stages);
    }

    #[test]
    fn test_same_run_id_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = CycleReport::begin("continue").finish();
        let mut second = first.clone();
        second.policy = "fail-fast".to_string();

        let first_path = first.persist(dir.path()).unwrap();
        let second_path = second.persist(dir.path()).unwrap();
        assert_ne!(first_path, second_path);
        assert_eq!(second.run_id, format!("{}-001", first.run_id));

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 2);
        assert_eq!(CycleReport::load(&first_path).unwrap().policy, "continue");

        let latest = CycleReport::latest(dir.path()).unwrap().unwrap();
        assert_eq!(latest.run_id, second.run_id);
    }

    #[test]
    fn test_run_id_has_millisecond_precision() {
        let report = CycleReport::begin("continue");
        // 2025-01-03T10-15-42.123Z
        assert_eq!(report.run_id.len(), 24);
        assert_eq!(&report.run_id[19..20], ".");
    }

    #[test]
    fn test_latest_in_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CycleReport::latest(&dir.path().join("logs")).unwrap().is_none());
    }
}
