//! Staged cycle orchestrator
//!
//! Runs a fixed sequence of stages once per invocation under an injected
//! failure policy, and always returns a finalized `CycleReport`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::report::{CycleReport, StageRecord};
use super::stage::{Stage, StageContext, StageOutcome, StageStatus};
use crate::error::CycleError;

/// How the orchestrator reacts to a failed stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Retry after `backoff`, then abort the run if the stage still fails
    FailFastRetry { backoff: Duration },
    /// Record `<stage>: <message>` and carry on with the next stage
    ContinueAggregate,
}

impl FailurePolicy {
    pub fn label(&self) -> &'static str {
        match self {
            FailurePolicy::FailFastRetry { .. } => "fail-fast",
            FailurePolicy::ContinueAggregate => "continue",
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Executes stages strictly in order
pub struct Orchestrator {
    stages: Vec<Box<dyn Stage>>,
    policy: FailurePolicy,
    report_dir: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            stages: Vec::new(),
            policy,
            report_dir: None,
        }
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn add_stage(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    /// Persist each finished report as `<dir>/<run_id>.json`
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    pub fn policy(&self) -> &FailurePolicy {
        &self.policy
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage once, in order
    pub async fn run(&self, ctx: &mut StageContext) -> CycleReport {
        info!("Starting cycle: {} stages, policy {}", self.stages.len(), self.policy);
        let mut report = CycleReport::begin(self.policy.label());

        for (index, stage) in self.stages.iter().enumerate() {
            let name = stage.name();
            let mut record = StageRecord::pending(name);
            record.status = StageStatus::Running;
            debug!("Stage '{}': pending -> running", name);

            let started = Instant::now();
            let (result, attempts) = self.attempt(stage.as_ref(), ctx).await;
            record.attempts = attempts;
            record.duration_seconds = (started.elapsed().as_secs_f64() * 1000.0).round() / 1000.0;

            match result {
                Ok(StageOutcome::Completed { artifact, note }) => {
                    record.status = StageStatus::Succeeded;
                    if let Some(artifact) = &artifact {
                        ctx.hand_forward(artifact.kind, artifact.path.clone());
                    }
                    record.artifact = artifact;
                    record.note = note;
                    info!("Stage '{}' succeeded in {:.2}s", name, record.duration_seconds);
                }
                Ok(StageOutcome::Unavailable(reason)) => {
                    record.status = StageStatus::Skipped;
                    warn!("Stage '{}' skipped: {}", name, reason);
                    record.note = Some(reason);
                }
                Err(e) if e.is_recoverable() => {
                    record.status = StageStatus::Succeeded;
                    warn!("Stage '{}' made no update: {}", name, e);
                    record.note = Some(e.to_string());
                }
                Err(e) => {
                    record.status = StageStatus::Failed;
                    record.error = Some(e.to_string());
                    match &self.policy {
                        FailurePolicy::FailFastRetry { .. } => {
                            error!("Stage '{}' failed after {} attempts, aborting run: {}", name, attempts, e);
                            report.push(record);
                            report.abort(failure_detail(name, attempts, &e));
                            for rest in &self.stages[index + 1..] {
                                let mut never_run = StageRecord::pending(rest.name());
                                never_run.note = Some(format!("not run: aborted after '{}'", name));
                                report.push(never_run);
                            }
                            break;
                        }
                        FailurePolicy::ContinueAggregate => {
                            warn!("Stage '{}' failed, continuing: {}", name, e);
                            report.errors.push(format!("{}: {}", name, e));
                        }
                    }
                }
            }
            debug!("Stage '{}': running -> {}", name, record.status);
            report.push(record);
        }

        let mut report = report.finish();
        info!("Cycle {} finished: {}", report.run_id, report.status);

        if let Some(dir) = &self.report_dir {
            if let Err(e) = report.persist(dir) {
                error!("Failed to record run report: {}", e);
            }
        }
        report
    }

    /// Run one stage, retrying hard failures as the policy allows
    async fn attempt(
        &self,
        stage: &dyn Stage,
        ctx: &mut StageContext,
    ) -> (Result<StageOutcome, CycleError>, u32) {
        let (max_attempts, backoff) = match &self.policy {
            FailurePolicy::FailFastRetry { backoff } => (1 + stage.retry_budget(), *backoff),
            FailurePolicy::ContinueAggregate => (1, Duration::ZERO),
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            match stage.run(ctx).await {
                Err(e) if !e.is_recoverable() && attempts < max_attempts => {
                    warn!(
                        "Stage '{}' failed (attempt {}/{}), retrying in {:?}: {}",
                        stage.name(),
                        attempts,
                        max_attempts,
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
                result => return (result, attempts),
            }
        }
    }
}

/// Error text plus its source chain
fn failure_detail(stage: &str, attempts: u32, err: &CycleError) -> String {
    let mut detail = format!("stage '{}' failed after {} attempt(s): {}", stage, attempts, err);
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        detail.push_str(&format!("\n  caused by: {}", cause));
        source = cause.source();
    }
    detail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ArtifactKind, ArtifactStore};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct ScriptedStage {
        name: &'static str,
        calls: Arc<AtomicU32>,
        fail_first: u32,
    }

    impl ScriptedStage {
        fn new(name: &'static str, fail_first: u32) -> (Self, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            (
                Self {
                    name,
                    calls: calls.clone(),
                    fail_first,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Stage for ScriptedStage {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, ctx: &mut StageContext) -> Result<StageOutcome, CycleError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                return Err(anyhow::anyhow!("{} attempt {} exploded", self.name, call).into());
            }
            let path = ctx.artifacts.write(ArtifactKind::Journal, ctx.today, self.name)?;
            Ok(StageOutcome::produced(ArtifactKind::Journal, path))
        }
    }

    struct QuietStage;

    #[async_trait]
    impl Stage for QuietStage {
        fn name(&self) -> &str {
            "adapt"
        }

        async fn run(&self, _ctx: &mut StageContext) -> Result<StageOutcome, CycleError> {
            Err(CycleError::InsufficientData("3 observations across 4 categories".into()))
        }
    }

    fn context(dir: &tempfile::TempDir) -> StageContext {
        StageContext::new(
            NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            ArtifactStore::with_dir(dir.path()),
        )
    }

    fn fail_fast() -> FailurePolicy {
        FailurePolicy::FailFastRetry {
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (flaky, calls) = ScriptedStage::new("dream", 1);
        let report = Orchestrator::new(fail_fast())
            .with_stage(flaky)
            .run(&mut context(&dir))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.status, super::super::report::RunStatus::Succeeded);
        assert_eq!(report.stages[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_continue_does_not_retry() {
        let dir = tempfile::tempdir().unwrap();
        let (flaky, calls) = ScriptedStage::new("dream", 1);
        let report = Orchestrator::new(FailurePolicy::ContinueAggregate)
            .with_stage(flaky)
            .run(&mut context(&dir))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.errors, vec!["dream: dream attempt 1 exploded".to_string()]);
    }

    #[tokio::test]
    async fn test_recoverable_error_is_a_note_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (after, after_calls) = ScriptedStage::new("metrics", 0);
        let report = Orchestrator::new(fail_fast())
            .with_stage(QuietStage)
            .with_stage(after)
            .run(&mut context(&dir))
            .await;

        let adapt = report.stage("adapt").unwrap();
        assert_eq!(adapt.status, StageStatus::Succeeded);
        assert_eq!(adapt.attempts, 1);
        assert!(adapt.note.as_deref().unwrap().contains("insufficient data"));
        assert_eq!(after_calls.load(Ordering::SeqCst), 1);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_artifact_handed_forward() {
        let dir = tempfile::tempdir().unwrap();
        let (producer, _) = ScriptedStage::new("journal", 0);
        let mut ctx = context(&dir);
        let report = Orchestrator::new(FailurePolicy::ContinueAggregate)
            .with_stage(producer)
            .run(&mut ctx)
            .await;

        let artifact = report.stages[0].artifact.clone().unwrap();
        assert_eq!(ctx.handed(ArtifactKind::Journal), Some(artifact.path.as_path()));
    }

    #[tokio::test]
    async fn test_report_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("system").join("logs");
        let (stage, _) = ScriptedStage::new("journal", 0);
        let report = Orchestrator::new(FailurePolicy::ContinueAggregate)
            .with_stage(stage)
            .with_report_dir(&logs)
            .run(&mut context(&dir))
            .await;

        assert!(logs.join(format!("{}.json", report.run_id)).exists());
    }

    #[tokio::test]
    async fn test_back_to_back_runs_keep_both_reports() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let mut run_ids = Vec::new();
        for _ in 0..2 {
            let (stage, _) = ScriptedStage::new("journal", 0);
            let report = Orchestrator::new(FailurePolicy::ContinueAggregate)
                .with_stage(stage)
                .with_report_dir(&logs)
                .run(&mut context(&dir))
                .await;
            run_ids.push(report.run_id);
        }

        assert_ne!(run_ids[0], run_ids[1]);
        let reports: Vec<_> = std::fs::read_dir(&logs)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "json").unwrap_or(false))
            .collect();
        assert_eq!(reports.len(), 2);
    }

    #[test]
    fn test_failure_detail_includes_sources() {
        let err = CycleError::storage("/x/tag_weights.yaml", anyhow::anyhow!("disk full"));
        let detail = failure_detail("adapt-resonance", 2, &err);
        assert!(detail.starts_with("stage 'adapt-resonance' failed after 2 attempt(s)"));
        assert!(detail.contains("disk full"));
    }
}
