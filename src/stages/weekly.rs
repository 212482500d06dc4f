//! weekly: aggregate the trailing window into a report

use async_trait::async_trait;
use tracing::info;

use crate::error::{CycleError, CycleResult};
use crate::memory::ArtifactKind;
use crate::metrics::{ObservationWindow, WeeklyReport};
use crate::orchestrator::{ArtifactRef, Stage, StageContext, StageOutcome};

pub struct WeeklyStage {
    window_days: u32,
}

impl WeeklyStage {
    pub fn new(window_days: u32) -> Self {
        Self { window_days }
    }
}

#[async_trait]
impl Stage for WeeklyStage {
    fn name(&self) -> &str {
        "weekly"
    }

    async fn run(&self, ctx: &mut StageContext) -> CycleResult<StageOutcome> {
        let window = ObservationWindow::trailing(ctx.today, self.window_days);
        let report = WeeklyReport::build(&ctx.artifacts, window)?;

        let path = ctx
            .artifacts
            .write(ArtifactKind::WeeklyReport, ctx.today, &report.render())
            .map_err(|e| CycleError::storage(ctx.artifacts.dir(ArtifactKind::WeeklyReport), e))?;
        info!("Weekly report for {} saved -> {}", window, path.display());

        Ok(StageOutcome::Completed {
            artifact: Some(ArtifactRef {
                kind: ArtifactKind::WeeklyReport,
                path,
            }),
            note: Some(format!("{} dreams in {}", report.dreams, window)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ArtifactStore;
    use crate::metrics::parse_archetype_counts;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_report_written_for_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::with_dir(dir.path());
        store.write(ArtifactKind::Dream, date("2025-01-06"), "Archetype: Shadow").unwrap();
        store.write(ArtifactKind::Dream, date("2025-01-07"), "Archetype: Shadow").unwrap();
        // Outside a 7-day window ending 2025-01-07
        store.write(ArtifactKind::Dream, date("2024-12-31"), "Archetype: Child").unwrap();

        let mut ctx = StageContext::new(date("2025-01-07"), store);
        let outcome = WeeklyStage::new(7).run(&mut ctx).await.unwrap();
        let StageOutcome::Completed { artifact: Some(artifact), note } = outcome else {
            panic!("expected a report");
        };
        assert_eq!(note.as_deref(), Some("2 dreams in 2025-01-01 -> 2025-01-07"));

        let counts = parse_archetype_counts(&std::fs::read_to_string(artifact.path).unwrap());
        assert_eq!(counts.get("Shadow"), 2);
        assert_eq!(counts.get("Child"), 0);
    }

    #[tokio::test]
    async fn test_empty_window_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = StageContext::new(date("2025-01-07"), ArtifactStore::with_dir(dir.path()));
        let err = WeeklyStage::new(7).run(&mut ctx).await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
