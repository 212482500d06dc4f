//! metrics: append the newest weekly report's counts to the CSV summary

use async_trait::async_trait;
use tracing::info;

use super::read_artifact;
use crate::error::CycleResult;
use crate::memory::ArtifactKind;
use crate::metrics::weekly::report_date;
use crate::metrics::{parse_alignment_counts, parse_archetype_counts, MetricsSummary};
use crate::orchestrator::{Stage, StageContext, StageOutcome};

pub struct MetricsStage {
    summary: MetricsSummary,
}

impl MetricsStage {
    pub fn new(summary: MetricsSummary) -> Self {
        Self { summary }
    }
}

#[async_trait]
impl Stage for MetricsStage {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn run(&self, ctx: &mut StageContext) -> CycleResult<StageOutcome> {
        let report = ctx.resolve(ArtifactKind::WeeklyReport)?;
        let text = read_artifact(&report)?;
        let date = report_date(&report).unwrap_or(ctx.today);

        let appended = self.summary.append(
            date,
            &parse_archetype_counts(&text),
            &parse_alignment_counts(&text),
        )?;
        if appended {
            info!("Metrics row for {} -> {}", date, self.summary.path().display());
            Ok(StageOutcome::noted(format!("row for {} appended", date)))
        } else {
            Ok(StageOutcome::noted(format!("row for {} already recorded", date)))
        }
    }
}
