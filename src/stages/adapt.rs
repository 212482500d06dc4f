//! Self-evolution: corrective updates to the two weight domains
//!
//! - adapt-archetypes reads counts from the newest weekly report and
//!   applies the uniform-target correction.
//! - adapt-resonance counts `Resonance Tag:` labels on dreams in the
//!   window and applies the inverse-frequency correction.
//!
//! An unchanged map is never rewritten.

use async_trait::async_trait;
use tracing::info;

use super::read_artifact;
use crate::error::{CycleError, CycleResult};
use crate::memory::ArtifactKind;
use crate::metrics::{aggregate, parse_archetype_counts, Extractor, ObservationWindow};
use crate::orchestrator::{Stage, StageContext, StageOutcome};
use crate::weights::{CorrectionPolicy, ObservationCount, WeightChange, WeightDomain, WeightStore};

/// Result of one correction
#[derive(Debug, Clone)]
pub struct Adaptation {
    pub domain: String,
    pub changes: Vec<WeightChange>,
    pub written: bool,
}

impl Adaptation {
    fn note(&self) -> String {
        if self.changes.is_empty() {
            return format!("no {} weight change needed", self.domain);
        }
        let diff = self
            .changes
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        if self.written {
            diff
        } else {
            format!("dry run: {}", diff)
        }
    }
}

/// Correct `domain` from `counts` and persist unless `dry_run`
pub fn apply_correction(
    store: &WeightStore,
    domain: &WeightDomain,
    policy: &CorrectionPolicy,
    counts: &ObservationCount,
    dry_run: bool,
) -> CycleResult<Adaptation> {
    let current = store.load(domain)?;
    let next = policy.correct(&current, counts)?;
    let changes = current.diff(&next);

    for change in &changes {
        info!("{} weight {}", domain.name, change);
    }

    let written = !changes.is_empty() && !dry_run;
    if written {
        store.save(domain, &next)?;
    } else if changes.is_empty() {
        info!("No {} weight change needed", domain.name);
    }

    Ok(Adaptation {
        domain: domain.name.clone(),
        changes,
        written,
    })
}

pub struct AdaptArchetypesStage {
    store: WeightStore,
    domain: WeightDomain,
    dry_run: bool,
}

impl AdaptArchetypesStage {
    pub fn new(store: WeightStore, domain: WeightDomain) -> Self {
        Self {
            store,
            domain,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[async_trait]
impl Stage for AdaptArchetypesStage {
    fn name(&self) -> &str {
        "adapt-archetypes"
    }

    async fn run(&self, ctx: &mut StageContext) -> CycleResult<StageOutcome> {
        let report = ctx.resolve(ArtifactKind::WeeklyReport)?;
        let counts = parse_archetype_counts(&read_artifact(&report)?);

        let universe: Vec<&str> = self.domain.defaults.keys().collect();
        let policy = CorrectionPolicy::uniform(&universe, self.domain.range);
        let adaptation = apply_correction(&self.store, &self.domain, &policy, &counts, self.dry_run)?;
        Ok(StageOutcome::noted(adaptation.note()))
    }
}

pub struct AdaptResonanceStage {
    store: WeightStore,
    domain: WeightDomain,
    window_days: u32,
    dry_run: bool,
}

impl AdaptResonanceStage {
    pub fn new(store: WeightStore, domain: WeightDomain, window_days: u32) -> Self {
        Self {
            store,
            domain,
            window_days,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[async_trait]
impl Stage for AdaptResonanceStage {
    fn name(&self) -> &str {
        "adapt-resonance"
    }

    async fn run(&self, ctx: &mut StageContext) -> CycleResult<StageOutcome> {
        let dreams = ctx
            .artifacts
            .list(ArtifactKind::Dream)
            .map_err(|e| CycleError::storage(ctx.artifacts.dir(ArtifactKind::Dream), e))?;
        let window = ObservationWindow::trailing(ctx.today, self.window_days);
        let counts = aggregate(&dreams, &window, &Extractor::label_line("Resonance Tag"));

        let policy = CorrectionPolicy::inverse_frequency(self.domain.range);
        let adaptation = apply_correction(&self.store, &self.domain, &policy, &counts, self.dry_run)?;
        Ok(StageOutcome::noted(adaptation.note()))
    }
}
