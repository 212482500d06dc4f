//! Stages of the daily cycle
//!
//! Built-in order: journal, dream, reflect, direction, output,
//! core-node, weekly, adapt-archetypes, adapt-resonance, metrics;
//! configured external commands run last. `output` and `core-node` are
//! toggled from `[pipeline]`.

pub mod adapt;
pub mod core_node;
pub mod direction;
pub mod dream;
pub mod external;
pub mod journal;
pub mod metrics;
pub mod output;
pub mod reflect;
pub mod weekly;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use adapt::{AdaptArchetypesStage, AdaptResonanceStage};
pub use core_node::CoreNodeStage;
pub use direction::DirectionStage;
pub use dream::DreamStage;
pub use external::ExternalStage;
pub use journal::JournalStage;
pub use metrics::MetricsStage;
pub use output::OutputStage;
pub use reflect::ReflectStage;
pub use weekly::WeeklyStage;

use crate::config::{Config, DataLayout};
use crate::error::{CycleError, CycleResult};
use crate::generation::Generator;
use crate::metrics::MetricsSummary;
use crate::memory::ArtifactKind;
use crate::orchestrator::{FailurePolicy, Orchestrator, StageContext, StageOutcome};
use crate::weights::{WeightDomain, WeightStore};

/// Built-in stage names, in run order
pub const STAGE_NAMES: [&str; 10] = [
    "journal",
    "dream",
    "reflect",
    "direction",
    "output",
    "core-node",
    "weekly",
    "adapt-archetypes",
    "adapt-resonance",
    "metrics",
];

/// `--only` / `--skip` selection of stages
#[derive(Debug, Clone, Default)]
pub struct StageFilter {
    pub only: Vec<String>,
    pub skip: Vec<String>,
}

impl StageFilter {
    pub fn includes(&self, name: &str) -> bool {
        (self.only.is_empty() || self.only.iter().any(|n| n == name))
            && !self.skip.iter().any(|n| n == name)
    }

    /// Reject names that match no stage
    fn validate(&self, known: &[String]) -> CycleResult<()> {
        for name in self.only.iter().chain(&self.skip) {
            if !known.iter().any(|k| k == name) {
                return Err(CycleError::Config(format!(
                    "unknown stage '{}' (known: {})",
                    name,
                    known.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Assemble the daily pipeline from config
pub fn build_pipeline(
    config: &Config,
    layout: &DataLayout,
    generator: Option<Arc<dyn Generator>>,
    policy: FailurePolicy,
    filter: &StageFilter,
) -> CycleResult<Orchestrator> {
    let known: Vec<String> = STAGE_NAMES
        .iter()
        .map(|s| s.to_string())
        .chain(config.pipeline.external.iter().map(|e| e.name.clone()))
        .collect();
    filter.validate(&known)?;

    let generation = &config.generation;
    let weights = WeightStore::new(layout.weights_dir());
    let archetypes = WeightDomain::archetypes(config.weights.archetype_range()?);
    let resonance = WeightDomain::resonance_tags(config.weights.resonance_range()?);
    let window_days = config.pipeline.checked_window_days()?;

    let mut orchestrator = Orchestrator::new(policy).with_report_dir(layout.logs_dir());
    let mut add = |stage: Box<dyn crate::orchestrator::Stage>| {
        if filter.includes(stage.name()) {
            orchestrator.add_stage(stage);
        }
    };

    add(Box::new(JournalStage::new(
        generator.clone(),
        generation.journal_temperature,
        generation.max_tokens,
    )));
    add(Box::new(DreamStage::new(
        generator.clone(),
        weights.clone(),
        archetypes.clone(),
        resonance.clone(),
        config.pipeline.tags_per_dream,
        generation.dream_temperature,
        generation.max_tokens,
    )));
    add(Box::new(ReflectStage::new(
        generator.clone(),
        weights.clone(),
        archetypes.clone(),
        generation.reflection_temperature,
    )));
    add(Box::new(DirectionStage::new(generator.clone(), generation.direction_temperature)));
    if config.pipeline.include_output {
        add(Box::new(OutputStage));
    }
    if config.pipeline.include_core_node {
        add(Box::new(CoreNodeStage::new(generator, generation.core_node_temperature)));
    }
    add(Box::new(WeeklyStage::new(window_days)));
    add(Box::new(AdaptArchetypesStage::new(weights.clone(), archetypes)));
    add(Box::new(AdaptResonanceStage::new(weights, resonance, window_days)));
    add(Box::new(MetricsStage::new(MetricsSummary::new(layout.metrics_path()))));
    for external in &config.pipeline.external {
        add(Box::new(ExternalStage::new(
            &external.name,
            &external.program,
            external.args.clone(),
            layout.root(),
        )));
    }

    Ok(orchestrator)
}

/// Only the two weight adaptations, optionally without writing
pub fn build_evolve(config: &Config, layout: &DataLayout, dry_run: bool) -> CycleResult<Orchestrator> {
    let weights = WeightStore::new(layout.weights_dir());
    let archetypes = WeightDomain::archetypes(config.weights.archetype_range()?);
    let resonance = WeightDomain::resonance_tags(config.weights.resonance_range()?);
    let window_days = config.pipeline.checked_window_days()?;

    let mut orchestrator = Orchestrator::new(FailurePolicy::ContinueAggregate)
        .with_stage(AdaptArchetypesStage::new(weights.clone(), archetypes).dry_run(dry_run))
        .with_stage(
            AdaptResonanceStage::new(weights, resonance, window_days).dry_run(dry_run),
        );
    if !dry_run {
        orchestrator = orchestrator.with_report_dir(layout.logs_dir());
    }
    Ok(orchestrator)
}

pub(crate) fn no_generator() -> StageOutcome {
    StageOutcome::unavailable("no generation service configured (API key not set)")
}

/// Like `StageContext::resolve`, with a missing artifact as `None`
pub(crate) fn resolve_optional(ctx: &StageContext, kind: ArtifactKind) -> CycleResult<Option<PathBuf>> {
    match ctx.resolve(kind) {
        Ok(path) => Ok(Some(path)),
        Err(CycleError::ArtifactNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

pub(crate) fn read_artifact(path: &Path) -> CycleResult<String> {
    std::fs::read_to_string(path).map_err(|e| CycleError::storage(path, e))
}

/// Body under a `## <heading>` line, up to the next `## ` heading
pub(crate) fn section<'a>(text: &'a str, heading: &str) -> Option<&'a str> {
    let re = Regex::new(&format!(r"(?m)^##\s+{}\s*$", regex::escape(heading))).ok()?;
    let start = re.find(text)?.end();
    let rest = &text[start..];
    let end = rest.find("\n## ").unwrap_or(rest.len());
    let body = rest[..end].trim();
    (!body.is_empty()).then_some(body)
}

/// Leading paragraphs of `text`, capped by word and paragraph count
pub(crate) fn excerpt(text: &str, max_words: usize, max_paragraphs: usize) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut words = 0;
    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let n = para.split_whitespace().count();
        if words + n > max_words || kept.len() >= max_paragraphs {
            break;
        }
        kept.push(para);
        words += n;
    }
    kept.join("\n\n")
}
