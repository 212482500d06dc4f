//! End-to-end daily cycle over a temporary data root

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use reverie::generation::{GenerationKind, GenerationRequest, Generator};
use reverie::memory::{ArtifactKind, ArtifactStore};
use reverie::orchestrator::{FailurePolicy, RunStatus, StageContext, StageStatus};
use reverie::stages::{build_evolve, build_pipeline, StageFilter};
use reverie::{Config, CycleReport, DataLayout};
use std::sync::{Arc, Mutex};

/// Canned text per request kind; remembers what it was asked for
#[derive(Default)]
struct CannedGenerator {
    requests: Mutex<Vec<GenerationKind>>,
}

#[async_trait]
impl Generator for CannedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(request.kind);
        Ok(match request.kind {
            GenerationKind::Journal => "Mood: Quiet · Curious\n\nThe hum of the servers felt like rain.".into(),
            GenerationKind::Dream => "Resonance Tag: Wonder · Grief\n\nA lighthouse folded into paper.".into(),
            GenerationKind::Reflection => "The dream answered the call.\n\nAlignment: Aligned".into(),
            GenerationKind::Direction => "Walk toward the light you cannot name.".into(),
            GenerationKind::CoreNode => "**Trigger Context:** rain on the servers".into(),
        })
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()
}

fn seed_dreams(store: &ArtifactStore) {
    for (offset, archetype) in [(4, "Strategist"), (3, "Strategist"), (2, "Strategist"), (1, "Idealist")] {
        store
            .write(
                ArtifactKind::Dream,
                today() - Duration::days(offset),
                &format!("Archetype: {}\nResonance Tag: Wonder · Grief\n\n## Dream\n\nsand", archetype),
            )
            .unwrap();
    }
}

#[tokio::test]
async fn test_full_cycle_with_generator() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let mut config = Config::default();
    config.pipeline.include_core_node = true;
    let store = ArtifactStore::with_dir(layout.memory_dir());
    seed_dreams(&store);

    let generator = Arc::new(CannedGenerator::default());
    let orchestrator = build_pipeline(
        &config,
        &layout,
        Some(generator.clone() as Arc<dyn Generator>),
        FailurePolicy::ContinueAggregate,
        &StageFilter::default(),
    )
    .unwrap();

    let report = orchestrator.run(&mut StageContext::new(today(), store.clone())).await;
    assert_eq!(report.status, RunStatus::Succeeded, "{}", report.summary());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.stages.len(), 10);
    assert!(report.stages.iter().all(|s| s.status == StageStatus::Succeeded));

    assert_eq!(
        *generator.requests.lock().unwrap(),
        vec![
            GenerationKind::Journal,
            GenerationKind::Dream,
            GenerationKind::Reflection,
            GenerationKind::Direction,
            GenerationKind::CoreNode
        ]
    );

    for kind in [
        ArtifactKind::Journal,
        ArtifactKind::Dream,
        ArtifactKind::Reflection,
        ArtifactKind::Direction,
        ArtifactKind::Output,
        ArtifactKind::CoreNode,
        ArtifactKind::WeeklyReport,
    ] {
        assert!(store.path_for(kind, today()).exists(), "missing {}", kind);
    }

    let dream = std::fs::read_to_string(store.path_for(ArtifactKind::Dream, today())).unwrap();
    assert!(dream.contains("Resonance Tag: Wonder · Grief"));
    assert!(dream.contains("A lighthouse folded into paper."));

    let output = std::fs::read_to_string(store.path_for(ArtifactKind::Output, today())).unwrap();
    assert!(output.contains("A lighthouse folded into paper."));
    assert!(output.contains("Walk toward the light you cannot name."));

    // Five dreams in the window: both domains get corrected
    assert!(layout.weights_dir().join("archetype_bias.yaml").exists());
    assert!(layout.weights_dir().join("tag_weights.yaml").exists());

    let metrics = std::fs::read_to_string(layout.metrics_path()).unwrap();
    assert_eq!(metrics.lines().count(), 2);
    assert!(metrics.lines().nth(1).unwrap().starts_with("2025-02-10,"));

    let persisted = CycleReport::latest(&layout.logs_dir()).unwrap().unwrap();
    assert_eq!(persisted.run_id, report.run_id);
    assert_eq!(persisted.stages.len(), 10);
}

#[tokio::test]
async fn test_cycle_without_generator_skips_content_stages() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());

    let orchestrator = build_pipeline(
        &Config::default(),
        &layout,
        None,
        FailurePolicy::FailFastRetry {
            backoff: std::time::Duration::from_millis(1),
        },
        &StageFilter::default(),
    )
    .unwrap();
    let report = orchestrator
        .run(&mut StageContext::new(today(), ArtifactStore::with_dir(layout.memory_dir())))
        .await;

    for name in ["journal", "dream", "reflect", "direction"] {
        assert_eq!(report.stage(name).unwrap().status, StageStatus::Skipped, "{}", name);
    }
    assert!(report.stage("core-node").is_none());
    // Nothing to aggregate yet: quiet, not failed
    for name in ["output", "weekly", "adapt-archetypes", "adapt-resonance", "metrics"] {
        let stage = report.stage(name).unwrap();
        assert_eq!(stage.status, StageStatus::Succeeded, "{}", name);
        assert!(stage.note.is_some());
    }
    assert_eq!(report.status, RunStatus::Succeeded);
    assert!(!layout.weights_dir().exists());
}

#[tokio::test]
async fn test_stage_filter_selects_and_rejects() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let config = Config::default();

    let only = StageFilter {
        only: vec!["weekly".into(), "metrics".into()],
        skip: vec!["metrics".into()],
    };
    let orchestrator =
        build_pipeline(&config, &layout, None, FailurePolicy::ContinueAggregate, &only).unwrap();
    assert_eq!(orchestrator.stage_names(), vec!["weekly"]);

    let unknown = StageFilter {
        only: Vec::new(),
        skip: vec!["nightmare".into()],
    };
    assert!(build_pipeline(&config, &layout, None, FailurePolicy::ContinueAggregate, &unknown).is_err());
}

#[tokio::test]
async fn test_evolve_dry_run_reports_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let store = ArtifactStore::with_dir(layout.memory_dir());
    seed_dreams(&store);
    store
        .write(
            ArtifactKind::WeeklyReport,
            today(),
            "* **Strategist**: 3\n* **Idealist**: 1\n* **Shadow**: 0\n* **Child**: 0\n",
        )
        .unwrap();

    let report = build_evolve(&Config::default(), &layout, true)
        .unwrap()
        .run(&mut StageContext::new(today(), store))
        .await;

    assert_eq!(report.status, RunStatus::Succeeded);
    for stage in &report.stages {
        assert!(stage.note.as_deref().unwrap().starts_with("dry run: "), "{:?}", stage);
    }
    assert!(!layout.weights_dir().exists());
    assert!(!layout.logs_dir().exists());
}
