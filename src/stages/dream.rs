//! dream: sample an archetype and resonance tags, then generate the dream
//!
//! A `Resonance Tag:` line in the generated text replaces the sampled
//! tags. That is how new tags enter the open resonance universe.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::info;

use super::{excerpt, no_generator, read_artifact, resolve_optional};
use crate::error::{CycleError, CycleResult};
use crate::generation::{GenerationKind, GenerationRequest, Generator};
use crate::memory::ArtifactKind;
use crate::metrics::extract_labels;
use crate::orchestrator::{ArtifactRef, Stage, StageContext, StageOutcome};
use crate::weights::{WeightDomain, WeightStore, WeightedSampler, ARCHETYPES};

const JOURNAL_EXCERPT_WORDS: usize = 500;

pub struct DreamStage {
    generator: Option<Arc<dyn Generator>>,
    weights: WeightStore,
    archetypes: WeightDomain,
    resonance: WeightDomain,
    tags_per_dream: usize,
    temperature: f32,
    max_tokens: u32,
    sampler: Mutex<WeightedSampler>,
}

impl DreamStage {
    pub fn new(
        generator: Option<Arc<dyn Generator>>,
        weights: WeightStore,
        archetypes: WeightDomain,
        resonance: WeightDomain,
        tags_per_dream: usize,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            generator,
            weights,
            archetypes,
            resonance,
            tags_per_dream,
            temperature,
            max_tokens,
            sampler: Mutex::new(WeightedSampler::new()),
        }
    }

    /// Replace the OS-seeded sampler
    pub fn with_sampler(mut self, sampler: WeightedSampler) -> Self {
        self.sampler = Mutex::new(sampler);
        self
    }

    /// One archetype and up to `tags_per_dream` distinct tags
    fn draw(&self) -> CycleResult<(String, Vec<String>)> {
        let archetype_weights = self.weights.load(&self.archetypes)?;
        let tag_weights = self.weights.load(&self.resonance)?;

        let mut sampler = self
            .sampler
            .lock()
            .map_err(|_| anyhow::anyhow!("dream sampler lock poisoned"))?;
        let archetype = sampler
            .pick(&archetype_weights)
            .unwrap_or_else(|| ARCHETYPES[0].to_string());
        let mut tags = sampler.sample(&tag_weights, self.tags_per_dream);
        let mut seen = Vec::with_capacity(tags.len());
        tags.retain(|t| {
            let fresh = !seen.contains(t);
            seen.push(t.clone());
            fresh
        });
        Ok((archetype, tags))
    }

    fn journal_excerpt(&self, ctx: &StageContext) -> CycleResult<String> {
        match resolve_optional(ctx, ArtifactKind::Journal)? {
            Some(path) => Ok(excerpt(&read_artifact(&path)?, JOURNAL_EXCERPT_WORDS, 2)),
            None => Ok(String::new()),
        }
    }
}

#[async_trait]
impl Stage for DreamStage {
    fn name(&self) -> &str {
        "dream"
    }

    async fn run(&self, ctx: &mut StageContext) -> CycleResult<StageOutcome> {
        let Some(generator) = &self.generator else {
            return Ok(no_generator());
        };

        let (archetype, sampled) = self.draw()?;
        let mut categories = vec![archetype.clone()];
        categories.extend(sampled.iter().cloned());

        let request = GenerationRequest::new(GenerationKind::Dream)
            .with_categories(categories)
            .with_context(self.journal_excerpt(ctx)?)
            .with_sampling(self.temperature, self.max_tokens);
        let raw = generator.generate(&request).await?;

        let (generated, body) = split_dream(&raw);
        let tags = if generated.is_empty() { sampled } else { generated };
        let tag_line = tags.join(" · ");

        let contents = format!(
            "# Archetypal Dream - {}\n\nArchetype: {}\nResonance Tag: {}\n\n## Dream\n\n{}\n",
            ctx.today, archetype, tag_line, body
        );
        let path = ctx
            .artifacts
            .write(ArtifactKind::Dream, ctx.today, &contents)
            .map_err(|e| CycleError::storage(ctx.artifacts.dir(ArtifactKind::Dream), e))?;
        info!("Dream saved ({} · {}) -> {}", archetype, tag_line, path.display());

        Ok(StageOutcome::Completed {
            artifact: Some(ArtifactRef {
                kind: ArtifactKind::Dream,
                path,
            }),
            note: Some(format!("{} | {}", archetype, tag_line)),
        })
    }
}

/// Split generated text into its resonance tags and the dream body
fn split_dream(raw: &str) -> (Vec<String>, String) {
    let mut tags = Vec::new();
    let mut body = Vec::new();
    for line in raw.lines().map(str::trim) {
        let lower = line.to_lowercase();
        if lower.starts_with("resonance tag") || lower.starts_with("resonance:") {
            if tags.is_empty() {
                let label = line.split_once(':').map(|(label, _)| label).unwrap_or(line);
                tags = extract_labels(line, label);
            }
        } else if !line.is_empty() {
            body.push(line);
        }
    }
    (tags, body.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::MockGenerator;
    use crate::memory::ArtifactStore;
    use crate::weights::{WeightMap, ARCHETYPE_RANGE, RESONANCE_RANGE};
    use chrono::NaiveDate;

    fn stage(dir: &tempfile::TempDir, generator: Option<Arc<dyn Generator>>) -> DreamStage {
        DreamStage::new(
            generator,
            WeightStore::new(dir.path().join("config")),
            WeightDomain::archetypes(ARCHETYPE_RANGE),
            WeightDomain::resonance_tags(RESONANCE_RANGE),
            2,
            0.95,
            900,
        )
        .with_sampler(WeightedSampler::seeded(7))
    }

    fn context(dir: &tempfile::TempDir) -> StageContext {
        StageContext::new(
            NaiveDate::from_ymd_opt(2025, 1, 4).unwrap(),
            ArtifactStore::with_dir(dir.path().join("memory")),
        )
    }

    #[test]
    fn test_split_dream_takes_generated_tags() {
        let raw = "Resonance Tag: Wonder · Regret\n\nA tide of glass.\n\nThe child laughs.";
        let (tags, body) = split_dream(raw);
        assert_eq!(tags, vec!["Wonder", "Regret"]);
        assert_eq!(body, "A tide of glass.\nThe child laughs.");
    }

    #[test]
    fn test_split_dream_without_tag_line() {
        let (tags, body) = split_dream("Only imagery.");
        assert!(tags.is_empty());
        assert_eq!(body, "Only imagery.");
    }

    #[tokio::test]
    async fn test_generated_tags_replace_sampled() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockGenerator::new();
        mock.expect_generate()
            .withf(|req| req.kind == GenerationKind::Dream && req.categories.len() >= 2)
            .times(1)
            .returning(|_| Ok("Resonance Tag: Vertigo · Wonder\nA staircase folds.".to_string()));

        let stage = stage(&dir, Some(Arc::new(mock)));
        let mut ctx = context(&dir);
        let outcome = stage.run(&mut ctx).await.unwrap();

        let StageOutcome::Completed { artifact, .. } = outcome else {
            panic!("expected completion");
        };
        let text = std::fs::read_to_string(artifact.unwrap().path).unwrap();
        assert!(text.contains("Resonance Tag: Vertigo · Wonder\n"));
        assert!(text.contains("## Dream\n\nA staircase folds."));
        assert_eq!(extract_labels(&text, "Archetype").len(), 1);
    }

    #[tokio::test]
    async fn test_sampled_tags_used_when_generator_omits_them() {
        let dir = tempfile::tempdir().unwrap();
        let weights = WeightStore::new(dir.path().join("config"));
        let only_shadow: WeightMap = [("Shadow", 1.0)].into_iter().collect();
        weights
            .save(
                &WeightDomain::new("archetypes", "archetype_bias.yaml", ARCHETYPE_RANGE, only_shadow.clone()),
                &only_shadow,
            )
            .unwrap();

        let mut mock = MockGenerator::new();
        mock.expect_generate()
            .returning(|_| Ok("Fog over an empty harbour.".to_string()));

        let stage = DreamStage::new(
            Some(Arc::new(mock)),
            weights,
            WeightDomain::new("archetypes", "archetype_bias.yaml", ARCHETYPE_RANGE, WeightMap::new()),
            WeightDomain::new("resonance", "tag_weights.yaml", RESONANCE_RANGE, [("Curiosity", 1.0)].into_iter().collect()),
            2,
            0.95,
            900,
        );
        let mut ctx = context(&dir);
        stage.run(&mut ctx).await.unwrap();

        let text = std::fs::read_to_string(ctx.resolve(ArtifactKind::Dream).unwrap()).unwrap();
        assert!(text.contains("Archetype: Shadow\n"));
        assert!(text.contains("Resonance Tag: Curiosity\n"));
    }

    #[tokio::test]
    async fn test_missing_generator_skips() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = stage(&dir, None).run(&mut context(&dir)).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Unavailable(_)));
    }
}
