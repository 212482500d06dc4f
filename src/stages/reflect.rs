//! reflect: compare yesterday's directive with today's dream
//!
//! Every reflection ends with an `Alignment:` line naming one of the
//! tracked outcomes; when the generator leaves it out or names something
//! else, the keyword heuristic decides.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{no_generator, read_artifact, section};
use crate::error::{CycleError, CycleResult};
use crate::generation::{GenerationKind, GenerationRequest, Generator};
use crate::memory::ArtifactKind;
use crate::metrics::{classify_alignment, extract_labels, ALIGNMENTS};
use crate::orchestrator::{ArtifactRef, Stage, StageContext, StageOutcome};
use crate::weights::{WeightDomain, WeightStore};

const DREAM_FRAGMENT_CHARS: usize = 400;
const REFLECTION_MAX_TOKENS: u32 = 200;

pub struct ReflectStage {
    generator: Option<Arc<dyn Generator>>,
    weights: WeightStore,
    archetypes: WeightDomain,
    temperature: f32,
}

impl ReflectStage {
    pub fn new(
        generator: Option<Arc<dyn Generator>>,
        weights: WeightStore,
        archetypes: WeightDomain,
        temperature: f32,
    ) -> Self {
        Self {
            generator,
            weights,
            archetypes,
            temperature,
        }
    }

    fn previous_directive(&self, ctx: &StageContext) -> CycleResult<String> {
        match ctx.previous(ArtifactKind::Direction)? {
            Some(previous) => {
                let text = read_artifact(&previous.path)?;
                Ok(section(&text, "Directive").unwrap_or(text.trim()).to_string())
            }
            None => Ok("No directive found.".to_string()),
        }
    }

    fn bias_summary(&self) -> CycleResult<String> {
        let bias = self.weights.load(&self.archetypes)?;
        Ok(bias
            .iter()
            .map(|(k, w)| format!("{}: {}", k, w))
            .collect::<Vec<_>>()
            .join(", "))
    }
}

#[async_trait]
impl Stage for ReflectStage {
    fn name(&self) -> &str {
        "reflect"
    }

    async fn run(&self, ctx: &mut StageContext) -> CycleResult<StageOutcome> {
        let Some(generator) = &self.generator else {
            return Ok(no_generator());
        };

        let dream_text = read_artifact(&ctx.resolve(ArtifactKind::Dream)?)?;
        let dream = section(&dream_text, "Dream").unwrap_or(dream_text.trim()).to_string();
        let directive = self.previous_directive(ctx)?;

        let context = format!(
            "Yesterday's directive:\n\"\"\"{}\"\"\"\n\nToday's dream:\n\"\"\"{}\"\"\"\n\nCurrent archetype bias map: {}",
            directive,
            dream,
            self.bias_summary()?
        );
        let request = GenerationRequest::new(GenerationKind::Reflection)
            .with_context(context)
            .with_sampling(self.temperature, REFLECTION_MAX_TOKENS);
        let reflection = ensure_alignment(&generator.generate(&request).await?);

        let fragment: String = dream.chars().take(DREAM_FRAGMENT_CHARS).collect();
        let contents = format!(
            "# Daily Reflection - {}\n\n## Yesterday's Directive\n\n{}\n\n## Today's Dream Fragment\n\n{}...\n\n## Reflection\n\n{}\n",
            ctx.today, directive, fragment, reflection
        );
        let path = ctx
            .artifacts
            .write(ArtifactKind::Reflection, ctx.today, &contents)
            .map_err(|e| CycleError::storage(ctx.artifacts.dir(ArtifactKind::Reflection), e))?;

        let outcome = classify_alignment(&reflection);
        info!("Reflection saved ({}) -> {}", outcome, path.display());
        Ok(StageOutcome::Completed {
            artifact: Some(ArtifactRef {
                kind: ArtifactKind::Reflection,
                path,
            }),
            note: Some(format!("Alignment: {}", outcome)),
        })
    }
}

/// The reflection with exactly one valid trailing `Alignment:` line
fn ensure_alignment(reflection: &str) -> String {
    let reflection = reflection.trim();
    let stated = extract_labels(reflection, "Alignment");
    if let Some(value) = stated.first() {
        if ALIGNMENTS.iter().any(|a| a.eq_ignore_ascii_case(value)) {
            return reflection.to_string();
        }
    }

    let outcome = classify_alignment(reflection);
    debug!("Reflection lacked a valid alignment, inferred {}", outcome);
    let body = reflection
        .lines()
        .filter(|l| !l.trim_start().to_lowercase().starts_with("alignment"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\nAlignment: {}", body.trim_end(), outcome)
}
