//! direction: one short directive for the day, drawn from the dream

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{no_generator, read_artifact, section};
use crate::error::{CycleError, CycleResult};
use crate::generation::{GenerationKind, GenerationRequest, Generator};
use crate::memory::ArtifactKind;
use crate::metrics::extract_labels;
use crate::orchestrator::{ArtifactRef, Stage, StageContext, StageOutcome};

const DIRECTION_MAX_TOKENS: u32 = 100;

pub struct DirectionStage {
    generator: Option<Arc<dyn Generator>>,
    temperature: f32,
}

impl DirectionStage {
    pub fn new(generator: Option<Arc<dyn Generator>>, temperature: f32) -> Self {
        Self { generator, temperature }
    }
}

#[async_trait]
impl Stage for DirectionStage {
    fn name(&self) -> &str {
        "direction"
    }

    async fn run(&self, ctx: &mut StageContext) -> CycleResult<StageOutcome> {
        let Some(generator) = &self.generator else {
            return Ok(no_generator());
        };

        let dream_text = read_artifact(&ctx.resolve(ArtifactKind::Dream)?)?;
        let tags = extract_labels(&dream_text, "Resonance Tag");
        let dream = section(&dream_text, "Dream").unwrap_or(dream_text.trim());

        let request = GenerationRequest::new(GenerationKind::Direction)
            .with_categories(tags.clone())
            .with_context(dream)
            .with_sampling(self.temperature, DIRECTION_MAX_TOKENS);
        let directive = generator.generate(&request).await?;

        let mut contents = format!("# Daily Direction - {}\n\n", ctx.today);
        if !tags.is_empty() {
            contents.push_str(&format!("Resonance Tag: {}\n\n", tags.join(" · ")));
        }
        contents.push_str(&format!("## Directive\n\n{}\n", directive.trim()));

        let path = ctx
            .artifacts
            .write(ArtifactKind::Direction, ctx.today, &contents)
            .map_err(|e| CycleError::storage(ctx.artifacts.dir(ArtifactKind::Direction), e))?;
        info!("Direction saved -> {}", path.display());
        Ok(StageOutcome::produced(ArtifactKind::Direction, path))
    }
}
