//! output: today's dream and directive merged into one readable file

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use super::{read_artifact, resolve_optional, section};
use crate::error::{CycleError, CycleResult};
use crate::memory::ArtifactKind;
use crate::metrics::extract_labels;
use crate::orchestrator::{ArtifactRef, Stage, StageContext, StageOutcome};

pub struct OutputStage;

#[async_trait]
impl Stage for OutputStage {
    fn name(&self) -> &str {
        "output"
    }

    async fn run(&self, ctx: &mut StageContext) -> CycleResult<StageOutcome> {
        let dream = resolve_optional(ctx, ArtifactKind::Dream)?;
        let direction = resolve_optional(ctx, ArtifactKind::Direction)?;
        if dream.is_none() && direction.is_none() {
            return Err(CycleError::ArtifactNotFound(
                "no dream or direction to merge".to_string(),
            ));
        }

        let dream_text = read_or(dream.as_ref(), "No dream found.")?;
        let direction_text = read_or(direction.as_ref(), "No direction found.")?;
        let tags = extract_labels(&dream_text, "Resonance Tag");

        let mut contents = format!("# Daily Output - {}\n\n## Archetypal Dream\n\n", ctx.today);
        if let Some(archetype) = extract_labels(&dream_text, "Archetype").first() {
            contents.push_str(&format!("Archetype: {}\n", archetype));
        }
        if !tags.is_empty() {
            contents.push_str(&format!("Resonance Tag: {}\n", tags.join(" · ")));
        }
        contents.push_str(&format!(
            "\n{}\n\n---\n\n## Daily Directive\n\n{}\n",
            section(&dream_text, "Dream").unwrap_or(dream_text.trim()),
            section(&direction_text, "Directive").unwrap_or(direction_text.trim()),
        ));

        let path = ctx
            .artifacts
            .write(ArtifactKind::Output, ctx.today, &contents)
            .map_err(|e| CycleError::storage(ctx.artifacts.dir(ArtifactKind::Output), e))?;
        info!("Daily output merged -> {}", path.display());

        let missing: Vec<&str> = [("dream", &dream), ("direction", &direction)]
            .iter()
            .filter(|(_, p)| p.is_none())
            .map(|(name, _)| *name)
            .collect();
        Ok(StageOutcome::Completed {
            artifact: Some(ArtifactRef {
                kind: ArtifactKind::Output,
                path,
            }),
            note: (!missing.is_empty()).then(|| format!("no {} found", missing.join(", "))),
        })
    }
}

fn read_or(path: Option<&PathBuf>, placeholder: &str) -> CycleResult<String> {
    match path {
        Some(path) => read_artifact(path),
        None => Ok(placeholder.to_string()),
    }
}
