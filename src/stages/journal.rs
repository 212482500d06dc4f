//! journal: a short mood-tagged entry appended to today's journal file

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use super::{excerpt, no_generator, read_artifact};
use crate::error::{CycleError, CycleResult};
use crate::generation::{GenerationKind, GenerationRequest, Generator};
use crate::memory::ArtifactKind;
use crate::orchestrator::{ArtifactRef, Stage, StageContext, StageOutcome};

/// Entries longer than this are regenerated
const MAX_WORDS: usize = 180;
const MAX_GENERATIONS: usize = 3;

pub struct JournalStage {
    generator: Option<Arc<dyn Generator>>,
    temperature: f32,
    max_tokens: u32,
}

impl JournalStage {
    pub fn new(generator: Option<Arc<dyn Generator>>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            generator,
            temperature,
            max_tokens,
        }
    }

    /// Last entry of the newest journal before today, for continuity
    fn previous_entry(&self, ctx: &StageContext) -> CycleResult<String> {
        let Some(previous) = ctx.previous(ArtifactKind::Journal)? else {
            return Ok(String::new());
        };
        let text = read_artifact(&previous.path)?;
        let last = text.rsplit("\n## ").next().unwrap_or_default();
        let body = last.split_once("\n\n").map(|(_, body)| body).unwrap_or(last);
        Ok(excerpt(body, MAX_WORDS, 2))
    }
}

#[async_trait]
impl Stage for JournalStage {
    fn name(&self) -> &str {
        "journal"
    }

    async fn run(&self, ctx: &mut StageContext) -> CycleResult<StageOutcome> {
        let Some(generator) = &self.generator else {
            return Ok(no_generator());
        };

        let request = GenerationRequest::new(GenerationKind::Journal)
            .with_context(self.previous_entry(ctx)?)
            .with_sampling(self.temperature, self.max_tokens);

        let mut attempt = 1;
        let entry = loop {
            let entry = generator.generate(&request).await?;
            let words = entry.split_whitespace().count();
            if words <= MAX_WORDS || attempt == MAX_GENERATIONS {
                break entry;
            }
            debug!("Journal entry too long ({} words, attempt {})", words, attempt);
            attempt += 1;
        };

        let heading = format!("Entry: {}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"));
        let appended = ctx
            .artifacts
            .append(ArtifactKind::Journal, ctx.today, &heading, &entry)
            .map_err(|e| CycleError::storage(ctx.artifacts.dir(ArtifactKind::Journal), e))?;

        let path = ctx.artifacts.path_for(ArtifactKind::Journal, ctx.today);
        let note = match appended {
            Some(_) => {
                info!("Journal entry appended -> {}", path.display());
                mood_line(&entry)
            }
            None => Some("duplicate entry skipped".to_string()),
        };
        Ok(StageOutcome::Completed {
            artifact: Some(ArtifactRef {
                kind: ArtifactKind::Journal,
                path,
            }),
            note,
        })
    }
}

/// `Mood: <Emotion> · <Tone>` from the first line, if well formed
fn mood_line(entry: &str) -> Option<String> {
    let first = entry.lines().next()?.trim();
    let mood = first.strip_prefix("Mood:")?.trim();
    mood.contains('·').then(|| mood.to_string())
}
