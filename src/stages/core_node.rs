//! core-node: distil the journal and dream into a core memory node
//!
//! Opt-in via `[pipeline] include_core_node`. Both inputs are required.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{no_generator, read_artifact};
use crate::error::{CycleError, CycleResult};
use crate::generation::{GenerationKind, GenerationRequest, Generator};
use crate::memory::ArtifactKind;
use crate::orchestrator::{Stage, StageContext, StageOutcome};

const CORE_NODE_MAX_TOKENS: u32 = 500;

pub struct CoreNodeStage {
    generator: Option<Arc<dyn Generator>>,
    temperature: f32,
}

impl CoreNodeStage {
    pub fn new(generator: Option<Arc<dyn Generator>>, temperature: f32) -> Self {
        Self {
            generator,
            temperature,
        }
    }
}

#[async_trait]
impl Stage for CoreNodeStage {
    fn name(&self) -> &str {
        "core-node"
    }

    async fn run(&self, ctx: &mut StageContext) -> CycleResult<StageOutcome> {
        let Some(generator) = &self.generator else {
            return Ok(no_generator());
        };

        let journal = read_artifact(&ctx.resolve(ArtifactKind::Journal)?)?;
        let dream = read_artifact(&ctx.resolve(ArtifactKind::Dream)?)?;
        if journal.trim().is_empty() || dream.trim().is_empty() {
            return Err(CycleError::ArtifactNotFound("journal or dream is empty".to_string()));
        }

        let request = GenerationRequest::new(GenerationKind::CoreNode)
            .with_context(format!(
                "--- JOURNAL ---\n{}\n\n--- DREAM ---\n{}",
                journal.trim(),
                dream.trim()
            ))
            .with_sampling(self.temperature, CORE_NODE_MAX_TOKENS);
        let node = generator.generate(&request).await?;

        let contents = format!("# Core Memory Node - {}\n\n{}\n", ctx.today, node.trim());
        let path = ctx
            .artifacts
            .write(ArtifactKind::CoreNode, ctx.today, &contents)
            .map_err(|e| CycleError::storage(ctx.artifacts.dir(ArtifactKind::CoreNode), e))?;
        info!("Core node saved -> {}", path.display());

        Ok(StageOutcome::produced(ArtifactKind::CoreNode, path))
    }
}
