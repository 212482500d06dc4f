//! External command stages, e.g. a dashboard renderer
//!
//! A program that is not installed is reported as skipped. A non-zero
//! exit or a missing working directory is a stage failure.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{CycleError, CycleResult};
use crate::orchestrator::{Stage, StageContext, StageOutcome};

/// Trailing stderr kept in a failure message
const STDERR_TAIL_CHARS: usize = 500;

pub struct ExternalStage {
    name: String,
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl ExternalStage {
    pub fn new(name: &str, program: &str, args: Vec<String>, working_dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args,
            working_dir: working_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl Stage for ExternalStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &mut StageContext) -> CycleResult<StageOutcome> {
        // Spawning in a missing directory also reports NotFound
        if !self.working_dir.is_dir() {
            return Err(CycleError::StageFailure(anyhow::anyhow!(
                "working directory {} does not exist",
                self.working_dir.display()
            )));
        }

        debug!("Running {} {:?} in {}", self.program, self.args, self.working_dir.display());
        let output = match Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StageOutcome::unavailable(format!("{} not found", self.program)));
            }
            Err(e) => {
                return Err(CycleError::StageFailure(
                    anyhow::Error::new(e).context(format!("Failed to run {}", self.program)),
                ))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let tail_start = stderr
                .char_indices()
                .rev()
                .nth(STDERR_TAIL_CHARS)
                .map(|(i, _)| i)
                .unwrap_or(0);
            return Err(CycleError::StageFailure(anyhow::anyhow!(
                "{} exited with {}: {}",
                self.program,
                output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                &stderr[tail_start..]
            )));
        }

        info!("External stage '{}' completed", self.name);
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(match stdout.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(last) => StageOutcome::noted(last.trim()),
            None => StageOutcome::done(),
        })
    }
}
