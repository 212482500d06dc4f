//! Configuration management
//!
//! Data root, generation service, pipeline policy and weight clamp ranges,
//! stored as TOML in the platform config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CycleError, CycleResult};
use crate::orchestrator::FailurePolicy;
use crate::weights::{ClampRange, ARCHETYPE_RANGE, RESONANCE_RANGE};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    /// Generation service settings
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Clamp ranges for the two weight domains
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Data root holding `config/` and `memory/`; platform data dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_journal_temperature")]
    pub journal_temperature: f32,
    #[serde(default = "default_dream_temperature")]
    pub dream_temperature: f32,
    #[serde(default = "default_reflection_temperature")]
    pub reflection_temperature: f32,
    #[serde(default = "default_direction_temperature")]
    pub direction_temperature: f32,
    #[serde(default = "default_core_node_temperature")]
    pub core_node_temperature: f32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    900
}

fn default_journal_temperature() -> f32 {
    1.0
}

fn default_dream_temperature() -> f32 {
    0.95
}

fn default_reflection_temperature() -> f32 {
    0.9
}

fn default_direction_temperature() -> f32 {
    0.8
}

fn default_core_node_temperature() -> f32 {
    0.85
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            journal_temperature: default_journal_temperature(),
            dream_temperature: default_dream_temperature(),
            reflection_temperature: default_reflection_temperature(),
            direction_temperature: default_direction_temperature(),
            core_node_temperature: default_core_node_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// `continue` or `fail-fast`
    #[serde(default = "default_policy")]
    pub policy: String,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    /// Trailing observation window, in days, ending today
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default = "default_tags_per_dream")]
    pub tags_per_dream: usize,
    /// Merge the dream and directive into a daily output file
    #[serde(default = "default_true")]
    pub include_output: bool,
    /// Distil the journal and dream into a core memory node
    #[serde(default)]
    pub include_core_node: bool,
    /// Extra command stages run after the built-in ones
    #[serde(default)]
    pub external: Vec<ExternalStageConfig>,
}

fn default_policy() -> String {
    "continue".to_string()
}

fn default_retry_backoff_secs() -> u64 {
    5
}

fn default_window_days() -> u32 {
    7
}

fn default_tags_per_dream() -> usize {
    2
}

fn default_true() -> bool {
    true
}

/// Longest accepted observation window, about ten years
pub const MAX_WINDOW_DAYS: u32 = 3660;

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            retry_backoff_secs: default_retry_backoff_secs(),
            window_days: default_window_days(),
            tags_per_dream: default_tags_per_dream(),
            include_output: true,
            include_core_node: false,
            external: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// `window_days`, rejected outside `1..=MAX_WINDOW_DAYS`
    pub fn checked_window_days(&self) -> CycleResult<u32> {
        if !(1..=MAX_WINDOW_DAYS).contains(&self.window_days) {
            return Err(CycleError::Config(format!(
                "pipeline window_days = {} must be between 1 and {}",
                self.window_days, MAX_WINDOW_DAYS
            )));
        }
        Ok(self.window_days)
    }
}

/// A program run as its own stage, e.g. a dashboard renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalStageConfig {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_archetype_min")]
    pub archetype_min: f64,
    #[serde(default = "default_archetype_max")]
    pub archetype_max: f64,
    #[serde(default = "default_resonance_min")]
    pub resonance_min: f64,
    #[serde(default = "default_resonance_max")]
    pub resonance_max: f64,
}

fn default_archetype_min() -> f64 {
    ARCHETYPE_RANGE.min
}

fn default_archetype_max() -> f64 {
    ARCHETYPE_RANGE.max
}

fn default_resonance_min() -> f64 {
    RESONANCE_RANGE.min
}

fn default_resonance_max() -> f64 {
    RESONANCE_RANGE.max
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            archetype_min: default_archetype_min(),
            archetype_max: default_archetype_max(),
            resonance_min: default_resonance_min(),
            resonance_max: default_resonance_max(),
        }
    }
}

impl WeightsConfig {
    pub fn archetype_range(&self) -> CycleResult<ClampRange> {
        checked_range("archetype", self.archetype_min, self.archetype_max)
    }

    pub fn resonance_range(&self) -> CycleResult<ClampRange> {
        checked_range("resonance", self.resonance_min, self.resonance_max)
    }
}

fn checked_range(domain: &str, min: f64, max: f64) -> CycleResult<ClampRange> {
    if !(min > 0.0 && min < max) {
        return Err(CycleError::Config(format!(
            "{} weight range [{}, {}] must satisfy 0 < min < max",
            domain, min, max
        )));
    }
    Ok(ClampRange::new(min, max))
}

impl Config {
    /// Load configuration from the default location, creating it on first use
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().context("Config path has no parent")?;
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Data root: explicit override, then `[paths] root`, then the platform data dir
    pub fn root_dir(&self, override_root: Option<&Path>) -> Result<PathBuf> {
        match override_root.or(self.paths.root.as_deref()) {
            Some(root) => Ok(root.to_path_buf()),
            None => data_dir(),
        }
    }

    /// Failure policy named by `name`, or by `[pipeline] policy` when `None`
    pub fn failure_policy(&self, name: Option<&str>) -> CycleResult<FailurePolicy> {
        let name = name.unwrap_or(&self.pipeline.policy);
        match name.to_lowercase().as_str() {
            "fail-fast" | "fail_fast" | "failfast" => Ok(FailurePolicy::FailFastRetry {
                backoff: Duration::from_secs(self.pipeline.retry_backoff_secs),
            }),
            "continue" | "continue-aggregate" => Ok(FailurePolicy::ContinueAggregate),
            other => Err(CycleError::Config(format!(
                "unknown failure policy '{}' (expected fail-fast or continue)",
                other
            ))),
        }
    }
}

/// Directory layout under the data root
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Weight files live here
    pub fn weights_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.root.join("memory")
    }

    pub fn system_dir(&self) -> PathBuf {
        self.memory_dir().join("system")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.system_dir().join("logs")
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.system_dir().join("metrics.csv")
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "reverie", "reverie")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "reverie", "reverie")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}
