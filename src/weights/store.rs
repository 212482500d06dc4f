//! Weight Store - persisted category weights merged with built-in defaults
//!
//! Each domain lives in its own flat YAML file under the store directory.
//! Loading never drops keys the file knows about, so a domain's universe
//! can grow across cycles. Saving replaces the whole file atomically.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::map::{ClampRange, WeightMap};
use crate::error::{CycleError, CycleResult};

/// The four inner archetypes tracked by the dream stage
pub const ARCHETYPES: [&str; 4] = ["Strategist", "Idealist", "Shadow", "Child"];

/// Seed set of resonance tags before any have been observed
pub const DEFAULT_TAGS: [&str; 5] = ["Curiosity", "Existence", "Knowledge", "Wonder", "Responsibility"];

pub const ARCHETYPE_RANGE: ClampRange = ClampRange::new(0.3, 3.0);
pub const RESONANCE_RANGE: ClampRange = ClampRange::new(0.5, 2.0);

/// A named family of weights with its own clamp interval and defaults
#[derive(Debug, Clone)]
pub struct WeightDomain {
    pub name: String,
    pub file_name: String,
    pub range: ClampRange,
    pub defaults: WeightMap,
}

impl WeightDomain {
    pub fn new(name: &str, file_name: &str, range: ClampRange, defaults: WeightMap) -> Self {
        Self {
            name: name.to_string(),
            file_name: file_name.to_string(),
            range,
            defaults,
        }
    }

    /// Closed universe of archetypes, default weight 1.0
    pub fn archetypes(range: ClampRange) -> Self {
        Self::new("archetypes", "archetype_bias.yaml", range, WeightMap::uniform(&ARCHETYPES, 1.0))
    }

    /// Open universe of resonance tags, seeded with the default set
    pub fn resonance_tags(range: ClampRange) -> Self {
        Self::new("resonance", "tag_weights.yaml", range, WeightMap::uniform(&DEFAULT_TAGS, 1.0))
    }
}

/// Flat-file store owning the weight files of every domain
#[derive(Debug, Clone)]
pub struct WeightStore {
    dir: PathBuf,
}

impl WeightStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, domain: &WeightDomain) -> PathBuf {
        self.dir.join(&domain.file_name)
    }

    /// Defaults merged with persisted overrides; persisted values win
    pub fn load(&self, domain: &WeightDomain) -> CycleResult<WeightMap> {
        let path = self.path_for(domain);
        let mut weights = domain.defaults.clone();

        if !path.exists() {
            debug!("No {} weights at {}, using defaults", domain.name, path.display());
            return Ok(weights);
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| CycleError::storage(&path, e))?;
        for (key, value) in parse_weight_file(&contents).map_err(|e| CycleError::storage(&path, e))? {
            let clamped = domain.range.clamp(value);
            if clamped != value {
                warn!(
                    "{} weight '{}' = {} outside {}, clamped to {}",
                    domain.name, key, value, domain.range, clamped
                );
            }
            weights.set(&key, clamped);
        }

        Ok(weights)
    }

    /// Overwrite the domain file with the full map via temp file + rename
    pub fn save(&self, domain: &WeightDomain, weights: &WeightMap) -> CycleResult<()> {
        let path = self.path_for(domain);
        std::fs::create_dir_all(&self.dir).map_err(|e| CycleError::storage(&self.dir, e))?;

        let yaml = serde_yaml::to_string(weights).map_err(|e| CycleError::storage(&path, e))?;
        let tmp = path.with_extension("yaml.tmp");
        std::fs::write(&tmp, yaml).map_err(|e| CycleError::storage(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(CycleError::storage(&path, e));
        }

        info!("Updated {} weights -> {}", domain.name, path.display());
        Ok(())
    }
}

/// Parse `Key: 1.25` lines, preserving file order
fn parse_weight_file(contents: &str) -> anyhow::Result<Vec<(String, f64)>> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
    let mapping = match value {
        serde_yaml::Value::Null => return Ok(Vec::new()),
        serde_yaml::Value::Mapping(mapping) => mapping,
        other => anyhow::bail!("expected a mapping of weights, found {:?}", other),
    };

    let mut entries = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = match key {
            serde_yaml::Value::String(s) => s,
            other => anyhow::bail!("weight keys must be strings, found {:?}", other),
        };
        let weight = value
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("weight for '{}' is not a number", key))?;
        entries.push((key, weight));
    }
    Ok(entries)
}
