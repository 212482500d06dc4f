//! Metrics summary - one CSV row per aggregation period
//!
//! Consumed by external charting; rows are appended and a period that is
//! already present is left alone.

use chrono::NaiveDate;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::aggregator::ALIGNMENTS;
use crate::error::{CycleError, CycleResult};
use crate::weights::{ObservationCount, ARCHETYPES};

pub struct MetricsSummary {
    path: PathBuf,
}

impl MetricsSummary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `date,strategist,...,ignored`
    pub fn header() -> String {
        std::iter::once("date".to_string())
            .chain(ARCHETYPES.iter().map(|a| a.to_lowercase()))
            .chain(ALIGNMENTS.iter().map(|a| a.to_lowercase()))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Dates that already have a row
    pub fn recorded_dates(&self) -> CycleResult<Vec<NaiveDate>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| CycleError::storage(&self.path, e))?;
        Ok(contents
            .lines()
            .skip(1)
            .filter_map(|line| line.split(',').next())
            .filter_map(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
            .collect())
    }

    /// Append the row for `date`; returns false when it was already recorded
    pub fn append(&self, date: NaiveDate, archetypes: &ObservationCount, alignment: &ObservationCount) -> CycleResult<bool> {
        if self.recorded_dates()?.contains(&date) {
            debug!("Metrics row for {} already present", date);
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CycleError::storage(parent, e))?;
        }

        let needs_header = !self.path.exists();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CycleError::storage(&self.path, e))?;

        let mut row = vec![date.format("%Y-%m-%d").to_string()];
        row.extend(ARCHETYPES.iter().map(|a| archetypes.get(a).to_string()));
        row.extend(ALIGNMENTS.iter().map(|a| alignment.get(a).to_string()));

        let mut out = String::new();
        if needs_header {
            out.push_str(&Self::header());
            out.push('\n');
        }
        out.push_str(&row.join(","));
        out.push('\n');

        file.write_all(out.as_bytes())
            .map_err(|e| CycleError::storage(&self.path, e))?;
        info!("Appended metrics row for {} -> {}", date, self.path.display());
        Ok(true)
    }
}
