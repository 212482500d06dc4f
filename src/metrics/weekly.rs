//! Weekly aggregate report
//!
//! The report is the hand-off point between aggregation and the archetype
//! correction: it is written once per cycle and the newest one is parsed
//! back into counts by the adaptation and metrics stages.

use chrono::NaiveDate;
use regex::Regex;

use super::aggregator::{aggregate, count_in_window, Extractor, ObservationWindow, ALIGNMENTS};
use crate::error::{CycleError, CycleResult};
use crate::memory::{ArtifactKind, ArtifactStore};
use crate::weights::{ObservationCount, ARCHETYPES};

/// How many resonance tags the report lists
const TOP_TAGS: usize = 5;

/// Aggregate counts for one observation window
#[derive(Debug, Clone)]
pub struct WeeklyReport {
    pub window: ObservationWindow,
    pub dreams: usize,
    pub archetypes: ObservationCount,
    pub tags: ObservationCount,
    pub alignment: ObservationCount,
}

impl WeeklyReport {
    /// Aggregate dreams and reflections inside `window`
    pub fn build(store: &ArtifactStore, window: ObservationWindow) -> CycleResult<Self> {
        let dreams = store
            .list(ArtifactKind::Dream)
            .map_err(|e| CycleError::storage(store.dir(ArtifactKind::Dream), e))?;
        let dream_count = count_in_window(&dreams, &window);
        if dream_count == 0 {
            return Err(CycleError::ArtifactNotFound(format!("no dreams in window {}", window)));
        }

        let reflections = store
            .list(ArtifactKind::Reflection)
            .map_err(|e| CycleError::storage(store.dir(ArtifactKind::Reflection), e))?;

        Ok(Self {
            window,
            dreams: dream_count,
            archetypes: aggregate(&dreams, &window, &Extractor::pattern(&ARCHETYPES)),
            tags: aggregate(&dreams, &window, &Extractor::label_line("Resonance Tag")),
            alignment: aggregate(&reflections, &window, &Extractor::Alignment),
        })
    }

    pub fn render(&self) -> String {
        let total = self.archetypes.total().max(1) as f64;
        let mut out = format!("# Weekly Report - {}\n\n", self.window);
        out.push_str(&format!("Dreams in window: {}\n\n", self.dreams));

        out.push_str("## Archetype Frequency\n\n");
        for (archetype, n) in self.archetypes.iter() {
            out.push_str(&format!(
                "* **{}**: {} ({:.0}%)\n",
                archetype,
                n,
                n as f64 / total * 100.0
            ));
        }

        out.push_str("\n## Top Resonance Tags\n\n");
        let top = self.tags.top(TOP_TAGS);
        if top.is_empty() {
            out.push_str("_No tags this week_\n");
        }
        for (tag, n) in top {
            out.push_str(&format!("* `{}`: {}\n", tag, n));
        }

        out.push_str("\n## Directive / Reflection Alignment\n\n");
        for (outcome, n) in self.alignment.iter() {
            out.push_str(&format!("* {}: {}\n", outcome, n));
        }
        out
    }
}

/// `* **Strategist**: 5` lines back into counts; missing keys count zero
pub fn parse_archetype_counts(text: &str) -> ObservationCount {
    parse_counts(text, &ARCHETYPES, |key| format!(r"\*\*{}\*\*:\s+(\d+)", regex::escape(key)))
}

/// `* Aligned: 3` lines back into counts; missing keys count zero
pub fn parse_alignment_counts(text: &str) -> ObservationCount {
    parse_counts(text, &ALIGNMENTS, |key| {
        format!(r"(?m)^\*\s+(?:\*\*)?{}(?:\*\*)?:\s+(\d+)", regex::escape(key))
    })
}

fn parse_counts(text: &str, keys: &[&str], pattern: impl Fn(&str) -> String) -> ObservationCount {
    let mut counts = ObservationCount::with_keys(keys);
    for key in keys {
        let Ok(re) = Regex::new(&pattern(key)) else {
            continue;
        };
        if let Some(n) = re
            .captures(text)
            .and_then(|caps| caps[1].parse::<u64>().ok())
        {
            counts.add(key, n);
        }
    }
    counts
}

/// Date of a report file, from its name
pub fn report_date(path: &std::path::Path) -> Option<NaiveDate> {
    crate::memory::DatedArtifact::from_path(path).map(|a| a.date)
}
