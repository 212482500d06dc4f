//! Metrics Aggregator - counts categories across a window of artifacts
//!
//! Aggregation fails soft: an artifact that cannot be read contributes
//! nothing and the rest of the window is still counted.

use chrono::{Days, NaiveDate};
use regex::Regex;
use tracing::warn;

use crate::memory::DatedArtifact;
use crate::weights::ObservationCount;

/// Reflection outcomes tracked alongside archetypes
pub const ALIGNMENTS: [&str; 3] = ["Aligned", "Challenged", "Ignored"];

/// Inclusive date range artifacts must fall within
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ObservationWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days` days ending at `end`, both ends included
    ///
    /// A span reaching past the calendar's first date starts at `NaiveDate::MIN`.
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        let span = u64::from(days.max(1)) - 1;
        Self {
            start: end.checked_sub_days(Days::new(span)).unwrap_or(NaiveDate::MIN),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl std::fmt::Display for ObservationWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.start, self.end)
    }
}

/// How category labels are pulled out of an artifact's text
#[derive(Debug, Clone)]
pub enum Extractor {
    /// Case-insensitive mentions of each tracked category, every match counted
    Pattern { categories: Vec<String> },
    /// The first `<label>: a · b | c` line, each label counted once
    LabelLine { label: String },
    /// The reflection outcome, one per artifact
    Alignment,
}

impl Extractor {
    pub fn pattern<S: AsRef<str>>(categories: &[S]) -> Self {
        Extractor::Pattern {
            categories: categories.iter().map(|c| c.as_ref().to_string()).collect(),
        }
    }

    pub fn label_line(label: &str) -> Self {
        Extractor::LabelLine {
            label: label.to_string(),
        }
    }

    /// Counts contributed by one artifact's text
    pub fn extract(&self, text: &str) -> ObservationCount {
        match self {
            Extractor::Pattern { categories } => {
                let mut counts = ObservationCount::with_keys(categories);
                for category in categories {
                    if let Ok(re) = Regex::new(&format!("(?i){}", regex::escape(category))) {
                        counts.add(category, re.find_iter(text).count() as u64);
                    }
                }
                counts
            }
            Extractor::LabelLine { label } => {
                let mut counts = ObservationCount::new();
                for tag in extract_labels(text, label) {
                    counts.increment(&tag);
                }
                counts
            }
            Extractor::Alignment => {
                let mut counts = ObservationCount::with_keys(&ALIGNMENTS);
                counts.increment(classify_alignment(text));
                counts
            }
        }
    }

    /// Keys that should appear in the result even with a zero count
    fn tracked_keys(&self) -> Vec<String> {
        match self {
            Extractor::Pattern { categories } => categories.clone(),
            Extractor::LabelLine { .. } => Vec::new(),
            Extractor::Alignment => ALIGNMENTS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Labels from the first `<label>:` line, split on `·`, `|` and `,`
pub fn extract_labels(text: &str, label: &str) -> Vec<String> {
    let pattern = format!(r"(?im)^\s*{}\s*:\s*(.+)$", regex::escape(label));
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    let Some(caps) = re.captures(text) else {
        return Vec::new();
    };

    let mut labels: Vec<String> = Vec::new();
    for part in caps[1].split(['·', '|', ',']) {
        let tag = part.trim().trim_matches('*').trim();
        if !tag.is_empty() && !labels.iter().any(|l| l == tag) {
            labels.push(tag.to_string());
        }
    }
    labels
}

/// Reflection outcome from its `Alignment:` line, or a keyword fallback
pub fn classify_alignment(text: &str) -> &'static str {
    if let Some(value) = extract_labels(text, "Alignment").first() {
        if let Some(known) = ALIGNMENTS.iter().find(|a| a.eq_ignore_ascii_case(value)) {
            return known;
        }
    }

    let lower = text.to_lowercase();
    if ["aligned", "fulfilled", " met "].iter().any(|w| lower.contains(w)) {
        "Aligned"
    } else if lower.contains("challenge") {
        "Challenged"
    } else {
        "Ignored"
    }
}

/// Sum the counts of every artifact dated inside `window`
pub fn aggregate(artifacts: &[DatedArtifact], window: &ObservationWindow, extractor: &Extractor) -> ObservationCount {
    let mut total = ObservationCount::with_keys(&extractor.tracked_keys());
    for artifact in artifacts.iter().filter(|a| window.contains(a.date)) {
        match std::fs::read_to_string(&artifact.path) {
            Ok(text) => total.merge(&extractor.extract(&text)),
            Err(e) => warn!("Skipping unreadable artifact {}: {}", artifact.path.display(), e),
        }
    }
    total
}

/// Number of artifacts inside `window`
pub fn count_in_window(artifacts: &[DatedArtifact], window: &ObservationWindow) -> usize {
    artifacts.iter().filter(|a| window.contains(a.date)).count()
}
