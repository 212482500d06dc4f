//! Observation metrics for the self-tuning loop
//!
//! - Window aggregation of dated artifacts into category counts
//! - The weekly report the archetype correction reads its counts from
//! - The CSV summary consumed by external charting

pub mod aggregator;
pub mod summary;
pub mod weekly;

pub use aggregator::{aggregate, classify_alignment, extract_labels, Extractor, ObservationWindow, ALIGNMENTS};
pub use summary::MetricsSummary;
pub use weekly::{parse_alignment_counts, parse_archetype_counts, WeeklyReport};
