//! Dated artifact files - one markdown file per stage per day
//!
//! Files live under `<memory>/<kind dir>/YYYY-MM-DD_<suffix>.md`. The date
//! prefix is the artifact's embedded date; the metrics window filters on
//! it rather than on file timestamps.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How far back from the end of a file an appended entry is checked for duplicates
const DEDUPE_TAIL_CHARS: usize = 600;

/// Kinds of artifact produced by the daily cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Journal,
    Dream,
    Reflection,
    Direction,
    WeeklyReport,
    /// Dream and directive merged for reading
    Output,
    CoreNode,
}

impl ArtifactKind {
    /// Directory under the memory root
    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactKind::Journal => "journal",
            ArtifactKind::Dream => "dreams",
            ArtifactKind::Reflection => "reflection",
            ArtifactKind::Direction => "direction",
            ArtifactKind::WeeklyReport => "weekly",
            ArtifactKind::Output => "output",
            ArtifactKind::CoreNode => "core_nodes",
        }
    }

    /// File name suffix after the date prefix
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactKind::Journal => "_journal.md",
            ArtifactKind::Dream => "_archetypal_dream.md",
            ArtifactKind::Reflection => "_reflection.md",
            ArtifactKind::Direction => "_direction.md",
            ArtifactKind::WeeklyReport => "_report.md",
            ArtifactKind::Output => "_output.md",
            ArtifactKind::CoreNode => "_core_node.md",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Journal => write!(f, "journal"),
            ArtifactKind::Dream => write!(f, "dream"),
            ArtifactKind::Reflection => write!(f, "reflection"),
            ArtifactKind::Direction => write!(f, "direction"),
            ArtifactKind::WeeklyReport => write!(f, "weekly report"),
            ArtifactKind::Output => write!(f, "daily output"),
            ArtifactKind::CoreNode => write!(f, "core node"),
        }
    }
}

/// An artifact file together with the date embedded in its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedArtifact {
    pub date: NaiveDate,
    pub path: PathBuf,
}

impl DatedArtifact {
    /// Parse the `YYYY-MM-DD` prefix of a file name
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let prefix = name.get(..10)?;
        let date = NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()?;
        Some(Self {
            date,
            path: path.to_path_buf(),
        })
    }
}

/// Read/write access to the artifact directories
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn with_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn dir(&self, kind: ArtifactKind) -> PathBuf {
        self.base_dir.join(kind.dir_name())
    }

    /// Path of the artifact of `kind` for `date`
    pub fn path_for(&self, kind: ArtifactKind, date: NaiveDate) -> PathBuf {
        self.dir(kind)
            .join(format!("{}{}", date.format("%Y-%m-%d"), kind.suffix()))
    }

    /// Directory for run reports and the metrics summary
    pub fn system_dir(&self) -> PathBuf {
        self.base_dir.join("system")
    }

    /// Write (or replace) the artifact for `date`, creating directories
    pub fn write(&self, kind: ArtifactKind, date: NaiveDate, contents: &str) -> Result<PathBuf> {
        let dir = self.dir(kind);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = self.path_for(kind, date);
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {} -> {}", kind, path.display());
        Ok(path)
    }

    /// Append `entry` to the artifact for `date`
    ///
    /// Returns `None` when the entry already sits in the tail of the file.
    pub fn append(&self, kind: ArtifactKind, date: NaiveDate, heading: &str, entry: &str) -> Result<Option<PathBuf>> {
        use std::io::Write;

        let path = self.path_for(kind, date);
        if let Ok(existing) = std::fs::read_to_string(&path) {
            let tail_start = existing
                .char_indices()
                .rev()
                .nth(DEDUPE_TAIL_CHARS)
                .map(|(i, _)| i)
                .unwrap_or(0);
            if existing[tail_start..].contains(entry.trim()) {
                debug!("Duplicate {} entry skipped", kind);
                return Ok(None);
            }
        }

        let dir = self.dir(kind);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        write!(file, "\n## {}\n\n{}\n", heading, entry.trim())
            .with_context(|| format!("Failed to append to {}", path.display()))?;
        Ok(Some(path))
    }

    /// All dated artifacts of `kind`, oldest first
    pub fn list(&self, kind: ArtifactKind) -> Result<Vec<DatedArtifact>> {
        let dir = self.dir(kind);
        let mut artifacts = Vec::new();
        if !dir.exists() {
            return Ok(artifacts);
        }

        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
        {
            let path = entry?.path();
            let matches_kind = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(kind.suffix()))
                .unwrap_or(false);
            if !matches_kind {
                continue;
            }
            if let Some(artifact) = DatedArtifact::from_path(&path) {
                artifacts.push(artifact);
            }
        }

        artifacts.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
        Ok(artifacts)
    }

    /// Most recent artifact of `kind`, if any exists
    pub fn latest(&self, kind: ArtifactKind) -> Result<Option<DatedArtifact>> {
        Ok(self.list(kind)?.pop())
    }

    /// Most recent artifact of `kind` dated strictly before `date`
    pub fn latest_before(&self, kind: ArtifactKind, date: NaiveDate) -> Result<Option<DatedArtifact>> {
        Ok(self
            .list(kind)?
            .into_iter()
            .filter(|a| a.date < date)
            .last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_path_layout() {
        let store = ArtifactStore::with_dir("/data/memory");
        assert_eq!(
            store.path_for(ArtifactKind::Dream, date("2025-01-03")),
            PathBuf::from("/data/memory/dreams/2025-01-03_archetypal_dream.md")
        );
        assert_eq!(
            store.path_for(ArtifactKind::WeeklyReport, date("2025-01-07")),
            PathBuf::from("/data/memory/weekly/2025-01-07_report.md")
        );
    }

    #[test]
    fn test_list_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::with_dir(dir.path());

        assert!(store.latest(ArtifactKind::Dream).unwrap().is_none());

        store.write(ArtifactKind::Dream, date("2025-01-02"), "b").unwrap();
        store.write(ArtifactKind::Dream, date("2025-01-01"), "a").unwrap();
        store.write(ArtifactKind::Dream, date("2025-01-05"), "c").unwrap();
        // Not a dream, and not dated
        std::fs::write(store.dir(ArtifactKind::Dream).join("_latest_mood.txt"), "calm").unwrap();
        std::fs::write(store.dir(ArtifactKind::Dream).join("notes_archetypal_dream.md"), "x").unwrap();

        let listed = store.list(ArtifactKind::Dream).unwrap();
        let dates: Vec<NaiveDate> = listed.iter().map(|a| a.date).collect();
        assert_eq!(dates, vec![date("2025-01-01"), date("2025-01-02"), date("2025-01-05")]);

        let latest = store.latest(ArtifactKind::Dream).unwrap().unwrap();
        assert_eq!(latest.date, date("2025-01-05"));

        let before = store.latest_before(ArtifactKind::Dream, date("2025-01-05")).unwrap().unwrap();
        assert_eq!(before.date, date("2025-01-02"));
    }

    #[test]
    fn test_kinds_do_not_mix() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::with_dir(dir.path());
        store.write(ArtifactKind::Reflection, date("2025-02-01"), "r").unwrap();

        assert!(store.list(ArtifactKind::Direction).unwrap().is_empty());
        assert_eq!(store.list(ArtifactKind::Reflection).unwrap().len(), 1);
    }

    #[test]
    fn test_dated_artifact_rejects_undated_names() {
        assert!(DatedArtifact::from_path(Path::new("/x/readme.md")).is_none());
        assert!(DatedArtifact::from_path(Path::new("/x/2025-13-01_report.md")).is_none());
        let parsed = DatedArtifact::from_path(Path::new("/x/2025-03-09_report.md")).unwrap();
        assert_eq!(parsed.date, date("2025-03-09"));
    }

    #[test]
    fn test_append_skips_duplicate_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::with_dir(dir.path());
        let day = date("2025-01-04");

        let first = store.append(ArtifactKind::Journal, day, "Entry: 08:00", "Mood: Calm · Open\n\nQuiet morning.").unwrap();
        assert!(first.is_some());
        let dup = store.append(ArtifactKind::Journal, day, "Entry: 09:00", "Mood: Calm · Open\n\nQuiet morning.").unwrap();
        assert!(dup.is_none());
        store.append(ArtifactKind::Journal, day, "Entry: 21:00", "Evening, restless.").unwrap();

        let text = std::fs::read_to_string(store.path_for(ArtifactKind::Journal, day)).unwrap();
        assert_eq!(text.matches("## Entry:").count(), 2);
        assert!(text.ends_with("Evening, restless.\n"));
    }
}
