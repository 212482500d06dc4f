//! Ordered category maps
//!
//! Weight files are human-edited and diffed across cycles, so both maps
//! keep insertion order instead of sorting keys.

use serde::{Deserialize, Serialize};

/// Closed interval every weight of a domain must stay within
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClampRange {
    pub min: f64,
    pub max: f64,
}

impl ClampRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl std::fmt::Display for ClampRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Round to three decimal places, the precision weights are stored at
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Append-only, insertion-ordered mapping of category -> weight
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightMap {
    entries: Vec<(String, f64)>,
}

impl WeightMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key of `keys` at the same weight, in the given order
    pub fn uniform<S: AsRef<str>>(keys: &[S], weight: f64) -> Self {
        let mut map = Self::new();
        for key in keys {
            map.set(key.as_ref(), weight);
        }
        map
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, w)| *w)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Update an existing key in place or append a new one
    pub fn set(&mut self, key: &str, weight: f64) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = weight,
            None => self.entries.push((key.to_string(), weight)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, w)| (k.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-key changes from `self` to `next`, including keys `next` added
    pub fn diff(&self, next: &WeightMap) -> Vec<WeightChange> {
        next.iter()
            .filter_map(|(key, after)| {
                let before = self.get(key);
                if before == Some(after) {
                    None
                } else {
                    Some(WeightChange {
                        key: key.to_string(),
                        before,
                        after,
                    })
                }
            })
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for WeightMap {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut map = WeightMap::new();
        for (key, weight) in iter {
            map.set(&key.into(), weight);
        }
        map
    }
}

impl Serialize for WeightMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, weight) in &self.entries {
            map.serialize_entry(key, weight)?;
        }
        map.end()
    }
}

/// A single weight movement, for logs and dry runs
#[derive(Debug, Clone, PartialEq)]
pub struct WeightChange {
    pub key: String,
    pub before: Option<f64>,
    pub after: f64,
}

impl std::fmt::Display for WeightChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.before {
            Some(before) => write!(f, "{}: {} -> {}", self.key, before, self.after),
            None => write!(f, "{}: (new) -> {}", self.key, self.after),
        }
    }
}

/// Insertion-ordered occurrence counts per category
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservationCount {
    entries: Vec<(String, u64)>,
}

impl ObservationCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero counts for every tracked key, so absent categories still show up
    pub fn with_keys<S: AsRef<str>>(keys: &[S]) -> Self {
        Self {
            entries: keys.iter().map(|k| (k.as_ref().to_string(), 0)).collect(),
        }
    }

    pub fn add(&mut self, key: &str, n: u64) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 += n,
            None => self.entries.push((key.to_string(), n)),
        }
    }

    pub fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    pub fn get(&self, key: &str) -> u64 {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, n)| n).sum()
    }

    /// Keys with a non-zero count, in insertion order
    pub fn observed(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(k, n)| (k.as_str(), *n))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), *n))
    }

    /// Keys sorted by descending count, ties kept in insertion order
    pub fn top(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self.observed().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }

    pub fn merge(&mut self, other: &ObservationCount) {
        for (key, n) in other.iter() {
            self.add(key, n);
        }
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for ObservationCount {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut counts = ObservationCount::new();
        for (key, n) in iter {
            counts.add(&key.into(), n);
        }
        counts
    }
}
