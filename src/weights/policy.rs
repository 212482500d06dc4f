//! Correction Policies - pure weight updates from observed frequencies
//!
//! Both policies push the next cycle toward balance: over-represented
//! categories lose weight, rare ones gain it. Neither touches storage.

use serde::Serialize;

use super::map::{round3, ClampRange, ObservationCount, WeightMap};
use crate::error::{CycleError, CycleResult};

/// Factor applied to a closed-universe key that was never observed
pub const UNOBSERVED_FACTOR: f64 = 2.0;

/// Additive nudge for open-universe keys absent from a cycle
pub const UNSEEN_BOOST: f64 = 0.1;

/// Minimum observations before the inverse-frequency policy will run
pub const MIN_TAG_OBSERVATIONS: u64 = 4;

/// Weight a key gets before its first correction
const SEED_WEIGHT: f64 = 1.0;

/// Strategy for turning counts into the next weight map
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectionPolicy {
    /// Closed universe where every key should get an equal share
    UniformTarget {
        universe: Vec<String>,
        range: ClampRange,
    },
    /// Open universe where each key is pushed toward the mean count
    InverseFrequency {
        range: ClampRange,
        unseen_boost: f64,
        min_observations: u64,
    },
}

impl CorrectionPolicy {
    pub fn uniform<S: AsRef<str>>(universe: &[S], range: ClampRange) -> Self {
        CorrectionPolicy::UniformTarget {
            universe: universe.iter().map(|k| k.as_ref().to_string()).collect(),
            range,
        }
    }

    pub fn inverse_frequency(range: ClampRange) -> Self {
        CorrectionPolicy::InverseFrequency {
            range,
            unseen_boost: UNSEEN_BOOST,
            min_observations: MIN_TAG_OBSERVATIONS,
        }
    }

    pub fn range(&self) -> ClampRange {
        match self {
            CorrectionPolicy::UniformTarget { range, .. } => *range,
            CorrectionPolicy::InverseFrequency { range, .. } => *range,
        }
    }

    /// Ideal proportion of observations for `key`, where one is defined
    pub fn target_share(&self, key: &str) -> Option<f64> {
        match self {
            CorrectionPolicy::UniformTarget { universe, .. } => universe
                .iter()
                .any(|k| k == key)
                .then(|| 1.0 / universe.len() as f64),
            CorrectionPolicy::InverseFrequency { .. } => None,
        }
    }

    /// Compute the next weight map; `weights` is left untouched
    pub fn correct(&self, weights: &WeightMap, counts: &ObservationCount) -> CycleResult<WeightMap> {
        match self {
            CorrectionPolicy::UniformTarget { universe, range } => {
                correct_uniform(universe, *range, weights, counts)
            }
            CorrectionPolicy::InverseFrequency {
                range,
                unseen_boost,
                min_observations,
            } => correct_inverse(*range, *unseen_boost, *min_observations, weights, counts),
        }
    }
}

fn correct_uniform(
    universe: &[String],
    range: ClampRange,
    weights: &WeightMap,
    counts: &ObservationCount,
) -> CycleResult<WeightMap> {
    let total: u64 = universe.iter().map(|k| counts.get(k)).sum();
    if total < universe.len() as u64 {
        return Err(CycleError::InsufficientData(format!(
            "{} observations across {} categories",
            total,
            universe.len()
        )));
    }

    let target = 1.0 / universe.len() as f64;
    let mut next = weights.clone();
    for key in universe {
        let actual = if total == 0 {
            target
        } else {
            counts.get(key) as f64 / total as f64
        };
        let factor = if actual > 0.0 { target / actual } else { UNOBSERVED_FACTOR };
        let current = weights.get(key).unwrap_or(SEED_WEIGHT);
        next.set(key, range.clamp(round3(current * factor)));
    }
    Ok(next)
}

fn correct_inverse(
    range: ClampRange,
    unseen_boost: f64,
    min_observations: u64,
    weights: &WeightMap,
    counts: &ObservationCount,
) -> CycleResult<WeightMap> {
    let total = counts.total();
    if total < min_observations {
        return Err(CycleError::InsufficientData(format!(
            "{} observations in window, need at least {}",
            total, min_observations
        )));
    }

    let observed: Vec<(&str, u64)> = counts.observed().collect();
    if observed.is_empty() {
        return Err(CycleError::InsufficientData("no categories observed".to_string()));
    }

    let avg = total as f64 / observed.len() as f64;
    let mut next = weights.clone();
    for (key, count) in &observed {
        let factor = avg / *count as f64;
        let current = weights.get(key).unwrap_or(SEED_WEIGHT);
        next.set(key, range.clamp(round3(current * factor)));
    }

    for (key, weight) in weights.iter() {
        if counts.get(key) == 0 {
            next.set(key, range.clamp(round3(weight + unseen_boost)));
        }
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::store::{ARCHETYPES, ARCHETYPE_RANGE, DEFAULT_TAGS, RESONANCE_RANGE};

    fn archetype_policy() -> CorrectionPolicy {
        CorrectionPolicy::uniform(&ARCHETYPES, ARCHETYPE_RANGE)
    }

    #[test]
    fn test_uniform_worked_example() {
        let weights = WeightMap::uniform(&ARCHETYPES, 1.0);
        let counts: ObservationCount = [("Strategist", 5), ("Idealist", 3), ("Shadow", 2), ("Child", 2)]
            .into_iter()
            .collect();

        let next = archetype_policy().correct(&weights, &counts).unwrap();
        assert_eq!(next.get("Strategist"), Some(0.6));
        assert_eq!(next.get("Idealist"), Some(1.0));
        assert_eq!(next.get("Shadow"), Some(1.5));
        assert_eq!(next.get("Child"), Some(1.5));
    }

    #[test]
    fn test_uniform_is_stable_under_uniform_counts() {
        let weights: WeightMap = [("Strategist", 0.8), ("Idealist", 1.7), ("Shadow", 2.2), ("Child", 0.4)]
            .into_iter()
            .collect();
        let counts: ObservationCount = ARCHETYPES.iter().map(|k| (*k, 3)).collect();

        let next = archetype_policy().correct(&weights, &counts).unwrap();
        assert_eq!(next, weights);
    }

    #[test]
    fn test_uniform_unobserved_key_doubles() {
        let weights = WeightMap::uniform(&ARCHETYPES, 1.0);
        let counts: ObservationCount = [("Strategist", 4), ("Idealist", 4), ("Shadow", 4)]
            .into_iter()
            .collect();

        let next = archetype_policy().correct(&weights, &counts).unwrap();
        assert_eq!(next.get("Child"), Some(2.0));
        assert_eq!(next.get("Strategist"), Some(0.75));
    }

    #[test]
    fn test_uniform_clamps_to_range() {
        let weights: WeightMap = [("Strategist", 0.35), ("Idealist", 2.9), ("Shadow", 1.0), ("Child", 1.0)]
            .into_iter()
            .collect();
        let counts: ObservationCount = [("Strategist", 20), ("Idealist", 0), ("Shadow", 2), ("Child", 2)]
            .into_iter()
            .collect();

        let next = archetype_policy().correct(&weights, &counts).unwrap();
        assert_eq!(next.get("Strategist"), Some(0.3));
        assert_eq!(next.get("Idealist"), Some(3.0));
    }

    #[test]
    fn test_uniform_refuses_fewer_observations_than_categories() {
        let weights = WeightMap::uniform(&ARCHETYPES, 1.0);
        let counts: ObservationCount = [("Strategist", 2), ("Shadow", 1)].into_iter().collect();

        let err = archetype_policy().correct(&weights, &counts).unwrap_err();
        assert!(matches!(err, CycleError::InsufficientData(_)));
    }

    #[test]
    fn test_inverse_frequency_balances_observed_tags() {
        let weights = WeightMap::uniform(&DEFAULT_TAGS, 1.0);
        let counts: ObservationCount = [("Curiosity", 4), ("Wonder", 2), ("Existence", 2)]
            .into_iter()
            .collect();

        let next = CorrectionPolicy::inverse_frequency(RESONANCE_RANGE)
            .correct(&weights, &counts)
            .unwrap();
        // avg = 8 / 3
        assert_eq!(next.get("Curiosity"), Some(0.667));
        assert_eq!(next.get("Wonder"), Some(1.333));
        assert_eq!(next.get("Existence"), Some(1.333));
        assert_eq!(next.get("Knowledge"), Some(1.1));
        assert_eq!(next.get("Responsibility"), Some(1.1));
    }

    #[test]
    fn test_inverse_frequency_seeds_new_tags() {
        let weights = WeightMap::uniform(&DEFAULT_TAGS, 1.0);
        let counts: ObservationCount = [("Longing", 1), ("Wonder", 3)].into_iter().collect();

        let next = CorrectionPolicy::inverse_frequency(RESONANCE_RANGE)
            .correct(&weights, &counts)
            .unwrap();
        assert_eq!(next.get("Longing"), Some(2.0));
        assert_eq!(next.get("Wonder"), Some(0.667));
        assert_eq!(next.keys().last(), Some("Longing"));
        assert_eq!(next.len(), DEFAULT_TAGS.len() + 1);
    }

    #[test]
    fn test_inverse_frequency_unseen_boost_respects_max() {
        let weights: WeightMap = [("Wonder", 1.95), ("Curiosity", 1.0)].into_iter().collect();
        let counts: ObservationCount = [("Curiosity", 4)].into_iter().collect();

        let next = CorrectionPolicy::inverse_frequency(RESONANCE_RANGE)
            .correct(&weights, &counts)
            .unwrap();
        assert_eq!(next.get("Wonder"), Some(2.0));
        assert_eq!(next.get("Curiosity"), Some(1.0));
    }

    #[test]
    fn test_inverse_frequency_requires_four_observations() {
        let weights = WeightMap::uniform(&DEFAULT_TAGS, 1.0);
        let counts: ObservationCount = [("Wonder", 3)].into_iter().collect();

        let err = CorrectionPolicy::inverse_frequency(RESONANCE_RANGE)
            .correct(&weights, &counts)
            .unwrap_err();
        assert!(matches!(err, CycleError::InsufficientData(_)));
    }

    #[test]
    fn test_correction_is_deterministic() {
        let weights = WeightMap::uniform(&DEFAULT_TAGS, 1.0);
        let counts: ObservationCount = [("Wonder", 3), ("Knowledge", 5)].into_iter().collect();
        let policy = CorrectionPolicy::inverse_frequency(RESONANCE_RANGE);

        assert_eq!(
            policy.correct(&weights, &counts).unwrap(),
            policy.correct(&weights, &counts).unwrap()
        );
    }

    #[test]
    fn test_target_share() {
        let policy = archetype_policy();
        assert_eq!(policy.target_share("Shadow"), Some(0.25));
        assert_eq!(policy.target_share("Wonder"), None);
        assert_eq!(CorrectionPolicy::inverse_frequency(RESONANCE_RANGE).target_share("Wonder"), None);
    }
}
