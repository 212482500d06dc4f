//! Weighted Sampler - draws categories in proportion to their weight

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::map::WeightMap;

/// Weighted sampling with replacement over a `WeightMap`
pub struct WeightedSampler<R: Rng = StdRng> {
    rng: R,
}

impl WeightedSampler<StdRng> {
    /// Sampler seeded from the operating system
    pub fn new() -> Self {
        Self { rng: StdRng::from_os_rng() }
    }

    /// Reproducible sampler, for tests and dry runs
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Default for WeightedSampler<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> WeightedSampler<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// `k` independent draws; weights stay fixed across draws
    pub fn sample(&mut self, weights: &WeightMap, k: usize) -> Vec<String> {
        if weights.is_empty() || k == 0 {
            return Vec::new();
        }

        let keys: Vec<&str> = weights.keys().collect();
        let dist = match WeightedIndex::new(weights.iter().map(|(_, w)| w.max(0.0))) {
            Ok(dist) => dist,
            // All weights zero: fall back to a uniform pick
            Err(_) => {
                return (0..k)
                    .map(|_| keys[self.rng.random_range(0..keys.len())].to_string())
                    .collect();
            }
        };

        (0..k)
            .map(|_| keys[dist.sample(&mut self.rng)].to_string())
            .collect()
    }

    /// Single draw, `None` only for an empty map
    pub fn pick(&mut self, weights: &WeightMap) -> Option<String> {
        self.sample(weights, 1).into_iter().next()
    }
}
