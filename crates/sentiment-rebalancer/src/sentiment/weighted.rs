//! Weighted Sample Scorer
//!
//! Averages a perturbed reading per sample, weighted by engagement.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;

use super::Scorer;
use crate::model::{SentimentSample, SentimentScore};

/// Half-width of the per-sample perturbation around the 0.5 midpoint
pub const DEFAULT_SPREAD: f64 = 0.25;

/// Widest accepted spread; readings past it clamp to the score range anyway
pub const MAX_SPREAD: f64 = 1.5;

const MIDPOINT: f64 = 0.5;

/// Weighted-average scorer.
///
/// Each sample reads as `0.5 ± spread`, so with the default spread the output
/// lies in [0.25, 0.75]. It is not rescaled to the full [-1, 1] range.
pub struct WeightedSampleScorer<R = StdRng> {
    rng: R,
    spread: f64,

    /// Score a random subset of at most this many samples
    sample_limit: Option<usize>,
}

impl WeightedSampleScorer<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> WeightedSampleScorer<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            spread: DEFAULT_SPREAD,
            sample_limit: None,
        }
    }

    #[must_use]
    pub fn with_spread(mut self, spread: f64) -> Self {
        if spread.is_finite() {
            self.spread = spread.abs().min(MAX_SPREAD);
        } else {
            tracing::warn!(spread, "ignoring non-finite spread, keeping {}", self.spread);
        }
        self
    }

    #[must_use]
    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = Some(limit);
        self
    }

    fn reading(&mut self) -> Decimal {
        let offset = self.rng.random_range(-self.spread..=self.spread);
        Decimal::from_f64(MIDPOINT + offset).unwrap_or(dec!(0.5))
    }
}

impl<R: Rng + Send + Sync> Scorer for WeightedSampleScorer<R> {
    fn score(&mut self, asset: &str, samples: &[SentimentSample]) -> SentimentScore {
        let selected: Vec<&SentimentSample> = match self.sample_limit {
            Some(limit) if limit < samples.len() => {
                samples.choose_multiple(&mut self.rng, limit).collect()
            }
            _ => samples.iter().collect(),
        };

        let weighted: Vec<&SentimentSample> = selected
            .into_iter()
            .filter(|s| s.weight > Decimal::ZERO)
            .collect();

        if weighted.is_empty() {
            tracing::debug!(asset, "no weighted samples, neutral score");
            return SentimentScore::NEUTRAL;
        }

        let total_weight: Decimal = weighted.iter().map(|s| s.weight).sum();
        let mut weighted_sum = Decimal::ZERO;
        for sample in weighted {
            weighted_sum += self.reading() * sample.weight;
        }

        SentimentScore::new(weighted_sum / total_weight).rounded()
    }

    fn name(&self) -> &'static str {
        "weighted"
    }
}
