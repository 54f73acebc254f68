//! Baseline Scorer
//!
//! Configuration-driven scoring: a fixed per-asset baseline plus uniform
//! jitter. The sample corpus is ignored.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;

use super::Scorer;
use crate::model::{normalize_symbol, SentimentSample, SentimentScore};

/// Half-width of the uniform jitter added to the baseline
pub const DEFAULT_JITTER: f64 = 0.3;

/// Widest accepted jitter (the full score range)
pub const MAX_JITTER: f64 = 2.0;

pub struct BaselineScorer<R = StdRng> {
    rng: R,
    jitter: f64,
    baselines: HashMap<String, Decimal>,
}

impl BaselineScorer<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> BaselineScorer<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            jitter: DEFAULT_JITTER,
            baselines: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_baselines(mut self, baselines: HashMap<String, Decimal>) -> Self {
        self.baselines = baselines
            .into_iter()
            .map(|(asset, score)| (normalize_symbol(&asset), score))
            .collect();
        self
    }

    #[must_use]
    pub fn with_baseline(mut self, asset: &str, score: Decimal) -> Self {
        self.baselines.insert(normalize_symbol(asset), score);
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        if jitter.is_finite() {
            self.jitter = jitter.abs().min(MAX_JITTER);
        } else {
            tracing::warn!(jitter, "ignoring non-finite jitter, keeping {}", self.jitter);
        }
        self
    }
}

impl<R: Rng + Send + Sync> Scorer for BaselineScorer<R> {
    fn score(&mut self, asset: &str, _samples: &[SentimentSample]) -> SentimentScore {
        let Some(baseline) = self.baselines.get(asset).copied() else {
            tracing::debug!(asset, "no baseline configured, neutral score");
            return SentimentScore::NEUTRAL;
        };

        let jitter = self.rng.random_range(-self.jitter..=self.jitter);
        let jitter = Decimal::from_f64(jitter).unwrap_or(Decimal::ZERO);

        SentimentScore::new(baseline + jitter).rounded()
    }

    fn name(&self) -> &'static str {
        "baseline"
    }
}
