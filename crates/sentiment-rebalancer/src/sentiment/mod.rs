//! Sentiment Scoring
//!
//! Pluggable scoring policies mapping a corpus of weighted samples (or a
//! configured per-asset baseline) to a score in [-1, 1].
//!
//! Both policies are stochastic. The random source is owned by the scorer and
//! injected at construction, so a seeded scorer is fully reproducible.

mod baseline;
mod weighted;

pub use baseline::{BaselineScorer, DEFAULT_JITTER};
pub use weighted::{WeightedSampleScorer, DEFAULT_SPREAD};

use serde::{Deserialize, Serialize};

use crate::config::ScorerConfig;
use crate::error::RebalanceError;
use crate::model::{SentimentSample, SentimentScore};

/// Scoring policy (Strategy pattern)
///
/// Implementations must return a value in [-1, 1] for every input and
/// `SentimentScore::NEUTRAL` when they have nothing to go on.
pub trait Scorer: Send + Sync {
    /// Score one asset from its sample corpus
    fn score(&mut self, asset: &str, samples: &[SentimentSample]) -> SentimentScore;

    /// Policy name for logs
    fn name(&self) -> &'static str;
}

/// Which scoring policy to deploy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    /// Weighted average of perturbed per-sample readings
    #[default]
    Weighted,
    /// Configured per-asset baseline plus jitter; ignores samples
    Baseline,
}

impl std::str::FromStr for ScorerKind {
    type Err = RebalanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weighted" | "samples" => Ok(Self::Weighted),
            "baseline" => Ok(Self::Baseline),
            other => Err(RebalanceError::Config(format!("unknown scorer '{other}'"))),
        }
    }
}

/// Build the configured scorer, seeded when a seed is given
pub fn build_scorer(config: &ScorerConfig) -> Box<dyn Scorer> {
    match config.kind {
        ScorerKind::Weighted => {
            let scorer = match config.seed {
                Some(seed) => WeightedSampleScorer::seeded(seed),
                None => WeightedSampleScorer::from_os_rng(),
            };
            let scorer = match config.sample_limit {
                Some(limit) => scorer.with_sample_limit(limit),
                None => scorer,
            };
            Box::new(scorer)
        }
        ScorerKind::Baseline => {
            let scorer = match config.seed {
                Some(seed) => BaselineScorer::seeded(seed),
                None => BaselineScorer::from_os_rng(),
            };
            Box::new(scorer.with_baselines(config.baselines.clone()))
        }
    }
}
