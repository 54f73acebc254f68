//! Sentiment Sample Sources
//!
//! Where the scorer's text corpus comes from.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::model::{normalize_symbol, SentimentSample};

/// Data source trait
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Recent samples about an asset; empty when the source knows nothing
    async fn get_samples(&self, asset: &str) -> Result<Vec<SentimentSample>>;

    /// Source name
    fn name(&self) -> &str;
}

/// Fixed corpus, loaded once from JSON or built in code.
///
/// The JSON shape is an object keyed by symbol:
///
/// ```text
/// { "BTC": [ { "text": "...", "weight": 2.5 }, ... ], "ETH": [ ... ] }
/// ```
#[derive(Clone, Debug, Default)]
pub struct FixtureSampleSource {
    corpus: HashMap<String, Vec<SentimentSample>>,
}

impl FixtureSampleSource {
    pub fn new(corpus: HashMap<String, Vec<SentimentSample>>) -> Self {
        Self {
            corpus: corpus
                .into_iter()
                .map(|(asset, samples)| (normalize_symbol(&asset), samples))
                .collect(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let corpus: HashMap<String, Vec<SentimentSample>> = serde_json::from_str(json)?;
        Ok(Self::new(corpus))
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        let source = Self::from_json_str(&json)?;
        tracing::info!(
            path = %path.as_ref().display(),
            assets = source.corpus.len(),
            "loaded sentiment sample corpus"
        );
        Ok(source)
    }

    #[must_use]
    pub fn with_samples(mut self, asset: &str, samples: Vec<SentimentSample>) -> Self {
        self.corpus.insert(normalize_symbol(asset), samples);
        self
    }

    pub fn assets(&self) -> impl Iterator<Item = &String> {
        self.corpus.keys()
    }
}

#[async_trait]
impl SampleSource for FixtureSampleSource {
    async fn get_samples(&self, asset: &str) -> Result<Vec<SentimentSample>> {
        Ok(self
            .corpus
            .get(&normalize_symbol(asset))
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "fixture"
    }
}
