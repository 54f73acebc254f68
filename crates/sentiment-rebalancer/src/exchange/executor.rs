//! Trade Execution
//!
//! Sink for rebalance trades and on-chain sentiment records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::{SentimentScore, TradeInstruction};

/// Trade execution trait
///
/// Implementations report confirmation as a plain boolean. Callers treat
/// `false` as "not executed" and do not retry within a cycle.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    /// Submit one trade
    async fn submit_trade(&self, trade: &TradeInstruction) -> bool;

    /// Publish a sentiment score alongside trade history
    async fn record_sentiment(&self, _asset: &str, _score: SentimentScore) -> bool {
        true
    }

    /// Executor name
    fn name(&self) -> &str;
}

/// One entry of the simulated ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEntry {
    Trade {
        trade: TradeInstruction,
        timestamp: DateTime<Utc>,
    },
    Sentiment {
        asset: String,
        score: SentimentScore,
        timestamp: DateTime<Utc>,
    },
}

/// Entries kept in memory before the oldest are dropped
pub const DEFAULT_LEDGER_CAPACITY: usize = 10_000;

/// Executor that confirms everything and keeps a local ledger.
///
/// Stands in for a smart-contract call. The in-memory ledger holds the most
/// recent entries only; the optional JSON-lines journal keeps everything.
pub struct SimulatedChainExecutor {
    ledger: RwLock<VecDeque<LedgerEntry>>,
    capacity: usize,
    journal: Option<PathBuf>,
    rejected_assets: Vec<String>,
}

impl Default for SimulatedChainExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedChainExecutor {
    pub fn new() -> Self {
        Self {
            ledger: RwLock::new(VecDeque::new()),
            capacity: DEFAULT_LEDGER_CAPACITY,
            journal: None,
            rejected_assets: Vec::new(),
        }
    }

    /// Append entries to a JSON-lines file as well
    #[must_use]
    pub fn with_journal(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal = Some(path.into());
        self
    }

    /// Keep at most `capacity` ledger entries in memory (minimum 1)
    #[must_use]
    pub fn with_ledger_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Reject every trade for this asset (failure simulation)
    #[must_use]
    pub fn rejecting(mut self, asset: &str) -> Self {
        self.rejected_assets.push(crate::model::normalize_symbol(asset));
        self
    }

    /// Retained entries, oldest first
    pub async fn ledger(&self) -> Vec<LedgerEntry> {
        self.ledger.read().await.iter().cloned().collect()
    }

    /// Retained confirmed trades, oldest first
    pub async fn trades(&self) -> Vec<TradeInstruction> {
        self.ledger
            .read()
            .await
            .iter()
            .filter_map(|entry| match entry {
                LedgerEntry::Trade { trade, .. } => Some(trade.clone()),
                LedgerEntry::Sentiment { .. } => None,
            })
            .collect()
    }

    async fn append(&self, entry: LedgerEntry) {
        if let Some(path) = &self.journal {
            if let Err(e) = write_journal_line(path, &entry).await {
                tracing::warn!(path = %path.display(), "failed to append trade journal: {e}");
            }
        }

        let mut ledger = self.ledger.write().await;
        ledger.push_back(entry);
        while ledger.len() > self.capacity {
            ledger.pop_front();
        }
    }
}

async fn write_journal_line(path: &Path, entry: &LedgerEntry) -> Result<()> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}

#[async_trait]
impl TradeExecutor for SimulatedChainExecutor {
    async fn submit_trade(&self, trade: &TradeInstruction) -> bool {
        if self.rejected_assets.contains(&trade.asset) {
            tracing::warn!(asset = %trade.asset, "simulated executor rejected trade");
            return false;
        }

        tracing::info!(
            asset = %trade.asset,
            side = trade.side().as_str(),
            amount = %trade.abs_amount(),
            unit = %trade.unit,
            sentiment = %trade.sentiment,
            "executing trade"
        );

        self.append(LedgerEntry::Trade {
            trade: trade.clone(),
            timestamp: Utc::now(),
        })
        .await;
        true
    }

    async fn record_sentiment(&self, asset: &str, score: SentimentScore) -> bool {
        tracing::debug!(asset, %score, "recording sentiment on chain");
        self.append(LedgerEntry::Sentiment {
            asset: asset.to_string(),
            score,
            timestamp: Utc::now(),
        })
        .await;
        true
    }

    fn name(&self) -> &str {
        "SimulatedChain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AmountUnit;
    use rust_decimal_macros::dec;

    fn trade(asset: &str, amount: rust_decimal::Decimal) -> TradeInstruction {
        TradeInstruction::new(asset, amount, AmountUnit::Value, SentimentScore::new(dec!(0.4)))
    }

    #[tokio::test]
    async fn test_confirms_and_records() {
        let executor = SimulatedChainExecutor::new();

        assert!(executor.submit_trade(&trade("BTC", dec!(-120))).await);
        assert!(executor.record_sentiment("BTC", SentimentScore::new(dec!(0.4))).await);

        assert_eq!(executor.ledger().await.len(), 2);
        assert_eq!(executor.trades().await, vec![trade("BTC", dec!(-120))]);
    }

    #[tokio::test]
    async fn test_rejecting_asset() {
        let executor = SimulatedChainExecutor::new().rejecting("sol");

        assert!(!executor.submit_trade(&trade("SOL", dec!(50))).await);
        assert!(executor.submit_trade(&trade("ETH", dec!(50))).await);
        assert_eq!(executor.trades().await.len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_drops_oldest_past_capacity() {
        let executor = SimulatedChainExecutor::new().with_ledger_capacity(3);

        for amount in [dec!(10), dec!(20), dec!(30), dec!(40), dec!(50)] {
            assert!(executor.submit_trade(&trade("ETH", amount)).await);
        }

        let amounts: Vec<_> = executor.trades().await.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![dec!(30), dec!(40), dec!(50)]);
    }

    #[tokio::test]
    async fn test_journal_lines() {
        let path = std::env::temp_dir().join(format!("rebalancer-journal-{}.jsonl", uuid::Uuid::new_v4()));
        let executor = SimulatedChainExecutor::new().with_journal(&path);

        executor.submit_trade(&trade("NEAR", dec!(75))).await;
        executor.record_sentiment("NEAR", SentimentScore::new(dec!(0.81))).await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "trade");
        assert_eq!(lines[1]["kind"], "sentiment");
        assert_eq!(lines[1]["asset"], "NEAR");

        let _ = tokio::fs::remove_file(&path).await;
    }
}
