//! History Store
//!
//! Persistence sink for sentiment observations, trades and portfolio
//! snapshots, plus the read side used by the query API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::{PortfolioSnapshot, SentimentRecord, TradeRecord};

/// Persistence trait
///
/// Writes are fire-and-forget from the agent's point of view: a failed
/// write is logged and the cycle carries on.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn put_sentiment(&self, record: SentimentRecord) -> Result<()>;

    async fn put_trade(&self, record: TradeRecord) -> Result<()>;

    async fn put_portfolio_snapshot(&self, snapshot: PortfolioSnapshot) -> Result<()>;

    /// Most recent score for an asset
    async fn latest_sentiment(&self, asset: &str) -> Result<Option<SentimentRecord>>;

    /// Newest-first scores for an asset, at most `limit`
    async fn recent_sentiment(&self, asset: &str, limit: usize) -> Result<Vec<SentimentRecord>>;

    /// Scores recorded at or after `since`, oldest first
    async fn sentiment_history(&self, asset: &str, since: DateTime<Utc>) -> Result<Vec<SentimentRecord>>;

    async fn latest_portfolio(&self) -> Result<Option<PortfolioSnapshot>>;

    /// Newest-first trades, at most `limit`
    async fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>>;
}

/// Records kept per sentiment series, and for trades and snapshots each
pub const DEFAULT_RETENTION: usize = 10_000;

/// In-memory history store (for development/testing)
///
/// Bounded: past `retention` records the oldest in each collection go.
pub struct MemoryHistoryStore {
    sentiments: RwLock<HashMap<String, Vec<SentimentRecord>>>,
    trades: RwLock<Vec<TradeRecord>>,
    snapshots: RwLock<Vec<PortfolioSnapshot>>,
    retention: usize,
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            sentiments: RwLock::new(HashMap::new()),
            trades: RwLock::new(Vec::new()),
            snapshots: RwLock::new(Vec::new()),
            retention: DEFAULT_RETENTION,
        }
    }

    /// Cap each collection at `retention` records (minimum 1)
    #[must_use]
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub async fn trade_count(&self) -> usize {
        self.trades.read().await.len()
    }

    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn put_sentiment(&self, record: SentimentRecord) -> Result<()> {
        let mut sentiments = self.sentiments.write().await;
        let series = sentiments.entry(record.asset.clone()).or_default();
        // Keep each series ordered by timestamp even if writes arrive late
        let at = series.partition_point(|r| r.timestamp <= record.timestamp);
        series.insert(at, record);
        trim_front(series, self.retention);
        Ok(())
    }

    async fn put_trade(&self, record: TradeRecord) -> Result<()> {
        let mut trades = self.trades.write().await;
        trades.push(record);
        trim_front(&mut *trades, self.retention);
        Ok(())
    }

    async fn put_portfolio_snapshot(&self, snapshot: PortfolioSnapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.push(snapshot);
        trim_front(&mut *snapshots, self.retention);
        Ok(())
    }

    async fn latest_sentiment(&self, asset: &str) -> Result<Option<SentimentRecord>> {
        let sentiments = self.sentiments.read().await;
        Ok(sentiments.get(asset).and_then(|series| series.last().cloned()))
    }

    async fn recent_sentiment(&self, asset: &str, limit: usize) -> Result<Vec<SentimentRecord>> {
        let sentiments = self.sentiments.read().await;
        Ok(sentiments
            .get(asset)
            .map(|series| series.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn sentiment_history(&self, asset: &str, since: DateTime<Utc>) -> Result<Vec<SentimentRecord>> {
        let sentiments = self.sentiments.read().await;
        Ok(sentiments
            .get(asset)
            .map(|series| {
                series
                    .iter()
                    .filter(|r| r.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn latest_portfolio(&self) -> Result<Option<PortfolioSnapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.iter().max_by_key(|s| s.timestamp).cloned())
    }

    async fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        let trades = self.trades.read().await;
        let mut result: Vec<_> = trades.clone();

        // Sort by timestamp descending
        result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        result.truncate(limit);

        Ok(result)
    }
}

/// Drop the oldest entries so at most `keep` remain
fn trim_front<T>(items: &mut Vec<T>, keep: usize) {
    if items.len() > keep {
        let excess = items.len() - keep;
        items.drain(..excess);
    }
}
