//! Rebalance Agent
//!
//! Drives one sentiment -> rebalance -> execute -> record cycle against the
//! configured collaborators.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::RebalancerConfig;
use crate::error::RebalanceError;
use crate::exchange::{PriceFeed, TradeExecutor};
use crate::model::{
    AmountUnit, Holdings, PortfolioSnapshot, PriceQuote, SentimentMap, SentimentRecord, TargetAllocation,
    TradeInstruction, TradeRecord,
};
use crate::sentiment::{build_scorer, Scorer};
use crate::source::SampleSource;
use crate::store::HistoryStore;
use crate::strategy::{RebalancePlan, RebalancePolicy, Rebalancer};

/// External services the agent talks to
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn SampleSource>,
    pub prices: Arc<dyn PriceFeed>,
    pub store: Arc<dyn HistoryStore>,
    pub executor: Arc<dyn TradeExecutor>,
}

/// Outcome of one cycle
#[derive(Clone, Debug, Serialize)]
pub struct CycleReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub sentiments: SentimentMap,
    pub plan: RebalancePlan,

    /// Trades the executor confirmed
    pub executed: Vec<TradeInstruction>,

    /// Trades the executor refused; not applied to holdings
    pub rejected: Vec<TradeInstruction>,

    /// Holdings after applying `executed`
    pub holdings: Holdings,

    /// Why the rebalance step produced nothing, if it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleReport {
    pub fn traded(&self) -> bool {
        !self.executed.is_empty()
    }
}

/// Cycle driver
///
/// Owns the scorer (which carries RNG state), so a cycle needs `&mut self`.
/// Callers serialize cycles by holding the agent behind a mutex.
pub struct RebalanceAgent {
    tracked_assets: Vec<String>,
    targets: TargetAllocation,
    rebalancer: Rebalancer,
    scorer: Box<dyn Scorer>,
    collaborators: Collaborators,
}

impl RebalanceAgent {
    pub fn new(
        tracked_assets: Vec<String>,
        targets: TargetAllocation,
        policy: RebalancePolicy,
        scorer: Box<dyn Scorer>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            tracked_assets,
            targets,
            rebalancer: Rebalancer::new(policy),
            scorer,
            collaborators,
        }
    }

    /// Build from configuration, constructing the configured scorer
    pub fn from_config(config: &RebalancerConfig, collaborators: Collaborators) -> Self {
        Self::new(
            config.tracked_assets.clone(),
            config.targets.clone(),
            config.policy,
            build_scorer(&config.scorer),
            collaborators,
        )
    }

    pub fn tracked_assets(&self) -> &[String] {
        &self.tracked_assets
    }

    pub const fn policy(&self) -> &RebalancePolicy {
        self.rebalancer.policy()
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    /// Run one full cycle against `holdings`.
    ///
    /// Collaborator failures are logged and replaced by defaults; the cycle
    /// itself never fails. The caller commits `report.holdings`.
    #[tracing::instrument(skip(self, holdings), fields(scorer = self.scorer.name()))]
    pub async fn run_cycle(&mut self, holdings: &Holdings) -> CycleReport {
        let started_at = Utc::now();
        let id = Uuid::new_v4();

        let sentiments = self.score_assets(started_at).await;

        let prices = if self.rebalancer.policy().requires_prices() {
            self.fetch_prices(holdings).await
        } else {
            PriceQuote::new()
        };

        let (plan, error) = match self
            .rebalancer
            .rebalance(holdings, &self.targets, &prices, &sentiments)
        {
            Ok(plan) => (plan, None),
            Err(RebalanceError::DivisionUndefined) => {
                tracing::warn!("portfolio value is zero, no trades this cycle");
                (RebalancePlan::empty(Decimal::ZERO), Some(RebalanceError::DivisionUndefined.to_string()))
            }
            Err(e) => {
                tracing::warn!("rebalance failed: {e}");
                (RebalancePlan::empty(Decimal::ZERO), Some(e.to_string()))
            }
        };

        let (executed, rejected) = self.execute(&plan).await;

        let next_holdings = holdings.with_trades(&executed);
        let snapshot = match self.rebalancer.policy().holdings_unit {
            AmountUnit::Value => PortfolioSnapshot::from_holdings(&next_holdings, Utc::now()),
            AmountUnit::Native => PortfolioSnapshot::from_native_holdings(&next_holdings, &prices, Utc::now()),
        };
        if let Err(e) = self.collaborators.store.put_portfolio_snapshot(snapshot).await {
            tracing::warn!("failed to store portfolio snapshot: {e}");
        }

        tracing::info!(
            cycle = %id,
            assets = sentiments.len(),
            planned = plan.len(),
            executed = executed.len(),
            rejected = rejected.len(),
            aborted = plan.aborted.is_some(),
            "rebalance cycle complete"
        );

        CycleReport {
            id,
            started_at,
            sentiments,
            plan,
            executed,
            rejected,
            holdings: next_holdings,
            error,
        }
    }

    async fn score_assets(&mut self, timestamp: DateTime<Utc>) -> SentimentMap {
        let mut sentiments = SentimentMap::new();

        for asset in &self.tracked_assets {
            let samples = match self.collaborators.source.get_samples(asset).await {
                Ok(samples) => samples,
                Err(e) => {
                    tracing::warn!(asset = %asset, "sample source failed, scoring empty corpus: {e}");
                    Vec::new()
                }
            };

            let score = self.scorer.score(asset, &samples);
            tracing::debug!(asset = %asset, samples = samples.len(), %score, "scored sentiment");

            let record = SentimentRecord::new(asset.clone(), score, timestamp);
            if let Err(e) = self.collaborators.store.put_sentiment(record).await {
                tracing::warn!(asset = %asset, "failed to store sentiment: {e}");
            }
            if !self.collaborators.executor.record_sentiment(asset, score).await {
                tracing::warn!(asset = %asset, "sentiment was not recorded by executor");
            }

            sentiments.insert(asset.clone(), score);
        }

        sentiments
    }

    /// Quotes for every tracked, targeted or held asset
    async fn fetch_prices(&self, holdings: &Holdings) -> PriceQuote {
        let mut assets = self.tracked_assets.clone();
        for asset in self.targets.assets().chain(holdings.assets()) {
            if !assets.contains(asset) {
                assets.push(asset.clone());
            }
        }

        match self.collaborators.prices.get_prices(&assets).await {
            Ok(quote) => quote,
            Err(e) => {
                tracing::warn!(feed = self.collaborators.prices.name(), "price fetch failed: {e}");
                PriceQuote::new()
            }
        }
    }

    async fn execute(&self, plan: &RebalancePlan) -> (Vec<TradeInstruction>, Vec<TradeInstruction>) {
        let mut executed = Vec::new();
        let mut rejected = Vec::new();

        for trade in plan.trades.values() {
            if !self.collaborators.executor.submit_trade(trade).await {
                tracing::warn!(asset = %trade.asset, amount = %trade.amount, "trade was not confirmed");
                rejected.push(trade.clone());
                continue;
            }

            let record = TradeRecord::from_instruction(trade, Utc::now());
            if let Err(e) = self.collaborators.store.put_trade(record).await {
                tracing::warn!(asset = %trade.asset, "failed to store trade: {e}");
            }
            executed.push(trade.clone());
        }

        (executed, rejected)
    }
}
