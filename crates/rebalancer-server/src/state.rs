//! Application State

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sentiment_rebalancer::{
    store::HistoryStore, CycleReport, Holdings, PortfolioSnapshot, RebalanceAgent, RebalancerConfig,
};
use tokio::sync::Mutex;

/// Agent plus the holdings it manages.
///
/// Lives behind one mutex so scheduled and on-demand cycles never overlap.
pub struct Desk {
    agent: RebalanceAgent,
    holdings: Holdings,
    cycles: Arc<AtomicU64>,
}

impl Desk {
    pub fn new(agent: RebalanceAgent, holdings: Holdings) -> Self {
        Self {
            agent,
            holdings,
            cycles: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run one cycle and commit the resulting holdings
    pub async fn run_cycle(&mut self) -> CycleReport {
        let report = self.agent.run_cycle(&self.holdings).await;
        self.holdings = report.holdings.clone();
        self.cycles.fetch_add(1, Ordering::Relaxed);
        report
    }

    pub const fn holdings(&self) -> &Holdings {
        &self.holdings
    }

    /// Unpriced snapshot of the live holdings, in the policy's holdings unit
    pub fn snapshot(&self, timestamp: DateTime<Utc>) -> PortfolioSnapshot {
        PortfolioSnapshot::from_amounts(&self.holdings, self.agent.policy().holdings_unit, timestamp)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Completed-cycle counter, readable without taking the desk lock
    pub fn cycle_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.cycles)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Cycle driver and current holdings
    pub desk: Arc<Mutex<Desk>>,

    /// Completed cycles, shared with the desk
    pub cycles: Arc<AtomicU64>,

    /// History store for the query API (same instance the agent writes to)
    pub store: Arc<dyn HistoryStore>,

    /// Effective configuration
    pub config: Arc<RebalancerConfig>,
}

impl AppState {
    pub fn new(desk: Desk, store: Arc<dyn HistoryStore>, config: RebalancerConfig) -> Self {
        Self {
            cycles: desk.cycle_counter(),
            desk: Arc::new(Mutex::new(desk)),
            store,
            config: Arc::new(config),
        }
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sentiment_rebalancer::{
        exchange::{MockPriceFeed, SimulatedChainExecutor},
        source::FixtureSampleSource,
        store::MemoryHistoryStore,
        AmountUnit, Collaborators,
    };

    fn desk(config: &RebalancerConfig, store: Arc<MemoryHistoryStore>) -> Desk {
        let source = FixtureSampleSource::from_json_str(include_str!("../fixtures/samples.json")).unwrap();
        let agent = RebalanceAgent::from_config(
            config,
            Collaborators {
                source: Arc::new(source),
                prices: Arc::new(MockPriceFeed::new()),
                store,
                executor: Arc::new(SimulatedChainExecutor::new()),
            },
        );
        Desk::new(agent, config.initial_holdings.clone())
    }

    fn seeded_config() -> RebalancerConfig {
        RebalancerConfig::from_lookup(|key| match key {
            "SENTIMENT_SEED" => Some("7".into()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_desk_commits_holdings_from_fixture_corpus() {
        let config = seeded_config();
        let store = Arc::new(MemoryHistoryStore::new());
        let mut desk = desk(&config, store.clone());

        let report = desk.run_cycle().await;

        assert_eq!(desk.cycles(), 1);
        assert_eq!(desk.holdings(), &report.holdings);
        assert_eq!(report.sentiments.len(), 4);
        assert!(report.sentiments.values().all(|s| s.value() >= dec!(0.25) && s.value() <= dec!(0.75)));

        let traded: rust_decimal::Decimal = report.executed.iter().map(|t| t.amount).sum();
        assert_eq!(report.holdings.total(), dec!(11000) + traded);
        assert_eq!(store.latest_portfolio().await.unwrap().unwrap().total_value, report.holdings.total());
    }

    #[tokio::test]
    async fn test_cycle_count_readable_while_desk_is_locked() {
        let config = seeded_config();
        let store = Arc::new(MemoryHistoryStore::new());
        let state = AppState::new(desk(&config, store.clone()), store, config);

        let mut guard = state.desk.lock().await;
        guard.run_cycle().await;

        // Lock still held by the cycle runner
        assert!(state.desk.try_lock().is_err());
        assert_eq!(state.cycles_run(), 1);
        drop(guard);
    }

    #[tokio::test]
    async fn test_price_aware_snapshot_reports_native_unit() {
        let config = RebalancerConfig::from_lookup(|key| match key {
            "REBALANCE_POLICY" => Some("price".into()),
            "INITIAL_HOLDINGS" => Some("BTC:0.1,ETH:1".into()),
            _ => None,
        })
        .unwrap();
        let desk = desk(&config, Arc::new(MemoryHistoryStore::new()));

        let snapshot = desk.snapshot(chrono::Utc::now());
        assert_eq!(snapshot.unit, AmountUnit::Native);
        assert_eq!(snapshot.total_value, dec!(1.1));
    }
}
