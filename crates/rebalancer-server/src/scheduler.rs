//! Scheduled Rebalance Cycles

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::state::AppState;

/// Run a cycle every `interval`, starting after the first full interval.
///
/// Ticks that fall due while a cycle (scheduled or on-demand) is still
/// running are skipped rather than queued.
pub fn spawn(state: AppState, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let mut desk = state.desk.lock().await;
            let report = desk.run_cycle().await;
            tracing::info!(
                cycle = %report.id,
                executed = report.executed.len(),
                total = %report.holdings.total(),
                "Scheduled rebalance finished"
            );
        }
    })
}
