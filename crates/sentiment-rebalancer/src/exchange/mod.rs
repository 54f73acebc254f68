//! Exchange Integration
//!
//! Price feeds and trade execution sinks the rebalance agent talks to.

mod coingecko;
mod executor;
mod mock;

pub use coingecko::{coingecko_id, parse_simple_price, CoinGeckoConfig, CoinGeckoPriceFeed};
pub use executor::{LedgerEntry, SimulatedChainExecutor, TradeExecutor};
pub use mock::MockPriceFeed;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::{RebalanceError, Result};
use crate::model::{normalize_symbol, PriceQuote};

/// Price feed trait (Strategy pattern)
///
/// Implement this per data vendor. Assets the feed cannot quote are simply
/// absent from the returned map.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Current unit prices for the given symbols
    async fn get_prices(&self, assets: &[String]) -> Result<PriceQuote>;

    /// Price for a single symbol
    async fn get_price(&self, asset: &str) -> Result<Decimal> {
        let symbol = normalize_symbol(asset);
        let quote = self.get_prices(std::slice::from_ref(&symbol)).await?;
        quote
            .get(&symbol)
            .copied()
            .ok_or(RebalanceError::UnsupportedAsset(symbol))
    }

    /// Check if the feed is reachable
    async fn health_check(&self) -> bool {
        true
    }

    /// Feed name
    fn name(&self) -> &str;
}
