//! Mock Price Feed
//!
//! For testing and demo purposes. Returns realistic static prices.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use super::PriceFeed;
use crate::error::Result;
use crate::model::{normalize_symbol, PriceQuote};

/// Largest accepted variance; a quote never goes negative
pub const MAX_VARIANCE_PERCENT: f64 = 100.0;

/// Mock feed backed by a static price table
pub struct MockPriceFeed {
    /// Max ± percentage applied to every quote
    variance_percent: f64,
    rng: Mutex<StdRng>,

    /// Symbols the feed pretends not to know (outage simulation)
    unavailable: HashSet<String>,
}

impl Default for MockPriceFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self {
            variance_percent: 0.0,
            rng: Mutex::new(StdRng::from_os_rng()),
            unavailable: HashSet::new(),
        }
    }

    /// Create with price variance drawn from the given RNG.
    ///
    /// A non-finite variance disables it; anything wider than
    /// `MAX_VARIANCE_PERCENT` is capped.
    pub fn with_variance(variance_percent: f64, rng: StdRng) -> Self {
        let variance_percent = if variance_percent.is_finite() {
            variance_percent.abs().min(MAX_VARIANCE_PERCENT)
        } else {
            tracing::warn!(variance_percent, "ignoring non-finite price variance");
            0.0
        };

        Self {
            variance_percent,
            rng: Mutex::new(rng),
            unavailable: HashSet::new(),
        }
    }

    /// Drop a symbol from every quote
    #[must_use]
    pub fn without(mut self, symbol: &str) -> Self {
        self.unavailable.insert(normalize_symbol(symbol));
        self
    }

    /// Static USD price for a symbol
    fn base_price(symbol: &str) -> Option<Decimal> {
        let price = match symbol {
            "BTC" => dec!(97500),
            "ETH" => dec!(3450),
            "SOL" => dec!(195),
            "NEAR" => dec!(5.40),
            "ADA" => dec!(0.95),
            "DOT" => dec!(7.20),
            "BNB" => dec!(705),
            "XRP" => dec!(2.35),
            "LINK" => dec!(24.50),
            "AVAX" => dec!(42.00),
            "ATOM" => dec!(9.80),
            "DOGE" => dec!(0.38),
            _ => return None,
        };
        Some(price)
    }

    fn quote(&self, symbol: &str) -> Option<Decimal> {
        if self.unavailable.contains(symbol) {
            return None;
        }
        let base = Self::base_price(symbol)?;

        if self.variance_percent > 0.0 {
            let offset = self
                .rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .random_range(-self.variance_percent..=self.variance_percent);
            let factor = Decimal::from_f64(1.0 + offset / 100.0).unwrap_or(Decimal::ONE);
            Some((base * factor).round_dp(8))
        } else {
            Some(base)
        }
    }
}

#[async_trait]
impl PriceFeed for MockPriceFeed {
    async fn get_prices(&self, assets: &[String]) -> Result<PriceQuote> {
        let quote = assets
            .iter()
            .map(|asset| normalize_symbol(asset))
            .filter_map(|symbol| self.quote(&symbol).map(|price| (symbol, price)))
            .collect();
        Ok(quote)
    }

    fn name(&self) -> &str {
        "MockPriceFeed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RebalanceError;

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_mock_prices() {
        let feed = MockPriceFeed::new();

        let quote = feed.get_prices(&symbols(&["BTC", "near"])).await.unwrap();
        assert_eq!(quote.get("BTC"), Some(&dec!(97500)));
        assert_eq!(quote.get("NEAR"), Some(&dec!(5.40)));
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_absent() {
        let feed = MockPriceFeed::new();
        let quote = feed.get_prices(&symbols(&["BTC", "NOTREAL"])).await.unwrap();
        assert_eq!(quote.len(), 1);

        let single = feed.get_price("NOTREAL").await;
        assert!(matches!(single, Err(RebalanceError::UnsupportedAsset(_))));
    }

    #[tokio::test]
    async fn test_without_simulates_gap() {
        let feed = MockPriceFeed::new().without("sol");
        let quote = feed.get_prices(&symbols(&["BTC", "SOL"])).await.unwrap();
        assert!(quote.contains_key("BTC"));
        assert!(!quote.contains_key("SOL"));
    }

    #[tokio::test]
    async fn test_variance_stays_in_band() {
        let feed = MockPriceFeed::with_variance(5.0, StdRng::seed_from_u64(17));
        for _ in 0..50 {
            let price = feed.get_price("ETH").await.unwrap();
            assert!(price >= dec!(3277.5) && price <= dec!(3622.5), "{price}");
        }
    }

    #[tokio::test]
    async fn test_non_finite_variance_quotes_base_price() {
        let feed = MockPriceFeed::with_variance(f64::NAN, StdRng::seed_from_u64(17));
        assert_eq!(feed.get_price("BTC").await.unwrap(), dec!(97500));

        let feed = MockPriceFeed::with_variance(f64::INFINITY, StdRng::seed_from_u64(17));
        assert_eq!(feed.get_price("SOL").await.unwrap(), dec!(195));
    }

    #[tokio::test]
    async fn test_huge_variance_is_capped() {
        let feed = MockPriceFeed::with_variance(1e300, StdRng::seed_from_u64(5));
        for _ in 0..20 {
            let price = feed.get_price("ETH").await.unwrap();
            assert!(price >= Decimal::ZERO && price <= dec!(6900), "{price}");
        }
    }
}
