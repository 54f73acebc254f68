//! Domain Models
//!
//! Core data types for sentiment-weighted portfolio rebalancing.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{RebalanceError, Result};

/// Current unit price per asset, supplied fresh every cycle.
///
/// A missing key means the feed had no quote for that asset.
pub type PriceQuote = HashMap<String, Decimal>;

/// Sentiment score per asset for one cycle
pub type SentimentMap = BTreeMap<String, SentimentScore>;

/// Normalize a ticker symbol ("btc " -> "BTC")
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// A weighted text sample about an asset (tweet, headline, post)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentSample {
    /// Raw text
    pub text: String,

    /// Relative engagement / confidence (positive)
    pub weight: Decimal,
}

impl SentimentSample {
    pub fn new(text: impl Into<String>, weight: Decimal) -> Self {
        Self {
            text: text.into(),
            weight,
        }
    }
}

/// Crowd sentiment in the closed interval [-1, 1].
///
/// Every constructor clamps, including deserialization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct SentimentScore(Decimal);

impl SentimentScore {
    pub const NEUTRAL: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value.clamp(Decimal::NEGATIVE_ONE, Decimal::ONE))
    }

    pub const fn value(self) -> Decimal {
        self.0
    }

    /// Presentation rounding (2 dp)
    #[must_use]
    pub fn rounded(self) -> Self {
        Self(self.0.round_dp(2))
    }

    pub fn label(self) -> SentimentLabel {
        SentimentLabel::from_score(self)
    }
}

impl From<Decimal> for SentimentScore {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl From<SentimentScore> for Decimal {
    fn from(score: SentimentScore) -> Self {
        score.0
    }
}

impl std::fmt::Display for SentimentScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Coarse reading of a score for dashboards
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Bearish,
    Neutral,
    Bullish,
}

impl SentimentLabel {
    pub fn from_score(score: SentimentScore) -> Self {
        match score.value() {
            v if v >= dec!(0.3) => Self::Bullish,
            v if v <= dec!(-0.3) => Self::Bearish,
            _ => Self::Neutral,
        }
    }
}

/// Unit an amount is expressed in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountUnit {
    /// Common unit of account (USD)
    Value,
    /// Asset quantity (e.g. BTC)
    Native,
}

impl std::fmt::Display for AmountUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value => write!(f, "usd"),
            Self::Native => write!(f, "units"),
        }
    }
}

/// Position per asset, as a caller-owned snapshot.
///
/// The rebalancer never mutates holdings; executed trades are folded into a
/// new value with [`Holdings::with_trades`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Holdings(BTreeMap<String, Decimal>);

impl Holdings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a position, replacing any previous amount
    pub fn insert(&mut self, asset: &str, amount: Decimal) {
        self.0.insert(normalize_symbol(asset), amount);
    }

    /// Position for an asset (implicit zero when absent)
    pub fn get(&self, asset: &str) -> Decimal {
        self.0.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.0.contains_key(asset)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.0.iter()
    }

    pub fn assets(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Plain sum of all positions
    pub fn total(&self) -> Decimal {
        self.0.values().sum()
    }

    /// Percentage of the total per asset (empty when the total is zero)
    pub fn allocations(&self) -> BTreeMap<String, Decimal> {
        let total = self.total();
        if total == Decimal::ZERO {
            return BTreeMap::new();
        }

        self.0
            .iter()
            .map(|(asset, amount)| (asset.clone(), *amount / total * dec!(100)))
            .collect()
    }

    /// New holdings with signed trade amounts added.
    ///
    /// Trades must be expressed in the same unit as the holdings.
    #[must_use]
    pub fn with_trades<'a>(&self, trades: impl IntoIterator<Item = &'a TradeInstruction>) -> Self {
        let mut next = self.clone();
        for trade in trades {
            *next.0.entry(trade.asset.clone()).or_insert(Decimal::ZERO) += trade.amount;
        }
        next
    }
}

impl<S: AsRef<str>> FromIterator<(S, Decimal)> for Holdings {
    fn from_iter<I: IntoIterator<Item = (S, Decimal)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(asset, amount)| (normalize_symbol(asset.as_ref()), amount))
                .collect(),
        )
    }
}

/// Target fraction of total portfolio value per asset.
///
/// Fractions are not required to sum to 1; over- or under-allocation is
/// accepted as configured.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetAllocation(BTreeMap<String, Decimal>);

impl TargetAllocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: &str, fraction: Decimal) {
        self.0.insert(normalize_symbol(asset), fraction);
    }

    pub fn get(&self, asset: &str) -> Option<Decimal> {
        self.0.get(asset).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.0.iter()
    }

    pub fn assets(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> Decimal {
        self.0.values().sum()
    }

    /// Check fractions are non-negative and keys are exactly the tracked set
    pub fn validate(&self, tracked: &[String]) -> Result<()> {
        if let Some((asset, fraction)) = self.0.iter().find(|(_, f)| **f < Decimal::ZERO) {
            return Err(RebalanceError::InvalidAllocation(format!(
                "negative target {fraction} for {asset}"
            )));
        }

        let mut tracked: Vec<String> = tracked.iter().map(|s| normalize_symbol(s)).collect();
        tracked.sort();
        tracked.dedup();
        let keys: Vec<String> = self.0.keys().cloned().collect();

        if keys != tracked {
            return Err(RebalanceError::InvalidAllocation(format!(
                "targets {keys:?} do not match tracked assets {tracked:?}"
            )));
        }

        Ok(())
    }
}

impl<S: AsRef<str>> FromIterator<(S, Decimal)> for TargetAllocation {
    fn from_iter<I: IntoIterator<Item = (S, Decimal)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(asset, fraction)| (normalize_symbol(asset.as_ref()), fraction))
                .collect(),
        )
    }
}

/// Trade direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// A signed trade produced by the rebalancer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeInstruction {
    /// Asset symbol
    pub asset: String,

    /// Signed amount (positive = buy, negative = sell)
    pub amount: Decimal,

    /// Unit `amount` is expressed in
    pub unit: AmountUnit,

    /// Sentiment at decision time (audit metadata)
    pub sentiment: SentimentScore,
}

impl TradeInstruction {
    pub fn new(asset: impl Into<String>, amount: Decimal, unit: AmountUnit, sentiment: SentimentScore) -> Self {
        Self {
            asset: asset.into(),
            amount,
            unit,
            sentiment,
        }
    }

    pub fn side(&self) -> TradeSide {
        if self.amount.is_sign_positive() {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        }
    }

    pub fn abs_amount(&self) -> Decimal {
        self.amount.abs()
    }
}

/// Stored sentiment observation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub asset: String,
    pub score: SentimentScore,
    pub timestamp: DateTime<Utc>,

    /// Calendar day of `timestamp`, for day-range queries
    pub date: NaiveDate,
}

impl SentimentRecord {
    pub fn new(asset: impl Into<String>, score: SentimentScore, timestamp: DateTime<Utc>) -> Self {
        Self {
            asset: asset.into(),
            score,
            timestamp,
            date: timestamp.date_naive(),
        }
    }
}

/// Stored trade decision
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: uuid::Uuid,
    pub asset: String,

    /// Absolute amount; direction is in `side`
    pub amount: Decimal,
    pub side: TradeSide,
    pub unit: AmountUnit,
    pub sentiment: SentimentScore,
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    pub fn from_instruction(trade: &TradeInstruction, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            asset: trade.asset.clone(),
            amount: trade.abs_amount(),
            side: trade.side(),
            unit: trade.unit,
            sentiment: trade.sentiment,
            timestamp,
        }
    }
}

/// One line of a portfolio snapshot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetValue {
    pub asset: String,
    pub value: Decimal,
    pub percentage: Decimal,
}

/// Point-in-time portfolio state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,

    /// Sum of `assets[].value`; only meaningful as money when `unit` is `value`
    pub total_value: Decimal,
    pub assets: Vec<AssetValue>,

    /// Unit of `total_value` and each `assets[].value`
    #[serde(default = "value_unit")]
    pub unit: AmountUnit,
}

const fn value_unit() -> AmountUnit {
    AmountUnit::Value
}

impl PortfolioSnapshot {
    /// Snapshot of value-denominated holdings
    pub fn from_holdings(holdings: &Holdings, timestamp: DateTime<Utc>) -> Self {
        Self::from_amounts(holdings, AmountUnit::Value, timestamp)
    }

    /// Snapshot of raw amounts, labelled with the unit they are held in
    pub fn from_amounts(holdings: &Holdings, unit: AmountUnit, timestamp: DateTime<Utc>) -> Self {
        let allocations = holdings.allocations();
        let assets = holdings
            .iter()
            .map(|(asset, value)| AssetValue {
                asset: asset.clone(),
                value: *value,
                percentage: allocations.get(asset).copied().unwrap_or(Decimal::ZERO),
            })
            .collect();

        Self {
            timestamp,
            total_value: holdings.total(),
            assets,
            unit,
        }
    }

    /// Snapshot of native-unit holdings valued at `prices`.
    ///
    /// If any held asset lacks a positive price the snapshot keeps raw
    /// quantities and is labelled `native`.
    pub fn from_native_holdings(holdings: &Holdings, prices: &PriceQuote, timestamp: DateTime<Utc>) -> Self {
        let valued: Option<Holdings> = holdings
            .iter()
            .map(|(asset, quantity)| {
                prices
                    .get(asset)
                    .copied()
                    .filter(|price| *price > Decimal::ZERO)
                    .map(|price| (asset.as_str(), *quantity * price))
            })
            .collect();

        match valued {
            Some(valued) => Self::from_amounts(&valued, AmountUnit::Value, timestamp),
            None => Self::from_amounts(holdings, AmountUnit::Native, timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_clamps() {
        assert_eq!(SentimentScore::new(dec!(1.7)).value(), Decimal::ONE);
        assert_eq!(SentimentScore::new(dec!(-3)).value(), Decimal::NEGATIVE_ONE);
        assert_eq!(SentimentScore::new(dec!(0.42)).value(), dec!(0.42));
    }

    #[test]
    fn test_score_deserialize_clamps() {
        let score: SentimentScore = serde_json::from_str("\"2.5\"").unwrap();
        assert_eq!(score.value(), Decimal::ONE);
    }

    #[test]
    fn test_labels() {
        assert_eq!(SentimentScore::new(dec!(0.78)).label(), SentimentLabel::Bullish);
        assert_eq!(SentimentScore::new(dec!(-0.25)).label(), SentimentLabel::Neutral);
        assert_eq!(SentimentScore::new(dec!(-0.3)).label(), SentimentLabel::Bearish);
    }

    #[test]
    fn test_holdings_with_trades() {
        let holdings: Holdings = [("btc", dec!(600)), ("eth", dec!(400))].into_iter().collect();
        let trades = [
            TradeInstruction::new("BTC", dec!(-100), AmountUnit::Value, SentimentScore::NEUTRAL),
            TradeInstruction::new("SOL", dec!(50), AmountUnit::Value, SentimentScore::NEUTRAL),
        ];

        let next = holdings.with_trades(&trades);
        assert_eq!(next.get("BTC"), dec!(500));
        assert_eq!(next.get("ETH"), dec!(400));
        assert_eq!(next.get("SOL"), dec!(50));

        // Input snapshot untouched
        assert_eq!(holdings.get("BTC"), dec!(600));
        assert!(!holdings.contains("SOL"));
    }

    #[test]
    fn test_allocations_empty_portfolio() {
        let holdings: Holdings = [("BTC", Decimal::ZERO)].into_iter().collect();
        assert!(holdings.allocations().is_empty());
    }

    #[test]
    fn test_target_validation() {
        let tracked = vec!["BTC".to_string(), "ETH".to_string()];

        let ok: TargetAllocation = [("BTC", dec!(0.7)), ("ETH", dec!(0.5))].into_iter().collect();
        assert!(ok.validate(&tracked).is_ok());

        let negative: TargetAllocation = [("BTC", dec!(-0.1)), ("ETH", dec!(0.5))].into_iter().collect();
        assert!(negative.validate(&tracked).is_err());

        let missing: TargetAllocation = [("BTC", dec!(1))].into_iter().collect();
        assert!(missing.validate(&tracked).is_err());
    }

    #[test]
    fn test_trade_record_direction() {
        let trade = TradeInstruction::new("SOL", dec!(-12.5), AmountUnit::Native, SentimentScore::new(dec!(-0.25)));
        let record = TradeRecord::from_instruction(&trade, Utc::now());
        assert_eq!(record.side, TradeSide::Sell);
        assert_eq!(record.amount, dec!(12.5));
    }

    #[test]
    fn test_snapshot_percentages() {
        let holdings: Holdings = [("BTC", dec!(750)), ("ETH", dec!(250))].into_iter().collect();
        let snapshot = PortfolioSnapshot::from_holdings(&holdings, Utc::now());
        assert_eq!(snapshot.total_value, dec!(1000));
        assert_eq!(snapshot.assets[0].percentage, dec!(75));
        assert_eq!(snapshot.assets[1].percentage, dec!(25));
        assert_eq!(snapshot.unit, AmountUnit::Value);
    }

    #[test]
    fn test_native_snapshot_is_priced() {
        let holdings: Holdings = [("BTC", dec!(0.1)), ("ETH", dec!(1))].into_iter().collect();
        let prices: PriceQuote = [("BTC".to_string(), dec!(97500)), ("ETH".to_string(), dec!(3450))]
            .into_iter()
            .collect();

        let snapshot = PortfolioSnapshot::from_native_holdings(&holdings, &prices, Utc::now());
        assert_eq!(snapshot.unit, AmountUnit::Value);
        assert_eq!(snapshot.total_value, dec!(13200));
        assert_eq!(snapshot.assets[0].value, dec!(9750));
        assert_eq!(snapshot.assets[1].value, dec!(3450));
    }

    #[test]
    fn test_native_snapshot_without_prices_keeps_quantities() {
        let holdings: Holdings = [("BTC", dec!(0.1)), ("ETH", dec!(1))].into_iter().collect();
        let prices: PriceQuote = [("BTC".to_string(), dec!(97500))].into_iter().collect();

        let snapshot = PortfolioSnapshot::from_native_holdings(&holdings, &prices, Utc::now());
        assert_eq!(snapshot.unit, AmountUnit::Native);
        assert_eq!(snapshot.total_value, dec!(1.1));
    }
}
