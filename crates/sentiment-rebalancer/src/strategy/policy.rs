//! Rebalance Policy
//!
//! One configuration surface covering both deployed rebalance styles:
//! the value-fraction policy and the price-aware policy.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::RebalanceError;
use crate::model::AmountUnit;

/// Default drift (as a fraction of portfolio value) before a trade is emitted
pub const DEFAULT_FRACTION_THRESHOLD: Decimal = dec!(0.05);

/// Default drift (in unit of account) for the price-aware policy
pub const DEFAULT_VALUE_THRESHOLD: Decimal = dec!(50);

/// Sentiment moves the target by at most ±20%
pub const DEFAULT_SENTIMENT_INFLUENCE: Decimal = dec!(0.2);

/// Minimum deviation before a trade is emitted (strict inequality)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Threshold {
    /// Deviation of allocation fraction, e.g. 0.05
    Fraction(Decimal),
    /// Deviation in unit-of-account value, e.g. 50 USD
    AbsoluteValue(Decimal),
}

impl Threshold {
    pub const fn amount(self) -> Decimal {
        match self {
            Self::Fraction(t) | Self::AbsoluteValue(t) => t,
        }
    }

    /// Same kind, different magnitude
    #[must_use]
    pub const fn with_amount(self, amount: Decimal) -> Self {
        match self {
            Self::Fraction(_) => Self::Fraction(amount),
            Self::AbsoluteValue(_) => Self::AbsoluteValue(amount),
        }
    }
}

/// How the total portfolio value is computed.
///
/// For native-unit holdings the two readings differ: `RawSum` adds up raw
/// quantities while per-asset current value is `quantity * price`. Both are
/// kept; `RawSum` is the deployed behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioTotal {
    /// Sum of raw holding amounts, whatever their unit
    #[default]
    RawSum,
    /// Sum of per-asset current values (price-weighted for native holdings)
    Priced,
}

impl std::str::FromStr for PortfolioTotal {
    type Err = RebalanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" | "raw_sum" => Ok(Self::RawSum),
            "priced" => Ok(Self::Priced),
            other => Err(RebalanceError::Config(format!("unknown portfolio total '{other}'"))),
        }
    }
}

/// Named policy presets
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Value holdings, sentiment-adjusted targets, fraction threshold
    #[default]
    Value,
    /// Native holdings, raw targets, absolute threshold, native output
    Price,
}

impl std::str::FromStr for PolicyKind {
    type Err = RebalanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "value" | "value_fraction" => Ok(Self::Value),
            "price" | "price_aware" => Ok(Self::Price),
            other => Err(RebalanceError::Config(format!("unknown rebalance policy '{other}'"))),
        }
    }
}

/// Full rebalance configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalancePolicy {
    /// Unit the caller's holdings are expressed in
    pub holdings_unit: AmountUnit,

    /// Portfolio total interpretation
    pub portfolio_total: PortfolioTotal,

    /// Scale targets by `1 + sentiment * sentiment_influence`
    pub adjust_target_by_sentiment: bool,

    /// Trade trigger
    pub threshold: Threshold,

    /// Unit of emitted trade amounts
    pub output_unit: AmountUnit,

    pub sentiment_influence: Decimal,
}

impl Default for RebalancePolicy {
    fn default() -> Self {
        Self::value_fraction()
    }
}

impl RebalancePolicy {
    /// Holdings in USD; sentiment tilts targets; 5% drift triggers a USD trade
    pub const fn value_fraction() -> Self {
        Self {
            holdings_unit: AmountUnit::Value,
            portfolio_total: PortfolioTotal::RawSum,
            adjust_target_by_sentiment: true,
            threshold: Threshold::Fraction(DEFAULT_FRACTION_THRESHOLD),
            output_unit: AmountUnit::Value,
            sentiment_influence: DEFAULT_SENTIMENT_INFLUENCE,
        }
    }

    /// Holdings in asset units; $50 drift triggers a trade in asset units.
    ///
    /// Sentiment rides along on each trade as metadata only.
    pub const fn price_aware() -> Self {
        Self {
            holdings_unit: AmountUnit::Native,
            portfolio_total: PortfolioTotal::RawSum,
            adjust_target_by_sentiment: false,
            threshold: Threshold::AbsoluteValue(DEFAULT_VALUE_THRESHOLD),
            output_unit: AmountUnit::Native,
            sentiment_influence: DEFAULT_SENTIMENT_INFLUENCE,
        }
    }

    pub const fn from_kind(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Value => Self::value_fraction(),
            PolicyKind::Price => Self::price_aware(),
        }
    }

    #[must_use]
    pub const fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_portfolio_total(mut self, total: PortfolioTotal) -> Self {
        self.portfolio_total = total;
        self
    }

    #[must_use]
    pub const fn with_sentiment_adjustment(mut self, enabled: bool) -> Self {
        self.adjust_target_by_sentiment = enabled;
        self
    }

    #[must_use]
    pub const fn with_output_unit(mut self, unit: AmountUnit) -> Self {
        self.output_unit = unit;
        self
    }

    /// Whether a rebalance needs a quote for every held asset
    pub fn requires_prices(&self) -> bool {
        self.holdings_unit == AmountUnit::Native
            || self.output_unit == AmountUnit::Native
    }
}
