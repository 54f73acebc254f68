//! Portfolio Rebalancer
//!
//! Computes the sparse set of trades that moves a portfolio toward its
//! (optionally sentiment-adjusted) target allocation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::policy::{PortfolioTotal, RebalancePolicy, Threshold};
use crate::error::{RebalanceError, Result};
use crate::model::{
    AmountUnit, Holdings, PriceQuote, SentimentMap, SentimentScore, TargetAllocation,
    TradeInstruction,
};

/// Why a rebalance produced no trades without evaluating assets
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    /// Some held assets had no usable quote; nothing is traded this cycle
    MissingPriceData { assets: Vec<String> },
}

/// Output of one rebalance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalancePlan {
    /// Trades keyed by asset; absence means "no action"
    pub trades: BTreeMap<String, TradeInstruction>,

    /// Portfolio value used as the allocation base
    pub portfolio_value: Decimal,

    /// Set when the cycle was abandoned before any asset was evaluated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortReason>,
}

impl RebalancePlan {
    /// Plan with no trades
    pub const fn empty(portfolio_value: Decimal) -> Self {
        Self {
            trades: BTreeMap::new(),
            portfolio_value,
            aborted: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn get(&self, asset: &str) -> Option<&TradeInstruction> {
        self.trades.get(asset)
    }

    /// Signed amount per asset
    pub fn amounts(&self) -> BTreeMap<String, Decimal> {
        self.trades
            .iter()
            .map(|(asset, trade)| (asset.clone(), trade.amount))
            .collect()
    }

    fn aborted(reason: AbortReason) -> Self {
        Self {
            trades: BTreeMap::new(),
            portfolio_value: Decimal::ZERO,
            aborted: Some(reason),
        }
    }
}

/// Pure rebalance engine for one policy
#[derive(Clone, Debug, Default)]
pub struct Rebalancer {
    policy: RebalancePolicy,
}

impl Rebalancer {
    pub const fn new(policy: RebalancePolicy) -> Self {
        Self { policy }
    }

    pub const fn policy(&self) -> &RebalancePolicy {
        &self.policy
    }

    /// Compute trades for one cycle.
    ///
    /// Assets in `targets` but not in `holdings` start from zero. Assets held
    /// but not targeted are never traded. Fails with `DivisionUndefined` when
    /// a fraction threshold meets a zero-value portfolio.
    pub fn rebalance(
        &self,
        holdings: &Holdings,
        targets: &TargetAllocation,
        prices: &PriceQuote,
        sentiments: &SentimentMap,
    ) -> Result<RebalancePlan> {
        let policy = &self.policy;

        if policy.requires_prices() {
            let missing: Vec<String> = holdings
                .assets()
                .filter(|asset| usable_price(prices, asset).is_none())
                .cloned()
                .collect();

            if !missing.is_empty() {
                tracing::warn!(?missing, "missing price data, skipping rebalance this cycle");
                return Ok(RebalancePlan::aborted(AbortReason::MissingPriceData { assets: missing }));
            }
        }

        let current_value = |asset: &str| -> Decimal {
            let held = holdings.get(asset);
            match policy.holdings_unit {
                AmountUnit::Value => held,
                AmountUnit::Native => usable_price(prices, asset).map_or(Decimal::ZERO, |p| held * p),
            }
        };

        let portfolio_value: Decimal = match policy.portfolio_total {
            PortfolioTotal::RawSum => holdings.total(),
            PortfolioTotal::Priced => holdings.assets().map(|a| current_value(a)).sum(),
        };

        if matches!(policy.threshold, Threshold::Fraction(_)) && portfolio_value.is_zero() {
            return Err(RebalanceError::DivisionUndefined);
        }

        let mut trades = BTreeMap::new();

        for (asset, target) in targets.iter() {
            let sentiment = sentiments.get(asset).copied().unwrap_or(SentimentScore::NEUTRAL);
            let adjusted_target = if policy.adjust_target_by_sentiment {
                *target * (Decimal::ONE + sentiment.value() * policy.sentiment_influence)
            } else {
                *target
            };

            let current = current_value(asset);

            let amount_value = match policy.threshold {
                Threshold::Fraction(threshold) => {
                    let delta_fraction = adjusted_target - current / portfolio_value;
                    if delta_fraction.abs() <= threshold {
                        continue;
                    }
                    delta_fraction * portfolio_value
                }
                Threshold::AbsoluteValue(threshold) => {
                    let trade_value = portfolio_value * adjusted_target - current;
                    if trade_value.abs() <= threshold {
                        continue;
                    }
                    trade_value
                }
            };

            let amount = match policy.output_unit {
                AmountUnit::Value => amount_value,
                AmountUnit::Native => {
                    let Some(price) = usable_price(prices, asset) else {
                        tracing::warn!(asset = %asset, "no usable price for target asset, skipping");
                        continue;
                    };
                    amount_value / price
                }
            };

            tracing::debug!(
                asset = %asset,
                %amount,
                unit = %policy.output_unit,
                %sentiment,
                "rebalance trade"
            );

            trades.insert(
                asset.clone(),
                TradeInstruction::new(asset.clone(), amount, policy.output_unit, sentiment),
            );
        }

        Ok(RebalancePlan {
            trades,
            portfolio_value,
            aborted: None,
        })
    }
}

/// Quote for an asset if it is strictly positive
fn usable_price(prices: &PriceQuote, asset: &str) -> Option<Decimal> {
    prices.get(asset).copied().filter(|p| *p > Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn holdings(pairs: &[(&str, Decimal)]) -> Holdings {
        pairs.iter().map(|(a, v)| (*a, *v)).collect()
    }

    fn targets(pairs: &[(&str, Decimal)]) -> TargetAllocation {
        pairs.iter().map(|(a, v)| (*a, *v)).collect()
    }

    fn sentiments(pairs: &[(&str, Decimal)]) -> SentimentMap {
        pairs
            .iter()
            .map(|(a, v)| ((*a).to_string(), SentimentScore::new(*v)))
            .collect()
    }

    fn prices(pairs: &[(&str, Decimal)]) -> PriceQuote {
        pairs.iter().map(|(a, v)| ((*a).to_string(), *v)).collect()
    }

    #[test]
    fn test_value_policy_two_assets() {
        let rebalancer = Rebalancer::new(RebalancePolicy::value_fraction());
        let plan = rebalancer
            .rebalance(
                &holdings(&[("A", dec!(600)), ("B", dec!(400))]),
                &targets(&[("A", dec!(0.5)), ("B", dec!(0.5))]),
                &PriceQuote::new(),
                &sentiments(&[("A", dec!(0)), ("B", dec!(0))]),
            )
            .unwrap();

        assert_eq!(plan.portfolio_value, dec!(1000));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.get("A").unwrap().amount, dec!(-100));
        assert_eq!(plan.get("B").unwrap().amount, dec!(100));
        assert_eq!(plan.get("A").unwrap().unit, AmountUnit::Value);
    }

    #[test]
    fn test_positive_sentiment_fully_offsets_overweight_drift() {
        let rebalancer = Rebalancer::new(RebalancePolicy::value_fraction());
        let plan = rebalancer
            .rebalance(
                &holdings(&[("A", dec!(600)), ("B", dec!(400))]),
                &targets(&[("A", dec!(0.5)), ("B", dec!(0.5))]),
                &PriceQuote::new(),
                &sentiments(&[("A", dec!(1.0)), ("B", dec!(0))]),
            )
            .unwrap();

        // 0.5 * 1.2 = 0.6 matches the current 60% weight exactly
        assert!(plan.get("A").is_none());
        assert_eq!(plan.get("B").unwrap().amount, dec!(100));
    }

    #[test]
    fn test_exactly_at_threshold_does_not_trade() {
        let rebalancer = Rebalancer::new(RebalancePolicy::value_fraction());
        let plan = rebalancer
            .rebalance(
                &holdings(&[("A", dec!(550)), ("B", dec!(450))]),
                &targets(&[("A", dec!(0.5)), ("B", dec!(0.5))]),
                &PriceQuote::new(),
                &SentimentMap::new(),
            )
            .unwrap();

        assert!(plan.is_empty());
        assert!(plan.aborted.is_none());
    }

    #[test]
    fn test_absolute_threshold_boundary_does_not_trade() {
        let policy = RebalancePolicy::price_aware().with_portfolio_total(PortfolioTotal::Priced);
        let rebalancer = Rebalancer::new(policy);
        // 10 units @ 100 = 1000 each; target 0.525 of 2000 = 1050, drift exactly 50
        let plan = rebalancer
            .rebalance(
                &holdings(&[("A", dec!(10)), ("B", dec!(10))]),
                &targets(&[("A", dec!(0.525)), ("B", dec!(0.5))]),
                &prices(&[("A", dec!(100)), ("B", dec!(100))]),
                &SentimentMap::new(),
            )
            .unwrap();

        assert!(plan.is_empty());
    }

    #[test]
    fn test_price_policy_raw_sum_is_deployed_default() {
        let rebalancer = Rebalancer::new(RebalancePolicy::price_aware());
        let plan = rebalancer
            .rebalance(
                &holdings(&[("BTC", dec!(0.1))]),
                &targets(&[("BTC", dec!(1.0))]),
                &prices(&[("BTC", dec!(50000))]),
                &sentiments(&[("BTC", dec!(0.78))]),
            )
            .unwrap();

        // Raw quantities summed: 0.1 "value" vs 5000 current value
        assert_eq!(plan.portfolio_value, dec!(0.1));
        let trade = plan.get("BTC").unwrap();
        assert_eq!(trade.amount, dec!(-0.099998));
        assert_eq!(trade.unit, AmountUnit::Native);
        assert_eq!(trade.sentiment.value(), dec!(0.78));
    }

    #[test]
    fn test_price_policy_priced_total() {
        let policy = RebalancePolicy::price_aware().with_portfolio_total(PortfolioTotal::Priced);
        let plan = Rebalancer::new(policy)
            .rebalance(
                &holdings(&[("BTC", dec!(0.1))]),
                &targets(&[("BTC", dec!(1.0))]),
                &prices(&[("BTC", dec!(50000))]),
                &SentimentMap::new(),
            )
            .unwrap();

        assert_eq!(plan.portfolio_value, dec!(5000));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_price_policy_native_amounts() {
        let policy = RebalancePolicy::price_aware().with_portfolio_total(PortfolioTotal::Priced);
        let plan = Rebalancer::new(policy)
            .rebalance(
                &holdings(&[("BTC", dec!(0.1)), ("ETH", dec!(0))]),
                &targets(&[("BTC", dec!(0.5)), ("ETH", dec!(0.5))]),
                &prices(&[("BTC", dec!(50000)), ("ETH", dec!(2500))]),
                &SentimentMap::new(),
            )
            .unwrap();

        // 5000 total; each side needs 2500 USD
        assert_eq!(plan.get("BTC").unwrap().amount, dec!(-0.05));
        assert_eq!(plan.get("ETH").unwrap().amount, dec!(1));
    }

    #[test]
    fn test_price_policy_ignores_sentiment_in_math() {
        let policy = RebalancePolicy::price_aware().with_portfolio_total(PortfolioTotal::Priced);
        let rebalancer = Rebalancer::new(policy);
        let h = holdings(&[("BTC", dec!(0.1)), ("ETH", dec!(0))]);
        let t = targets(&[("BTC", dec!(0.5)), ("ETH", dec!(0.5))]);
        let p = prices(&[("BTC", dec!(50000)), ("ETH", dec!(2500))]);

        let neutral = rebalancer.rebalance(&h, &t, &p, &SentimentMap::new()).unwrap();
        let bullish = rebalancer
            .rebalance(&h, &t, &p, &sentiments(&[("BTC", dec!(1)), ("ETH", dec!(-1))]))
            .unwrap();

        assert_eq!(neutral.amounts(), bullish.amounts());
    }

    #[test]
    fn test_missing_price_aborts_whole_cycle() {
        let rebalancer = Rebalancer::new(RebalancePolicy::price_aware());
        let plan = rebalancer
            .rebalance(
                &holdings(&[("BTC", dec!(0.1)), ("ETH", dec!(2)), ("SOL", dec!(10))]),
                &targets(&[("BTC", dec!(0.4)), ("ETH", dec!(0.4)), ("SOL", dec!(0.2))]),
                &prices(&[("BTC", dec!(50000)), ("ETH", dec!(3000))]),
                &SentimentMap::new(),
            )
            .unwrap();

        assert!(plan.is_empty());
        assert_eq!(
            plan.aborted,
            Some(AbortReason::MissingPriceData { assets: vec!["SOL".into()] })
        );
    }

    #[test]
    fn test_zero_price_is_missing() {
        let rebalancer = Rebalancer::new(RebalancePolicy::price_aware());
        let plan = rebalancer
            .rebalance(
                &holdings(&[("BTC", dec!(0.1))]),
                &targets(&[("BTC", dec!(1))]),
                &prices(&[("BTC", dec!(0))]),
                &SentimentMap::new(),
            )
            .unwrap();

        assert!(plan.aborted.is_some());
    }

    #[test]
    fn test_target_only_asset_starts_from_zero() {
        let rebalancer = Rebalancer::new(RebalancePolicy::value_fraction());
        let plan = rebalancer
            .rebalance(
                &holdings(&[("BTC", dec!(1000))]),
                &targets(&[("BTC", dec!(0.8)), ("NEAR", dec!(0.2))]),
                &PriceQuote::new(),
                &SentimentMap::new(),
            )
            .unwrap();

        assert_eq!(plan.get("NEAR").unwrap().amount, dec!(200));
        assert_eq!(plan.get("BTC").unwrap().amount, dec!(-200));
    }

    #[test]
    fn test_untargeted_holding_is_never_traded() {
        // Pins current behaviour: a held asset without a target is left alone,
        // even though it dilutes every other asset's weight.
        let rebalancer = Rebalancer::new(RebalancePolicy::value_fraction());
        let plan = rebalancer
            .rebalance(
                &holdings(&[("BTC", dec!(500)), ("DOGE", dec!(500))]),
                &targets(&[("BTC", dec!(1))]),
                &PriceQuote::new(),
                &SentimentMap::new(),
            )
            .unwrap();

        assert!(plan.get("DOGE").is_none());
        assert_eq!(plan.get("BTC").unwrap().amount, dec!(500));
    }

    #[test]
    fn test_zero_value_portfolio_is_undefined() {
        let rebalancer = Rebalancer::new(RebalancePolicy::value_fraction());
        let result = rebalancer.rebalance(
            &Holdings::new(),
            &targets(&[("BTC", dec!(1))]),
            &PriceQuote::new(),
            &SentimentMap::new(),
        );

        assert!(matches!(result, Err(RebalanceError::DivisionUndefined)));
    }

    #[test]
    fn test_rebalance_is_idempotent() {
        let rebalancer = Rebalancer::new(RebalancePolicy::value_fraction());
        let h = holdings(&[("BTC", dec!(5000)), ("ETH", dec!(3000)), ("NEAR", dec!(2000)), ("SOL", dec!(1000))]);
        let t = targets(&[("BTC", dec!(0.4)), ("ETH", dec!(0.3)), ("NEAR", dec!(0.2)), ("SOL", dec!(0.1))]);
        let s = sentiments(&[("BTC", dec!(0.61)), ("ETH", dec!(0.43)), ("NEAR", dec!(0.7)), ("SOL", dec!(0.3))]);

        let first = rebalancer.rebalance(&h, &t, &PriceQuote::new(), &s).unwrap();
        let second = rebalancer.rebalance(&h, &t, &PriceQuote::new(), &s).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sparse_output_never_contains_small_deltas() {
        let rebalancer = Rebalancer::new(RebalancePolicy::value_fraction());
        let h = holdings(&[("BTC", dec!(5000)), ("ETH", dec!(3000)), ("NEAR", dec!(2000)), ("SOL", dec!(1000))]);
        let t = targets(&[("BTC", dec!(0.4)), ("ETH", dec!(0.3)), ("NEAR", dec!(0.2)), ("SOL", dec!(0.1))]);

        let plan = rebalancer.rebalance(&h, &t, &PriceQuote::new(), &SentimentMap::new()).unwrap();
        let total = h.total();
        for trade in plan.trades.values() {
            assert!((trade.amount / total).abs() > dec!(0.05));
        }
        // BTC 45.45% vs 40%, the others within 5 points
        assert_eq!(plan.len(), 1);
        assert!(plan.get("BTC").unwrap().amount < Decimal::ZERO);
    }
}
