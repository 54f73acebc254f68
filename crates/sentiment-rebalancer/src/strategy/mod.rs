//! Rebalance Strategies
//!
//! A single rebalance engine parameterised by [`RebalancePolicy`]. The two
//! deployed styles (value-fraction and price-aware) are presets of it.

mod policy;
mod rebalancer;

pub use policy::{
    PolicyKind, PortfolioTotal, RebalancePolicy, Threshold, DEFAULT_FRACTION_THRESHOLD,
    DEFAULT_SENTIMENT_INFLUENCE, DEFAULT_VALUE_THRESHOLD,
};
pub use rebalancer::{AbortReason, RebalancePlan, Rebalancer};
