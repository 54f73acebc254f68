//! # sentiment-rebalancer
//!
//! Sentiment-weighted crypto portfolio rebalancing.
//!
//! Each cycle scores crowd sentiment per tracked asset, tilts the target
//! allocation by that score, and emits the sparse set of trades needed to
//! bring the portfolio back within a drift threshold.
//!
//! ## Pieces
//!
//! - [`sentiment`] - pluggable scorers (weighted samples, configured baselines)
//! - [`strategy`] - the pure rebalance engine and its policy presets
//! - [`source`], [`exchange`], [`store`] - collaborator traits and in-process
//!   implementations (fixture corpus, mock/CoinGecko prices, simulated chain
//!   executor, in-memory history)
//! - [`agent`] - the cycle driver wiring it all together
//!
//! ## Example: one value-fraction cycle
//!
//! ```text
//! holdings  BTC $600  ETH $400      targets  BTC 50%  ETH 50%
//! sentiment BTC 0.00  ETH 0.00      threshold 5%
//!
//! BTC  60% -> 50%   drift -10%   sell $100
//! ETH  40% -> 50%   drift +10%   buy  $100
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod exchange;
pub mod model;
pub mod sentiment;
pub mod source;
pub mod store;
pub mod strategy;

pub use agent::{Collaborators, CycleReport, RebalanceAgent};
pub use config::{PriceFeedKind, RebalancerConfig, ScorerConfig};
pub use error::{RebalanceError, Result};
pub use model::{
    AmountUnit, Holdings, PortfolioSnapshot, PriceQuote, SentimentLabel, SentimentMap,
    SentimentRecord, SentimentSample, SentimentScore, TargetAllocation, TradeInstruction,
    TradeRecord, TradeSide,
};
pub use strategy::{PolicyKind, PortfolioTotal, RebalancePlan, RebalancePolicy, Rebalancer, Threshold};
