//! Configuration
//!
//! Environment-driven settings for the scorer, the rebalance policy and the
//! collaborators. Parsing goes through [`RebalancerConfig::from_lookup`] so it
//! can be exercised without touching the process environment.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{RebalanceError, Result};
use crate::model::{normalize_symbol, Holdings, TargetAllocation};
use crate::sentiment::ScorerKind;
use crate::strategy::{PolicyKind, PortfolioTotal, RebalancePolicy};

const DEFAULT_TRACKED_ASSETS: &str = "BTC,ETH,NEAR,SOL";
const DEFAULT_TARGET_ALLOCATION: &str = "BTC:0.4,ETH:0.3,NEAR:0.2,SOL:0.1";
const DEFAULT_INITIAL_HOLDINGS: &str = "BTC:5000,ETH:3000,NEAR:2000,SOL:1000";
const DEFAULT_BASELINES: &str = "BTC:0.78,ETH:0.62,NEAR:0.81,SOL:-0.25";
const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 3600;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Sentiment scorer settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorerConfig {
    pub kind: ScorerKind,

    /// Fixed RNG seed; `None` draws from the OS
    pub seed: Option<u64>,

    /// Score a random subset of at most this many samples per asset
    pub sample_limit: Option<usize>,

    /// Per-asset baselines for the baseline scorer
    pub baselines: HashMap<String, Decimal>,
}

/// Which price feed to wire up
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceFeedKind {
    #[default]
    Mock,
    CoinGecko,
}

impl FromStr for PriceFeedKind {
    type Err = RebalanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "coingecko" => Ok(Self::CoinGecko),
            other => Err(RebalanceError::Config(format!("unknown price feed '{other}'"))),
        }
    }
}

/// Effective configuration of a rebalancer deployment
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RebalancerConfig {
    pub tracked_assets: Vec<String>,
    pub targets: TargetAllocation,
    pub initial_holdings: Holdings,
    pub policy: RebalancePolicy,
    pub scorer: ScorerConfig,

    /// JSON sample corpus; empty corpus when unset
    pub samples_path: Option<PathBuf>,
    pub price_feed: PriceFeedKind,

    /// Seconds between scheduled cycles; 0 disables the scheduler
    pub cycle_interval_secs: u64,
    pub trade_journal_path: Option<PathBuf>,
    pub bind_addr: String,
}

impl RebalancerConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let tracked_assets = parse_asset_list(&get_or("TRACKED_ASSETS", DEFAULT_TRACKED_ASSETS));
        if tracked_assets.is_empty() {
            return Err(RebalanceError::Config("TRACKED_ASSETS is empty".into()));
        }

        let targets: TargetAllocation =
            parse_symbol_map("TARGET_ALLOCATION", &get_or("TARGET_ALLOCATION", DEFAULT_TARGET_ALLOCATION))?
                .into_iter()
                .collect();
        targets.validate(&tracked_assets)?;

        let initial_holdings: Holdings =
            parse_symbol_map("INITIAL_HOLDINGS", &get_or("INITIAL_HOLDINGS", DEFAULT_INITIAL_HOLDINGS))?
                .into_iter()
                .collect();

        let policy_kind = get("REBALANCE_POLICY")
            .map(|v| v.parse::<PolicyKind>())
            .transpose()?
            .unwrap_or_default();
        let mut policy = RebalancePolicy::from_kind(policy_kind);

        if let Some(raw) = get("REBALANCE_THRESHOLD") {
            let amount = parse_decimal("REBALANCE_THRESHOLD", &raw)?;
            if amount < Decimal::ZERO {
                return Err(RebalanceError::Config(format!(
                    "REBALANCE_THRESHOLD must be non-negative, got {amount}"
                )));
            }
            policy = policy.with_threshold(policy.threshold.with_amount(amount));
        }
        if let Some(raw) = get("REBALANCE_PORTFOLIO_TOTAL") {
            policy = policy.with_portfolio_total(raw.parse::<PortfolioTotal>()?);
        }

        let scorer = ScorerConfig {
            kind: get("SENTIMENT_SCORER")
                .map(|v| v.parse::<ScorerKind>())
                .transpose()?
                .unwrap_or_default(),
            seed: get("SENTIMENT_SEED")
                .map(|v| parse_number::<u64>("SENTIMENT_SEED", &v))
                .transpose()?,
            sample_limit: get("SENTIMENT_SAMPLE_LIMIT")
                .map(|v| parse_number::<usize>("SENTIMENT_SAMPLE_LIMIT", &v))
                .transpose()?,
            baselines: parse_symbol_map("SENTIMENT_BASELINES", &get_or("SENTIMENT_BASELINES", DEFAULT_BASELINES))?
                .into_iter()
                .collect(),
        };

        let price_feed = get("PRICE_FEED")
            .map(|v| v.parse::<PriceFeedKind>())
            .transpose()?
            .unwrap_or_default();

        let cycle_interval_secs = get("CYCLE_INTERVAL_SECS")
            .map(|v| parse_number::<u64>("CYCLE_INTERVAL_SECS", &v))
            .transpose()?
            .unwrap_or(DEFAULT_CYCLE_INTERVAL_SECS);

        Ok(Self {
            tracked_assets,
            targets,
            initial_holdings,
            policy,
            scorer,
            samples_path: get("SAMPLES_PATH").map(PathBuf::from),
            price_feed,
            cycle_interval_secs,
            trade_journal_path: get("TRADE_JOURNAL_PATH").map(PathBuf::from),
            bind_addr: get_or("BIND_ADDR", DEFAULT_BIND_ADDR),
        })
    }
}

/// Parse "BTC, eth ,NEAR" into normalized, de-duplicated symbols
pub fn parse_asset_list(raw: &str) -> Vec<String> {
    let mut assets: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(normalize_symbol).filter(|s| !s.is_empty()) {
        if !assets.contains(&symbol) {
            assets.push(symbol);
        }
    }
    assets
}

/// Parse "BTC:0.4,ETH:0.3" into (symbol, value) pairs
pub fn parse_symbol_map(key: &str, raw: &str) -> Result<Vec<(String, Decimal)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (symbol, value) = entry.split_once(':').ok_or_else(|| {
                RebalanceError::Config(format!("{key}: expected SYMBOL:VALUE, got '{entry}'"))
            })?;
            let symbol = normalize_symbol(symbol);
            if symbol.is_empty() {
                return Err(RebalanceError::Config(format!("{key}: empty symbol in '{entry}'")));
            }
            Ok((symbol, parse_decimal(key, value)?))
        })
        .collect()
}

fn parse_decimal(key: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|e| RebalanceError::Config(format!("{key}: invalid number '{}': {e}", raw.trim())))
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| RebalanceError::Config(format!("{key}: invalid value '{}': {e}", raw.trim())))
}
