//! CoinGecko Price Feed
//!
//! Live USD quotes from the CoinGecko `simple/price` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use super::PriceFeed;
use crate::error::{RebalanceError, Result};
use crate::model::{normalize_symbol, PriceQuote};

/// CoinGecko connection settings
#[derive(Clone, Debug)]
pub struct CoinGeckoConfig {
    /// API root, e.g. `https://api.coingecko.com/api/v3`
    pub base_url: String,

    /// Demo/pro API key, sent as `x-cg-demo-api-key`
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".into(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl CoinGeckoConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a key lookup; a malformed or zero timeout is an error
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let base_url = get("COINGECKO_BASE_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(defaults.base_url);
        let api_key = get("COINGECKO_API_KEY").filter(|k| !k.trim().is_empty());

        let timeout_secs = match get("COINGECKO_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(RebalanceError::Config(format!(
                        "COINGECKO_TIMEOUT_SECS must be a positive number of seconds, got '{raw}'"
                    )))
                }
            },
            None => defaults.timeout_secs,
        };

        Ok(Self {
            base_url,
            api_key,
            timeout_secs,
        })
    }
}

/// CoinGecko coin id for a ticker symbol
pub fn coingecko_id(symbol: &str) -> Option<&'static str> {
    let id = match normalize_symbol(symbol).as_str() {
        "BTC" => "bitcoin",
        "ETH" => "ethereum",
        "SOL" => "solana",
        "NEAR" => "near",
        "ADA" => "cardano",
        "DOT" => "polkadot",
        "BNB" => "binancecoin",
        "XRP" => "ripple",
        "LINK" => "chainlink",
        "AVAX" => "avalanche-2",
        "ATOM" => "cosmos",
        "DOGE" => "dogecoin",
        _ => return None,
    };
    Some(id)
}

/// Parse a `simple/price` body into a quote keyed by ticker symbol.
///
/// `ids` maps CoinGecko ids back to symbols. Ids missing from the body, or
/// without a numeric `usd` field, are left out of the quote.
pub fn parse_simple_price(body: &str, ids: &HashMap<String, String>) -> Result<PriceQuote> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let object = value
        .as_object()
        .ok_or_else(|| RebalanceError::External("unexpected CoinGecko response shape".into()))?;

    let mut quote = PriceQuote::new();
    for (id, prices) in object {
        let Some(symbol) = ids.get(id) else {
            continue;
        };
        let Some(serde_json::Value::Number(usd)) = prices.get("usd") else {
            tracing::debug!(id = %id, "no usd price in CoinGecko response");
            continue;
        };

        let raw = usd.to_string();
        match Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw)) {
            Ok(price) => {
                quote.insert(symbol.clone(), price);
            }
            Err(e) => tracing::warn!(id = %id, raw = %raw, "unparseable price: {e}"),
        }
    }

    Ok(quote)
}

/// HTTP price feed backed by CoinGecko
pub struct CoinGeckoPriceFeed {
    client: Client,
    config: CoinGeckoConfig,
}

impl CoinGeckoPriceFeed {
    pub fn from_config(config: CoinGeckoConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RebalanceError::Config(format!("failed to build CoinGecko client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(CoinGeckoConfig::from_env()?)
    }

    fn endpoint(&self) -> String {
        format!("{}/simple/price", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoPriceFeed {
    async fn get_prices(&self, assets: &[String]) -> Result<PriceQuote> {
        let ids: HashMap<String, String> = assets
            .iter()
            .filter_map(|asset| {
                let symbol = normalize_symbol(asset);
                match coingecko_id(&symbol) {
                    Some(id) => Some((id.to_string(), symbol)),
                    None => {
                        tracing::warn!(asset = %symbol, "no CoinGecko id for asset");
                        None
                    }
                }
            })
            .collect();

        if ids.is_empty() {
            return Ok(PriceQuote::new());
        }

        let mut id_list: Vec<&str> = ids.keys().map(String::as_str).collect();
        id_list.sort_unstable();

        let mut request = self
            .client
            .get(self.endpoint())
            .query(&[("ids", id_list.join(",")), ("vs_currencies", "usd".to_string())]);
        if let Some(key) = &self.config.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RebalanceError::External(format!(
                "CoinGecko returned status {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let quote = parse_simple_price(&body, &ids)?;
        tracing::debug!(quoted = quote.len(), requested = ids.len(), "fetched CoinGecko prices");
        Ok(quote)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/ping", self.config.base_url.trim_end_matches('/'));
        match self.client.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!("CoinGecko health check failed: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &str {
        "CoinGecko"
    }
}
