//! HTTP Handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sentiment_rebalancer::{
    model::normalize_symbol, CycleReport, PortfolioSnapshot, RebalanceError, SentimentLabel,
    SentimentRecord, SentimentScore, TradeRecord,
};

use crate::state::AppState;

const DEFAULT_HISTORY_DAYS: i64 = 7;
const MAX_HISTORY_DAYS: i64 = 365;
const DEFAULT_TRADE_LIMIT: usize = 5;
const MAX_TRADE_LIMIT: usize = 100;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub cycles_run: u64,
    pub tracked_assets: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SentimentView {
    pub asset: String,
    pub score: SentimentScore,

    /// Difference to the previous stored score (zero for the first one)
    pub change: Decimal,
    pub label: SentimentLabel,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub score: SentimentScore,
}

#[derive(Debug, Deserialize)]
pub struct SentimentQuery {
    pub asset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub asset: String,
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    pub limit: Option<usize>,
}

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn store_error(e: &RebalanceError) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!("History store error: {}", e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", "History store unavailable")
}

/// Build the view for the newest record, given newest-first records
fn sentiment_view(records: &[SentimentRecord]) -> Option<SentimentView> {
    let latest = records.first()?;
    let change = records
        .get(1)
        .map_or(Decimal::ZERO, |previous| latest.score.value() - previous.score.value());

    Some(SentimentView {
        asset: latest.asset.clone(),
        score: latest.score,
        change,
        label: latest.score.label(),
        timestamp: latest.timestamp,
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let cycles_run = state.cycles_run();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        cycles_run,
        tracked_assets: state.config.tracked_assets.clone(),
    })
}

/// Latest sentiment per tracked asset, or for one asset
pub async fn current_sentiment(
    State(state): State<AppState>,
    Query(query): Query<SentimentQuery>,
) -> ApiResult<Vec<SentimentView>> {
    let assets = match query.asset {
        Some(asset) => {
            let asset = normalize_symbol(&asset);
            if !state.config.tracked_assets.contains(&asset) {
                return Err(api_error(
                    StatusCode::NOT_FOUND,
                    "UNKNOWN_ASSET",
                    format!("{asset} is not tracked"),
                ));
            }
            vec![asset]
        }
        None => state.config.tracked_assets.clone(),
    };

    let mut views = Vec::with_capacity(assets.len());
    for asset in &assets {
        let records = state
            .store
            .recent_sentiment(asset, 2)
            .await
            .map_err(|e| store_error(&e))?;
        if let Some(view) = sentiment_view(&records) {
            views.push(view);
        }
    }

    Ok(Json(views))
}

/// Daily sentiment history for one asset
pub async fn sentiment_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<HistoryPoint>> {
    let days = query.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    if !(1..=MAX_HISTORY_DAYS).contains(&days) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_QUERY",
            format!("days must be between 1 and {MAX_HISTORY_DAYS}"),
        ));
    }

    let asset = normalize_symbol(&query.asset);
    let since = Utc::now() - Duration::days(days);

    let history = state
        .store
        .sentiment_history(&asset, since)
        .await
        .map_err(|e| store_error(&e))?
        .into_iter()
        .map(|r| HistoryPoint {
            date: r.date,
            timestamp: r.timestamp,
            score: r.score,
        })
        .collect();

    Ok(Json(history))
}

/// Latest portfolio snapshot, falling back to the live holdings.
///
/// `unit` says what `total_value` and the per-asset values are in. Stored
/// snapshots of native holdings are priced at the cycle's quotes (`value`)
/// unless a quote was missing. The live fallback is unpriced, so under the
/// price-aware policy it reports raw quantities (`native`).
pub async fn portfolio(State(state): State<AppState>) -> ApiResult<PortfolioSnapshot> {
    let stored = state
        .store
        .latest_portfolio()
        .await
        .map_err(|e| store_error(&e))?;

    if let Some(snapshot) = stored {
        return Ok(Json(snapshot));
    }

    let desk = state.desk.lock().await;
    Ok(Json(desk.snapshot(Utc::now())))
}

/// Most recent trades, newest first
pub async fn recent_trades(
    State(state): State<AppState>,
    Query(query): Query<TradesQuery>,
) -> ApiResult<Vec<TradeRecord>> {
    let limit = query.limit.unwrap_or(DEFAULT_TRADE_LIMIT).min(MAX_TRADE_LIMIT);

    let trades = state
        .store
        .recent_trades(limit)
        .await
        .map_err(|e| store_error(&e))?;

    Ok(Json(trades))
}

/// Run one cycle now
pub async fn trigger_rebalance(State(state): State<AppState>) -> Json<CycleReport> {
    let mut desk = state.desk.lock().await;
    tracing::info!("On-demand rebalance cycle requested");
    Json(desk.run_cycle().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(score: Decimal, minutes_ago: i64) -> SentimentRecord {
        SentimentRecord::new("BTC", SentimentScore::new(score), Utc::now() - Duration::minutes(minutes_ago))
    }

    #[test]
    fn test_sentiment_view_change() {
        let records = vec![record(dec!(0.45), 0), record(dec!(0.30), 60)];
        let view = sentiment_view(&records).unwrap();

        assert_eq!(view.change, dec!(0.15));
        assert_eq!(view.label, SentimentLabel::Bullish);
    }

    #[test]
    fn test_sentiment_view_first_record() {
        let view = sentiment_view(&[record(dec!(-0.4), 0)]).unwrap();
        assert_eq!(view.change, Decimal::ZERO);
        assert_eq!(view.label, SentimentLabel::Bearish);

        assert!(sentiment_view(&[]).is_none());
    }
}
