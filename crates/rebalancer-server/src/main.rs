//! sentiment-rebalancer HTTP Server
//!
//! Axum-based server that runs scheduled rebalance cycles and exposes the
//! sentiment, portfolio and trade history over a REST API.

mod handlers;
mod scheduler;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::{get, post}, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentiment_rebalancer::{
    exchange::{CoinGeckoPriceFeed, MockPriceFeed, PriceFeed, SimulatedChainExecutor},
    source::FixtureSampleSource,
    store::{HistoryStore, MemoryHistoryStore},
    Collaborators, PriceFeedKind, RebalanceAgent, RebalancerConfig,
};

use crate::handlers::{
    current_sentiment, health_check, portfolio, recent_trades, sentiment_history,
    trigger_rebalance,
};
use crate::state::{AppState, Desk};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = RebalancerConfig::from_env()?;
    tracing::info!("Effective configuration: {}", serde_json::to_string(&config)?);

    // Sample corpus
    let source = match &config.samples_path {
        Some(path) => FixtureSampleSource::from_path(path).await?,
        None => {
            tracing::warn!("SAMPLES_PATH not set - every asset scores from an empty corpus");
            FixtureSampleSource::default()
        }
    };

    // Price feed
    let prices: Arc<dyn PriceFeed> = match config.price_feed {
        PriceFeedKind::Mock => Arc::new(MockPriceFeed::new()),
        PriceFeedKind::CoinGecko => Arc::new(CoinGeckoPriceFeed::from_env()?),
    };
    if prices.health_check().await {
        tracing::info!("✓ Price feed {} reachable", prices.name());
    } else {
        tracing::warn!("⚠ Price feed {} not reachable - price-aware cycles will abort", prices.name());
    }

    // Trade executor
    let executor = match &config.trade_journal_path {
        Some(path) => {
            tracing::info!("Journaling trades to {}", path.display());
            SimulatedChainExecutor::new().with_journal(path.clone())
        }
        None => SimulatedChainExecutor::new(),
    };

    let store: Arc<dyn HistoryStore> = Arc::new(MemoryHistoryStore::new());

    let agent = RebalanceAgent::from_config(
        &config,
        Collaborators {
            source: Arc::new(source),
            prices,
            store: store.clone(),
            executor: Arc::new(executor),
        },
    );
    tracing::info!(
        "Agent ready: scorer={}, policy={:?}",
        agent.scorer_name(),
        agent.policy()
    );

    // Build application state
    let desk = Desk::new(agent, config.initial_holdings.clone());
    let state = AppState::new(desk, store, config);

    // Scheduled cycles
    let interval = state.config.cycle_interval_secs;
    if interval > 0 {
        scheduler::spawn(state.clone(), Duration::from_secs(interval));
        tracing::info!("Scheduled rebalance every {}s", interval);
    } else {
        tracing::warn!("CYCLE_INTERVAL_SECS=0 - scheduler disabled, use POST /api/rebalance");
    }

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health
        .route("/health", get(health_check))

        // Sentiment
        .route("/api/sentiment", get(current_sentiment))
        .route("/api/sentiment/history", get(sentiment_history))

        // Portfolio & trades
        .route("/api/portfolio", get(portfolio))
        .route("/api/trades", get(recent_trades))
        .route("/api/rebalance", post(trigger_rebalance))

        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state.clone());

    // Start server
    let addr = state.config.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 sentiment-rebalancer running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                 - Health check");
    tracing::info!("  GET  /api/sentiment          - Latest sentiment per asset");
    tracing::info!("  GET  /api/sentiment/history  - Sentiment history (?asset=&days=)");
    tracing::info!("  GET  /api/portfolio          - Portfolio snapshot");
    tracing::info!("  GET  /api/trades             - Recent trades (?limit=)");
    tracing::info!("  POST /api/rebalance          - Run a cycle now");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
