use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradebook::config::Config;
use tradebook::services::{DailyCleanup, LimitOrderMonitor, SqliteStore, SystemClock};
use tradebook::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradebook=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Starting Tradebook server on {}:{}", config.host, config.port);

    let store = Arc::new(SqliteStore::new(&config.database_path)?);
    info!("Using database at {}", config.database_path);

    let state = AppState::new(config.clone(), store, Arc::new(SystemClock));

    // Sweep pending limit orders against cached prices
    let monitor = Arc::new(LimitOrderMonitor::new(
        state.trading.clone(),
        state.prices.clone(),
        Duration::from_secs(config.scheduler.limit_sweep_interval_secs),
    ));
    monitor.spawn();

    // Purge pending limit orders at market midnight
    let cleanup = Arc::new(DailyCleanup::new(
        state.trading.clone(),
        state.clock.clone(),
        config.scheduler.market_offset(),
    ));
    cleanup.spawn();

    let app = app(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Tradebook server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    monitor.stop();
    cleanup.stop();
    Ok(())
}
