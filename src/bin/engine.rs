//! Quadrant Engine
//!
//! Runs the decision cycle on a fixed cadence and serves the read-only
//! snapshot API. Without a broker gateway it runs against the paper
//! gateway, replaying bars from `PAPER_REPLAY_PATH` one per cycle.

use dotenvy::dotenv;
use quadrant::config::{get_environment, EngineConfig};
use quadrant::core::http::{start_server, AppState};
use quadrant::core::runtime::TradingRuntime;
use quadrant::core::scheduler::CycleScheduler;
use quadrant::core::snapshots::SnapshotBoard;
use quadrant::logging;
use quadrant::metrics::Metrics;
use quadrant::models::TradeEvent;
use quadrant::services::{MarketGateway, PaperGateway};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let environment = get_environment();
    info!("Starting Quadrant Engine");
    info!(environment = %environment, "Environment");

    let config = EngineConfig::load()?;
    config.require_instruments()?;
    info!(
        symbols = ?config.symbols(),
        interval = config.runtime.evaluation_interval_seconds,
        timezone = %config.timezone,
        day_start = config.trading_day_start_hour,
        "Evaluating {} every {}s",
        config.symbols().join(", "),
        config.runtime.evaluation_interval_seconds
    );

    let balance: f64 = env::var("PAPER_BALANCE")
        .ok()
        .and_then(|b| b.parse().ok())
        .unwrap_or(10_000.0);
    let paper = match env::var("PAPER_REPLAY_PATH") {
        Ok(path) => Arc::new(PaperGateway::from_replay_file(&path, balance)?),
        Err(_) => {
            warn!("PAPER_REPLAY_PATH not set - paper gateway starts without bars");
            Arc::new(PaperGateway::new(balance))
        }
    };
    for instrument in &config.instruments {
        paper
            .set_contract_size(&instrument.symbol, instrument.contract_size)
            .await;
    }
    let gateway: Arc<dyn MarketGateway> = paper.clone();

    let metrics = Arc::new(Metrics::new()?);
    let board = Arc::new(SnapshotBoard::new());

    let port = config.runtime.http_port;
    let state = AppState::new(metrics.clone(), board.clone());
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, state).await {
            error!(error = %e, "HTTP server error");
        }
    });

    let scheduler = CycleScheduler::new(config.runtime.evaluation_interval_seconds)?;
    let mut runtime = TradingRuntime::new(config, gateway, metrics, board);

    let mut trades = runtime.subscribe();
    let feed_handle = tokio::spawn(async move {
        loop {
            match trades.recv().await {
                Ok(TradeEvent::Opened { key, ticket, price, .. }) => {
                    info!(key = %key, ticket = ticket, price = price, "Trade opened");
                }
                Ok(TradeEvent::Closed { key, ticket, profit, reason, .. }) => {
                    info!(key = %key, ticket = ticket, profit = profit, reason = ?reason, "Trade closed");
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Trade feed lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let shutdown = CancellationToken::new();
    let replay_handle = {
        let paper = paper.clone();
        let shutdown = shutdown.clone();
        let interval = Duration::from_secs(scheduler.interval_seconds());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        paper.advance().await;
                    }
                }
            }
        })
    };

    runtime.connect().await?;

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutting down engine...");
            signal_token.cancel();
        }
    });

    info!("Engine started, waiting for shutdown signal...");
    scheduler.run(&mut runtime, shutdown.clone()).await;

    shutdown.cancel();
    drop(runtime);
    let _ = replay_handle.await;
    let _ = feed_handle.await;
    server_handle.abort();
    info!("Engine stopped");

    Ok(())
}
