//! One decision cycle: fetch, evaluate, exit, gate and place orders

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::engine::DecisionEngine;
use super::snapshots::SnapshotBoard;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::metrics::Metrics;
use crate::models::{
    AccountStatus, Bar, CloseReason, InstrumentSnapshot, Position, StrategyKey, TradeEvent,
};
use crate::risk::{build_order, GateRequest, RiskGate, RiskLimits};
use crate::services::{GatewayError, GatewayResult, MarketGateway};

const TRADE_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct TrackedPosition {
    key: StrategyKey,
    last_profit: f64,
}

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub evaluated: usize,
    pub skipped: Vec<String>,
    pub ready: usize,
    pub orders_placed: usize,
    pub orders_failed: usize,
    pub rejected: usize,
    pub exits: usize,
    pub external_closes: usize,
}

/// Owns the engine, the risk gate and the trade feed. Cycles are driven by
/// [`super::scheduler::CycleScheduler`] and never overlap: `run_cycle` takes
/// `&mut self`.
pub struct TradingRuntime {
    engine: DecisionEngine,
    risk: RiskGate,
    gateway: Arc<dyn MarketGateway>,
    metrics: Arc<Metrics>,
    board: Arc<SnapshotBoard>,
    events: broadcast::Sender<TradeEvent>,
    tracked: HashMap<u64, TrackedPosition>,
    timeout: Duration,
}

impl TradingRuntime {
    pub fn new(
        config: EngineConfig,
        gateway: Arc<dyn MarketGateway>,
        metrics: Arc<Metrics>,
        board: Arc<SnapshotBoard>,
    ) -> Self {
        let risk = RiskGate::new(RiskLimits::from_config(&config), config.calendar());
        let timeout = Duration::from_millis(config.runtime.gateway_timeout_ms);
        let (events, _) = broadcast::channel(TRADE_FEED_CAPACITY);
        Self {
            engine: DecisionEngine::new(config),
            risk,
            gateway,
            metrics,
            board,
            events,
            tracked: HashMap::new(),
            timeout,
        }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn risk(&self) -> &RiskGate {
        &self.risk
    }

    pub fn board(&self) -> Arc<SnapshotBoard> {
        self.board.clone()
    }

    /// Subscribe to opened/closed trade events
    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.events.subscribe()
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = GatewayResult<T>>,
    ) -> GatewayResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout {
                operation,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    /// Wait for a connected account, retrying with exponential backoff, then
    /// adopt positions already open for known strategies.
    pub async fn connect(&mut self) -> EngineResult<AccountStatus> {
        let gateway = self.gateway.clone();
        let timeout = self.timeout;
        let account = (|| {
            let gateway = gateway.clone();
            async move {
                let status = tokio::time::timeout(timeout, gateway.account_status())
                    .await
                    .map_err(|_| GatewayError::Timeout {
                        operation: "account_status",
                        timeout_ms: timeout.as_millis() as u64,
                    })??;
                if status.connected {
                    Ok(status)
                } else {
                    Err(GatewayError::Unavailable("account disconnected".to_string()))
                }
            }
        })
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(250))
                .with_max_times(5),
        )
        .notify(|err: &GatewayError, delay: Duration| {
            warn!(error = %err, delay_ms = delay.as_millis() as u64, "TradingRuntime: gateway not ready, retrying in {:?}", delay);
        })
        .await?;

        self.metrics
            .gateway_connected
            .set(if account.is_healthy() { 1.0 } else { 0.0 });
        info!(
            equity = account.equity,
            free_margin = account.free_margin,
            "TradingRuntime: gateway connected"
        );

        let positions = self.bounded("open_positions", self.gateway.open_positions()).await?;
        for position in positions {
            self.adopt(&position);
        }
        self.metrics.open_positions.set(self.tracked.len() as i64);
        Ok(account)
    }

    fn adopt(&mut self, position: &Position) {
        let Some(key) = position.key() else {
            debug!(ticket = position.ticket, "TradingRuntime: untagged position {} left alone", position.ticket);
            return;
        };
        if self.engine.config().instrument(&key.instrument).is_none() {
            return;
        }
        info!(
            key = %key,
            ticket = position.ticket,
            "TradingRuntime: adopting open position {} for {}",
            position.ticket,
            key
        );
        self.engine.adopt(key.clone());
        self.tracked.insert(
            position.ticket,
            TrackedPosition {
                key,
                last_profit: position.profit,
            },
        );
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one full cycle with `now` as the wall-clock reference
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> CycleReport {
        let started = Instant::now();
        self.metrics.cycles_active.inc();
        let mut report = CycleReport::default();

        let symbols = self.engine.symbols();
        let history = self.engine.config().runtime.history_bars;
        let this = &*self;
        let fetched: Vec<(String, GatewayResult<Vec<Bar>>)> =
            join_all(symbols.iter().map(|symbol| async move {
                let bars = this
                    .bounded("fetch_base_bars", this.gateway.fetch_base_bars(symbol, history))
                    .await;
                (symbol.clone(), bars)
            }))
            .await;

        let mut snapshots: Vec<InstrumentSnapshot> = Vec::with_capacity(fetched.len());
        for (symbol, bars) in fetched {
            match bars {
                Ok(bars) => {
                    if let Some(snapshot) = self.engine.process(&symbol, &bars, now) {
                        report.evaluated += 1;
                        snapshots.push(snapshot);
                    }
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "TradingRuntime: skipping {} this cycle: {}", symbol, e);
                    self.metrics.instruments_skipped_total.inc();
                    report.skipped.push(symbol);
                }
            }
        }

        self.sync_positions(now, &mut report).await;
        self.place_ready_orders(&snapshots, now, &mut report).await;

        let published: Vec<InstrumentSnapshot> = snapshots
            .iter()
            .filter_map(|s| self.engine.evaluate(&s.symbol, now))
            .collect();
        for snapshot in &published {
            debug!(symbol = %snapshot.symbol, summary = %snapshot.summary, "TradingRuntime: {}", snapshot.summary);
        }
        self.board.publish(published).await;

        let elapsed = started.elapsed();
        self.metrics.cycles_active.dec();
        self.metrics.cycles_total.inc();
        self.metrics
            .cycle_duration_seconds
            .observe(elapsed.as_secs_f64());
        self.metrics.open_positions.set(self.tracked.len() as i64);
        info!(
            evaluated = report.evaluated,
            skipped = report.skipped.len(),
            ready = report.ready,
            orders = report.orders_placed,
            exits = report.exits,
            duration_ms = elapsed.as_millis() as u64,
            "TradingRuntime: cycle done in {}ms",
            elapsed.as_millis()
        );
        report
    }

    /// Reconcile tracked positions with the gateway and run early exits
    async fn sync_positions(&mut self, now: DateTime<Utc>, report: &mut CycleReport) {
        let positions = match self.bounded("open_positions", self.gateway.open_positions()).await {
            Ok(positions) => positions,
            Err(e) => {
                warn!(error = %e, "TradingRuntime: position sync skipped: {}", e);
                return;
            }
        };

        let open: HashMap<u64, &Position> = positions.iter().map(|p| (p.ticket, p)).collect();
        let vanished: Vec<u64> = self
            .tracked
            .keys()
            .filter(|ticket| !open.contains_key(ticket))
            .copied()
            .collect();
        for ticket in vanished {
            let profit = match self.bounded("closed_trade", self.gateway.closed_trade(ticket)).await {
                Ok(Some(trade)) => Some(trade.profit),
                Ok(None) => None,
                Err(e) => {
                    warn!(ticket = ticket, error = %e, "TradingRuntime: closed trade {} lookup failed", ticket);
                    None
                }
            };
            if let Some(tracked) = self.tracked.get(&ticket) {
                let profit = profit.unwrap_or(tracked.last_profit);
                self.book_close(ticket, profit, CloseReason::External, now);
                report.external_closes += 1;
            }
        }

        for position in &positions {
            let Some(tracked) = self.tracked.get_mut(&position.ticket) else {
                continue;
            };
            tracked.last_profit = position.profit;

            let Some(signal) = self.engine.exit_signal(position) else {
                continue;
            };
            info!(
                ticket = position.ticket,
                symbol = %position.symbol,
                reason = %signal.reason,
                "TradingRuntime: early exit for {}: {}",
                position.ticket,
                signal.reason
            );
            match self
                .bounded("close_position", self.gateway.close_position(position.ticket))
                .await
            {
                Ok(trade) => {
                    self.book_close(position.ticket, trade.profit, CloseReason::EarlyExit, now);
                    report.exits += 1;
                }
                Err(e) => {
                    error!(ticket = position.ticket, error = %e, "TradingRuntime: close of {} failed: {}", position.ticket, e);
                }
            }
        }
    }

    fn book_close(&mut self, ticket: u64, profit: f64, reason: CloseReason, now: DateTime<Utc>) {
        let Some(tracked) = self.tracked.remove(&ticket) else {
            return;
        };
        self.risk.record_trade_closed(&tracked.key, profit, now);
        self.engine.release(&tracked.key);
        let label = match reason {
            CloseReason::EarlyExit => "early_exit",
            CloseReason::External => "external",
        };
        self.metrics.exits_total.with_label_values(&[label]).inc();
        let _ = self.events.send(TradeEvent::Closed {
            key: tracked.key,
            ticket,
            profit,
            reason,
            at: now,
        });
    }

    /// Current account status, or `None` when the gateway cannot say
    async fn account_status(&self) -> Option<AccountStatus> {
        match self.bounded("account_status", self.gateway.account_status()).await {
            Ok(account) => {
                self.metrics
                    .gateway_connected
                    .set(if account.is_healthy() { 1.0 } else { 0.0 });
                Some(account)
            }
            Err(e) => {
                warn!(error = %e, "TradingRuntime: account status unavailable: {}", e);
                self.metrics.gateway_connected.set(0.0);
                None
            }
        }
    }

    /// Gate every ready verdict and place at most one order per strategy.
    /// The account is re-read after each fill so later orders in the same
    /// cycle see the margin the earlier ones took.
    async fn place_ready_orders(
        &mut self,
        snapshots: &[InstrumentSnapshot],
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        let ready: Vec<StrategyKey> = snapshots
            .iter()
            .flat_map(|s| {
                s.ready_verdicts()
                    .map(move |v| StrategyKey::new(s.symbol.clone(), v.strategy))
            })
            .collect();
        if ready.is_empty() {
            return;
        }
        report.ready = ready.len();
        self.metrics.verdicts_ready_total.inc_by(ready.len() as u64);

        let mut account = self.account_status().await;

        for key in ready {
            if self.tracked.values().any(|t| t.key == key) {
                debug!(key = %key, "TradingRuntime: {} already has an open position", key);
                continue;
            }
            let quote = match self.bounded("quote", self.gateway.quote(&key.instrument)).await {
                Ok(quote) => Some(quote),
                Err(e) => {
                    warn!(key = %key, error = %e, "TradingRuntime: no quote for {}: {}", key.instrument, e);
                    None
                }
            };
            let config = self.engine.config();
            let instrument = config.instrument(&key.instrument);
            let decision = self.risk.evaluate(&GateRequest {
                key: &key,
                now,
                instrument_enabled: instrument.map_or(false, |i| i.enabled),
                pip_size: instrument.map_or(0.0001, |i| i.pip_size),
                quote: quote.as_ref(),
                account: account.as_ref(),
            });
            if !decision.allowed {
                let gate = decision.failed.map_or("unknown", |g| g.as_str());
                info!(key = %key, gate = gate, reason = %decision.reason, "TradingRuntime: {} blocked by {}: {}", key, gate, decision.reason);
                self.metrics
                    .risk_rejections_total
                    .with_label_values(&[gate])
                    .inc();
                report.rejected += 1;
                continue;
            }
            let Some(quote) = quote else {
                continue;
            };

            let order = build_order(config, &key, &quote);
            match self.bounded("place_order", self.gateway.place_order(&order)).await {
                Ok(fill) => {
                    let count = self.risk.record_order_placed(&key, now);
                    self.engine.mark_executed(&key);
                    self.tracked.insert(
                        fill.ticket,
                        TrackedPosition {
                            key: key.clone(),
                            last_profit: 0.0,
                        },
                    );
                    info!(
                        key = %key,
                        ticket = fill.ticket,
                        price = fill.price,
                        volume = fill.volume,
                        take_profit = order.take_profit,
                        stop_loss = order.stop_loss,
                        consecutive = count,
                        "TradingRuntime: {} opened ticket {} at {}",
                        key,
                        fill.ticket,
                        fill.price
                    );
                    self.metrics.orders_placed_total.inc();
                    report.orders_placed += 1;
                    account = self.account_status().await;
                    let _ = self.events.send(TradeEvent::Opened {
                        key,
                        ticket: fill.ticket,
                        direction: order.direction,
                        price: fill.price,
                        volume: fill.volume,
                        take_profit: order.take_profit,
                        stop_loss: order.stop_loss,
                        at: now,
                    });
                }
                Err(e) => {
                    error!(key = %key, error = %e, "TradingRuntime: order for {} failed: {}", key, e);
                    self.metrics.orders_failed_total.inc();
                    report.orders_failed += 1;
                }
            }
        }
    }

    /// Publish final snapshots and log the day's results per instrument
    pub async fn shutdown(&mut self) {
        let now = Utc::now();
        let symbols = self.engine.symbols();
        let snapshots: Vec<InstrumentSnapshot> = symbols
            .iter()
            .filter_map(|s| self.engine.evaluate(s, now))
            .collect();
        self.board.publish(snapshots).await;
        for symbol in &symbols {
            let pnl = self.risk.daily_pnl(symbol, now);
            info!(
                symbol = %symbol,
                realized = pnl.realized,
                wins = pnl.wins,
                losses = pnl.losses,
                "TradingRuntime: {} day realized {:+.2} ({} wins, {} losses)",
                symbol,
                pnl.realized,
                pnl.wins,
                pnl.losses
            );
        }
        info!(open_positions = self.tracked.len(), "TradingRuntime: stopped");
    }
}
