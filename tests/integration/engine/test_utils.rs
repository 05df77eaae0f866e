//! Bar scenarios for engine integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use quadrant::config::{EngineConfig, InstrumentConfig};
use quadrant::core::{SnapshotBoard, TradingRuntime};
use quadrant::metrics::Metrics;
use quadrant::models::{Bar, StrategyKind};
use quadrant::services::{MarketGateway, PaperGateway};

pub const SYMBOL: &str = "PAIN400";
pub const SPREAD: f64 = 0.0001;

/// Start of trading day 2024-03-04 (16:00 Bogota)
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 21, 0, 0).unwrap()
}

pub fn bar(timestamp: DateTime<Utc>, open: f64, close: f64) -> Bar {
    Bar::new(
        open,
        open.max(close) + 0.05,
        open.min(close) - 0.05,
        close,
        10.0,
        timestamp,
    )
}

/// A complete long setup, one bar per minute:
///
/// - five trading days of steady rise from 100 to 172
/// - a sixth day that dips to 140 and recovers to 173: its candle has a
///   dominant lower wick and the dip breaks M30 below its slow average
/// - today: 130 minutes of rise, one bar closing under the fast average,
///   a bar crossing back above it, then a bar touching it and closing above.
///   The three sit in a still-forming M5 bucket, so the last closed M5 bar
///   is above its fast average.
///
/// Returns the bars and the close of the final touch bar.
pub fn long_setup() -> (Vec<Bar>, f64) {
    let mut bars = Vec::new();
    let at = |minute: i64| start() + Duration::minutes(minute);

    for m in 0..7200 {
        let open = 100.0 + 0.01 * m as f64;
        bars.push(bar(at(m), open, open + 0.01));
    }

    let dip = 32.0 / 360.0;
    let recovery = 33.0 / 1080.0;
    for t in 0..1440 {
        let (open, close) = if t < 360 {
            let open = 172.0 - dip * t as f64;
            (open, open - dip)
        } else {
            let open = 140.0 + recovery * (t - 360) as f64;
            (open, open + recovery)
        };
        bars.push(bar(at(7200 + t), open, close));
    }

    let today = 8640;
    for m in 0..130 {
        let open = 173.0 + 0.01 * m as f64;
        bars.push(bar(at(today + m), open, open + 0.01));
    }
    let peak = 173.0 + 0.01 * 130.0;

    bars.push(bar(at(today + 130), peak, peak - 0.5));
    bars.push(bar(at(today + 131), peak - 0.5, peak + 0.3));
    bars.push(Bar::new(
        peak + 0.3,
        peak + 0.5,
        peak - 0.3,
        peak + 0.4,
        10.0,
        at(today + 132),
    ));

    (bars, peak + 0.4)
}

/// `count` bars after `last`, each falling 0.5 from `from`
pub fn selloff(last: DateTime<Utc>, from: f64, count: i64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let open = from - 0.5 * i as f64;
            bar(last + Duration::minutes(i + 1), open, open - 0.5)
        })
        .collect()
}

/// Instant just after the last bar
pub fn after(bars: &[Bar]) -> DateTime<Utc> {
    bars.last().map_or_else(start, |b| b.timestamp) + Duration::minutes(1)
}

/// `count` one-minute bars rising 0.01 each from `from`
pub fn ramp(from: DateTime<Utc>, count: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let open = 100.0 + 0.01 * i as f64;
            bar(from + Duration::minutes(i as i64), open, open + 0.01)
        })
        .collect()
}

pub fn config(strategies: &[StrategyKind]) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.instruments = vec![InstrumentConfig::new(SYMBOL).with_strategies(strategies)];
    config.runtime.history_bars = 10_000;
    config.runtime.max_series_len = 10_000;
    config.runtime.gateway_timeout_ms = 1_000;
    config.validate()
}

pub async fn paper_with(bars: &[Bar]) -> Arc<PaperGateway> {
    let paper = Arc::new(PaperGateway::new(10_000.0));
    paper.set_spread(SYMBOL, SPREAD).await;
    paper.push_bars(SYMBOL, bars).await;
    paper
}

pub fn runtime(config: EngineConfig, paper: Arc<PaperGateway>) -> TradingRuntime {
    let gateway: Arc<dyn MarketGateway> = paper;
    TradingRuntime::new(
        config,
        gateway,
        Arc::new(Metrics::new().expect("metrics initialization")),
        Arc::new(SnapshotBoard::new()),
    )
}
