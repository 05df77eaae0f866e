//! Shared bar fixtures for unit tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use quadrant::models::{Bar, IndicatorValue};

/// UTC timestamp helper
pub fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// 16:00 in Bogota (UTC-5) on 2024-03-04: the start of trading day 2024-03-04
pub fn day_start() -> DateTime<Utc> {
    ts(2024, 3, 4, 21, 0)
}

/// Bar with a 0.05 wick on each side of the body
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

pub fn ohlc(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(open, high, low, close, 10.0, timestamp)
}

/// `count` one-minute bars from `start`, each moving `step` from the previous close
pub fn ramp(start: DateTime<Utc>, count: usize, from: f64, step: f64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let open = from + step * i as f64;
            bar(start + Duration::minutes(i as i64), open, open + step)
        })
        .collect()
}

pub fn value(slow: Option<f64>, fast: Option<f64>) -> IndicatorValue {
    IndicatorValue { slow, fast }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
