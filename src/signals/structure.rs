//! 50% retracement of today's M15 swing contained by a recent H4 candle

use chrono::{DateTime, Utc};

use crate::market::InstrumentSeries;
use crate::models::{Bar, StructureCheck, Timeframe};

/// Minimum M15 bars since the trading-day start before a swing is defined
pub const MIN_SWING_BARS: usize = 2;

/// Candle with the largest strictly positive body; the earliest wins ties
pub fn largest_body(candles: &[Bar]) -> Option<Bar> {
    candles.iter().fold(None, |best: Option<Bar>, bar| {
        let threshold = best.map_or(0.0, |b| b.body());
        if bar.body() > threshold {
            Some(*bar)
        } else {
            best
        }
    })
}

/// 50% level of a swing
pub fn retracement_level(swing_low: f64, swing_high: f64) -> f64 {
    swing_low + 0.5 * (swing_high - swing_low)
}

/// Check `level` against the largest-body candle among `candles`
pub fn check_containment(level: f64, swing_low: f64, swing_high: f64, candles: &[Bar]) -> StructureCheck {
    let Some(candle) = largest_body(candles) else {
        return StructureCheck {
            level: Some(level),
            swing_low: Some(swing_low),
            swing_high: Some(swing_high),
            ..StructureCheck::failed(format!("no H4 candle with a body among last {}", candles.len()))
        };
    };
    let passed = candle.contains(level);
    let reason = if passed {
        format!(
            "50% level {:.5} inside H4 {} [{:.5}, {:.5}]",
            level, candle.timestamp, candle.low, candle.high
        )
    } else {
        format!(
            "50% level {:.5} outside H4 {} [{:.5}, {:.5}]",
            level, candle.timestamp, candle.low, candle.high
        )
    };
    StructureCheck {
        passed,
        level: Some(level),
        swing_low: Some(swing_low),
        swing_high: Some(swing_high),
        candle: Some(candle),
        reason,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StructureValidator {
    lookback: usize,
}

impl StructureValidator {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback: lookback.max(1),
        }
    }

    /// Evaluate the structure condition for the trading day containing `now`.
    ///
    /// The 50% level of a swing is the same whichever way it is read, so one
    /// check serves both directions.
    pub fn evaluate(&self, series: &InstrumentSeries, now: DateTime<Utc>) -> StructureCheck {
        let day_start = series.calendar().day_start(now);
        let Some(m15) = series.series(Timeframe::M15) else {
            return StructureCheck::failed("no M15 series");
        };
        let today: Vec<&Bar> = m15.since(day_start).map(|(bar, _)| bar).collect();
        if today.len() < MIN_SWING_BARS {
            return StructureCheck::failed(format!(
                "{} M15 bars today, need {}",
                today.len(),
                MIN_SWING_BARS
            ));
        }
        let swing_low = today.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let swing_high = today.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let level = retracement_level(swing_low, swing_high);

        let candles: Vec<Bar> = series
            .series(Timeframe::H4)
            .map(|s| s.last_n(self.lookback).map(|(bar, _)| *bar).collect())
            .unwrap_or_default();
        if candles.is_empty() {
            return StructureCheck {
                level: Some(level),
                swing_low: Some(swing_low),
                swing_high: Some(swing_high),
                ..StructureCheck::failed("no completed H4 candles")
            };
        }
        check_containment(level, swing_low, swing_high, &candles)
    }
}
