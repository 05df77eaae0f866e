//! Multi-timeframe trend alignment against the slow average

use crate::market::InstrumentSeries;
use crate::models::{Direction, Timeframe, TrendColor, TrendReading};

/// Timeframes that must agree, in the order they are reported
pub const TREND_TIMEFRAMES: [Timeframe; 3] = [Timeframe::H1, Timeframe::M30, Timeframe::M15];

/// Color of one close against its slow average
pub fn color(close: f64, slow: f64, equality_is_not_trend: bool) -> TrendColor {
    if close > slow {
        TrendColor::Up
    } else if close < slow {
        TrendColor::Down
    } else if equality_is_not_trend {
        TrendColor::Flat
    } else {
        TrendColor::Up
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrendAlignmentFilter {
    equality_is_not_trend: bool,
}

impl TrendAlignmentFilter {
    pub fn new(equality_is_not_trend: bool) -> Self {
        Self {
            equality_is_not_trend,
        }
    }

    /// Read the latest completed bar of every checked timeframe
    pub fn readings(&self, series: &InstrumentSeries) -> Vec<TrendReading> {
        TREND_TIMEFRAMES
            .iter()
            .map(|&timeframe| match series.latest(timeframe) {
                Some((bar, value)) => TrendReading {
                    timeframe,
                    color: value
                        .slow
                        .map_or(TrendColor::Unknown, |slow| {
                            color(bar.close, slow, self.equality_is_not_trend)
                        }),
                    close: Some(bar.close),
                    slow: value.slow,
                },
                None => TrendReading {
                    timeframe,
                    color: TrendColor::Unknown,
                    close: None,
                    slow: None,
                },
            })
            .collect()
    }
}

/// Whether every reading agrees with `direction`; the detail names each
/// timeframe that does not.
pub fn alignment(readings: &[TrendReading], direction: Direction) -> (bool, String) {
    let required = match direction {
        Direction::Long => TrendColor::Up,
        Direction::Short => TrendColor::Down,
    };
    let mismatches: Vec<String> = readings
        .iter()
        .filter(|r| !r.color.matches(direction))
        .map(|r| format!("{}: {} (need {})", r.timeframe, r.color.as_str(), required.as_str()))
        .collect();
    if readings.is_empty() {
        return (false, "no timeframes checked".to_string());
    }
    if mismatches.is_empty() {
        (true, summary(readings))
    } else {
        (false, mismatches.join(", "))
    }
}

/// "H1:up M30:up M15:flat"
pub fn summary(readings: &[TrendReading]) -> String {
    readings
        .iter()
        .map(|r| format!("{}:{}", r.timeframe, r.color.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}
