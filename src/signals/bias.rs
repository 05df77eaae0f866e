//! Daily bias from the previous trading day's candle anatomy

use tracing::{debug, info};

use crate::market::TradingCalendar;
use crate::models::{Bar, BiasReading, DailyBias};

/// Classify one daily candle.
///
/// A candle whose longest wick does not exceed its body carries no bias.
/// Otherwise the dominant wick must beat the other by a factor of
/// `1 + epsilon`: a dominant lower wick means buyers rejected lower prices
/// (directional up), a dominant upper wick means sellers rejected higher
/// prices (directional down).
pub fn classify(bar: &Bar, epsilon: f64) -> DailyBias {
    let body = bar.body();
    let upper = bar.upper_wick();
    let lower = bar.lower_wick();

    if upper.max(lower) <= body {
        return DailyBias::Neutral;
    }
    if lower > upper * (1.0 + epsilon) {
        DailyBias::DirectionalUp
    } else if upper > lower * (1.0 + epsilon) {
        DailyBias::DirectionalDown {
            stop_level: bar.open.min(bar.close) - 0.5 * lower,
        }
    } else {
        DailyBias::Neutral
    }
}

/// Per-instrument bias cache, recomputed only when a new daily candle completes
#[derive(Debug, Clone)]
pub struct DailyBiasClassifier {
    epsilon: f64,
    calendar: TradingCalendar,
    reading: Option<BiasReading>,
}

impl DailyBiasClassifier {
    pub fn new(epsilon: f64, calendar: TradingCalendar) -> Self {
        Self {
            epsilon,
            calendar,
            reading: None,
        }
    }

    /// Feed a completed daily candle. Returns the new bias when the candle
    /// belongs to a later trading day than the cached one.
    pub fn on_daily_close(&mut self, symbol: &str, bar: &Bar) -> Option<DailyBias> {
        let day = self.calendar.trading_day(bar.timestamp);
        if let Some(reading) = self.reading {
            if reading.source_day >= day {
                debug!(symbol = %symbol, day = %day, "DailyBias: candle for {} already classified", day);
                return None;
            }
        }
        let bias = classify(bar, self.epsilon);
        info!(
            symbol = %symbol,
            day = %day,
            bias = bias.label(),
            body = bar.body(),
            upper_wick = bar.upper_wick(),
            lower_wick = bar.lower_wick(),
            "DailyBias: {} classified {} from {} candle",
            symbol,
            bias.label(),
            day
        );
        self.reading = Some(BiasReading {
            bias,
            source_day: day,
        });
        Some(bias)
    }

    /// Current bias; neutral until a daily candle has completed
    pub fn bias(&self) -> DailyBias {
        self.reading.map_or(DailyBias::Neutral, |r| r.bias)
    }

    pub fn reading(&self) -> Option<BiasReading> {
        self.reading
    }
}
