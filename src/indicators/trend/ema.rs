//! EMA (Exponential Moving Average) indicator

use tracing::warn;

use crate::models::{IndicatorValue, Timeframe};

/// Period of the slow trend average
pub const SLOW_PERIOD: usize = 100;
/// Period of the fast timing average
pub const FAST_PERIOD: usize = 10;

/// Incremental EMA seeded with the simple average of the first `period` closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Ema {
    period: usize,
    k: f64,
    seed_sum: f64,
    seen: usize,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            seen: 0,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Feed one close; returns the average once it is seeded
    pub fn update(&mut self, close: f64) -> Option<f64> {
        self.seen += 1;
        match self.value {
            Some(prev) => {
                self.value = Some(close * self.k + prev * (1.0 - self.k));
            }
            None => {
                self.seed_sum += close;
                if self.seen == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }
}

/// EMA over a whole close series, `None` until seeded
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut ema = Ema::new(period);
    closes.iter().map(|&c| ema.update(c)).collect()
}

/// Slow/fast pair attached to every bar of one timeframe series.
///
/// Periods are fixed at [`SLOW_PERIOD`] and [`FAST_PERIOD`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorEngine {
    slow: Ema,
    fast: Ema,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self {
            slow: Ema::new(SLOW_PERIOD),
            fast: Ema::new(FAST_PERIOD),
        }
    }

    pub fn update(&mut self, close: f64) -> IndicatorValue {
        IndicatorValue {
            slow: self.slow.update(close),
            fast: self.fast.update(close),
        }
    }

    pub fn current(&self) -> IndicatorValue {
        IndicatorValue {
            slow: self.slow.value(),
            fast: self.fast.value(),
        }
    }

    /// Base bars needed before the slow average of `timeframe` seeds
    pub fn warmup_base_bars(timeframe: Timeframe) -> usize {
        SLOW_PERIOD * (timeframe.to_seconds() / Timeframe::M1.to_seconds()) as usize
    }

    /// Periods cannot change at runtime; a differing request is logged and
    /// ignored. Returns whether the request matched the fixed periods.
    pub fn request_periods(slow: usize, fast: usize) -> bool {
        if slow == SLOW_PERIOD && fast == FAST_PERIOD {
            return true;
        }
        warn!(
            requested_slow = slow,
            requested_fast = fast,
            slow = SLOW_PERIOD,
            fast = FAST_PERIOD,
            "IndicatorEngine: period override {}/{} ignored, periods are fixed at {}/{}",
            slow,
            fast,
            SLOW_PERIOD,
            FAST_PERIOD
        );
        false
    }
}
