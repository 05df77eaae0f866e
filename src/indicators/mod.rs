//! Indicator computation over timeframe series

pub mod trend;

pub use trend::{calculate_ema, Ema, IndicatorEngine, FAST_PERIOD, SLOW_PERIOD};
