//! Bar ingestion: trading calendar, timeframe aggregation and per-timeframe series

pub mod aggregator;
pub mod calendar;
pub mod series;

pub use aggregator::TimeframeAggregator;
pub use calendar::{TradingCalendar, TradingWindow};
pub use series::{InstrumentSeries, NewBar, TimeframeSeries};
