//! Append-only bar series with attached indicator values

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

use super::aggregator::TimeframeAggregator;
use super::calendar::TradingCalendar;
use crate::indicators::IndicatorEngine;
use crate::models::{Bar, IndicatorValue, Timeframe};

/// Completed bars of one (instrument, timeframe) with their indicator values.
///
/// Storage is bounded by `capacity`; the indicator state keeps running across
/// evictions so attached values are never recomputed.
#[derive(Debug, Clone)]
pub struct TimeframeSeries {
    timeframe: Timeframe,
    bars: VecDeque<(Bar, IndicatorValue)>,
    indicators: IndicatorEngine,
    capacity: usize,
}

impl TimeframeSeries {
    pub fn new(timeframe: Timeframe, capacity: usize) -> Self {
        Self {
            timeframe,
            bars: VecDeque::new(),
            indicators: IndicatorEngine::new(),
            capacity: capacity.max(2),
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Append a completed bar and return its indicator value
    pub fn push(&mut self, bar: Bar) -> IndicatorValue {
        let value = self.indicators.update(bar.close);
        if self.bars.len() == self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back((bar, value));
        value
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn latest(&self) -> Option<&(Bar, IndicatorValue)> {
        self.bars.back()
    }

    /// Bar before the latest one
    pub fn previous(&self) -> Option<&(Bar, IndicatorValue)> {
        self.bars.len().checked_sub(2).and_then(|i| self.bars.get(i))
    }

    /// The last `n` completed bars, oldest first
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &(Bar, IndicatorValue)> {
        self.bars.iter().skip(self.bars.len().saturating_sub(n))
    }

    /// Bars opened at or after `since`, oldest first
    pub fn since(&self, since: DateTime<Utc>) -> impl Iterator<Item = &(Bar, IndicatorValue)> {
        self.bars.iter().filter(move |(bar, _)| bar.timestamp >= since)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Bar, IndicatorValue)> {
        self.bars.iter()
    }
}

/// A bar that just became available on some timeframe, with its predecessor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewBar {
    pub timeframe: Timeframe,
    pub bar: Bar,
    pub value: IndicatorValue,
    pub previous: Option<(Bar, IndicatorValue)>,
}

/// Base series plus every derived series for one instrument
#[derive(Debug, Clone)]
pub struct InstrumentSeries {
    aggregator: TimeframeAggregator,
    series: HashMap<Timeframe, TimeframeSeries>,
}

impl InstrumentSeries {
    pub fn new(calendar: TradingCalendar, capacity: usize) -> Self {
        let series = std::iter::once(Timeframe::M1)
            .chain(Timeframe::DERIVED)
            .map(|tf| (tf, TimeframeSeries::new(tf, capacity)))
            .collect();
        Self {
            aggregator: TimeframeAggregator::new(calendar),
            series,
        }
    }

    /// Ingest a window of base bars as fetched from the gateway.
    ///
    /// Only complete bars newer than the last ingested one are taken. Returns
    /// every new bar in processing order: derived bars closed by a base bar
    /// come before that base bar.
    pub fn ingest(&mut self, window: &[Bar]) -> Vec<NewBar> {
        let mut fresh: Vec<Bar> = window
            .iter()
            .filter(|b| b.complete)
            .filter(|b| self.aggregator.last_base().map_or(true, |last| b.timestamp > last))
            .copied()
            .collect();
        fresh.sort_by_key(|b| b.timestamp);
        fresh.dedup_by_key(|b| b.timestamp);

        let mut out = Vec::new();
        for bar in fresh {
            for (timeframe, derived) in self.aggregator.push(&bar) {
                out.push(self.append(timeframe, derived));
            }
            out.push(self.append(Timeframe::M1, bar));
        }
        out
    }

    fn append(&mut self, timeframe: Timeframe, bar: Bar) -> NewBar {
        let series = self
            .series
            .entry(timeframe)
            .or_insert_with(|| TimeframeSeries::new(timeframe, 2));
        let previous = series.latest().copied();
        let value = series.push(bar);
        NewBar {
            timeframe,
            bar,
            value,
            previous,
        }
    }

    pub fn series(&self, timeframe: Timeframe) -> Option<&TimeframeSeries> {
        self.series.get(&timeframe)
    }

    pub fn latest(&self, timeframe: Timeframe) -> Option<&(Bar, IndicatorValue)> {
        self.series(timeframe).and_then(|s| s.latest())
    }

    pub fn calendar(&self) -> &TradingCalendar {
        self.aggregator.calendar()
    }

    pub fn last_base_time(&self) -> Option<DateTime<Utc>> {
        self.aggregator.last_base()
    }

    pub fn forming(&self, timeframe: Timeframe) -> Option<Bar> {
        self.aggregator.forming(timeframe)
    }

    /// Lowest low of the base bars in the trading day containing `now`
    pub fn running_low(&self, now: DateTime<Utc>) -> Option<f64> {
        let day_start = self.calendar().day_start(now);
        self.series(Timeframe::M1)?
            .since(day_start)
            .map(|(bar, _)| bar.low)
            .fold(None, |acc: Option<f64>, low| Some(acc.map_or(low, |a| a.min(low))))
    }
}
