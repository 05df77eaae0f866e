//! Derives higher-timeframe bars from the one-minute feed

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::calendar::TradingCalendar;
use crate::models::{Bar, Timeframe};

#[derive(Debug, Clone)]
struct OpenBucket {
    bar: Bar,
    constituents: usize,
    /// First base bar landed on the bucket start
    anchored: bool,
}

/// Folds completed base bars into buckets for every derived timeframe.
///
/// A bucket is emitted only once a base bar from a later bucket arrives, and
/// a closed bucket never accepts another bar. A bucket whose first base bar
/// is later than the bucket start (the leading bucket of a fetched window,
/// or one opened after a feed gap) is closed without being emitted.
#[derive(Debug, Clone)]
pub struct TimeframeAggregator {
    calendar: TradingCalendar,
    open: HashMap<Timeframe, OpenBucket>,
    last_closed: HashMap<Timeframe, DateTime<Utc>>,
    last_base: Option<DateTime<Utc>>,
}

impl TimeframeAggregator {
    pub fn new(calendar: TradingCalendar) -> Self {
        Self {
            calendar,
            open: HashMap::new(),
            last_closed: HashMap::new(),
            last_base: None,
        }
    }

    /// Push one base bar; returns the derived bars whose buckets it closed,
    /// shortest timeframe first. Incomplete, duplicate and out-of-order bars
    /// are ignored.
    pub fn push(&mut self, bar: &Bar) -> Vec<(Timeframe, Bar)> {
        if !bar.complete {
            return Vec::new();
        }
        if let Some(last) = self.last_base {
            if bar.timestamp <= last {
                debug!(
                    timestamp = %bar.timestamp,
                    last = %last,
                    "TimeframeAggregator: ignoring base bar at or before last ingested"
                );
                return Vec::new();
            }
        }
        self.last_base = Some(bar.timestamp);

        let mut closed = Vec::new();
        for timeframe in Timeframe::DERIVED {
            let start = self.calendar.bucket_start(bar.timestamp, timeframe);

            if let Some(last_closed) = self.last_closed.get(&timeframe) {
                if start <= *last_closed {
                    warn!(
                        timeframe = %timeframe,
                        bucket = %start,
                        "TimeframeAggregator: bar at {} belongs to closed {} bucket, ignored",
                        bar.timestamp,
                        timeframe
                    );
                    continue;
                }
            }

            match self.open.get_mut(&timeframe) {
                Some(bucket) if bucket.bar.timestamp == start => {
                    bucket.bar.high = bucket.bar.high.max(bar.high);
                    bucket.bar.low = bucket.bar.low.min(bar.low);
                    bucket.bar.close = bar.close;
                    bucket.bar.volume += bar.volume;
                    bucket.constituents += 1;
                }
                Some(bucket) if bucket.bar.timestamp > start => {
                    warn!(
                        timeframe = %timeframe,
                        bucket = %start,
                        open_bucket = %bucket.bar.timestamp,
                        "TimeframeAggregator: bucket start moved backwards, bar ignored"
                    );
                }
                _ => {
                    let fresh = OpenBucket {
                        bar: Bar {
                            timestamp: start,
                            ..*bar
                        },
                        constituents: 1,
                        anchored: bar.timestamp == start,
                    };
                    if let Some(done) = self.open.insert(timeframe, fresh) {
                        self.last_closed.insert(timeframe, done.bar.timestamp);
                        if !done.anchored {
                            debug!(
                                timeframe = %timeframe,
                                bucket = %done.bar.timestamp,
                                constituents = done.constituents,
                                "TimeframeAggregator: {} bucket {} missed its opening bars, not emitted",
                                timeframe,
                                done.bar.timestamp
                            );
                            continue;
                        }
                        debug!(
                            timeframe = %timeframe,
                            bucket = %done.bar.timestamp,
                            constituents = done.constituents,
                            "TimeframeAggregator: closed bucket"
                        );
                        closed.push((timeframe, done.bar));
                    }
                }
            }
        }
        closed
    }

    /// The still-forming bar of `timeframe`, flagged incomplete
    pub fn forming(&self, timeframe: Timeframe) -> Option<Bar> {
        self.open.get(&timeframe).map(|b| b.bar.forming())
    }

    pub fn last_base(&self) -> Option<DateTime<Utc>> {
        self.last_base
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }
}
