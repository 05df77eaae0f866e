//! Unit tests for higher-timeframe aggregation

use chrono::Duration;
use quadrant::market::{InstrumentSeries, TimeframeAggregator, TradingCalendar};
use quadrant::models::{Bar, Timeframe};

use crate::test_utils::{assert_close, bar, day_start, ramp, ts};

fn five_minutes() -> Vec<Bar> {
    (0..6)
        .map(|i| {
            let open = 100.0 + i as f64;
            bar(day_start() + Duration::minutes(i), open, open + 0.5)
        })
        .collect()
}

#[test]
fn test_bucket_emitted_when_next_bucket_starts() {
    let mut aggregator = TimeframeAggregator::new(TradingCalendar::default());
    let bars = five_minutes();

    for b in &bars[..5] {
        assert!(aggregator.push(b).is_empty());
    }

    let closed = aggregator.push(&bars[5]);
    assert_eq!(closed.len(), 1);
    let (timeframe, m5) = closed[0];
    assert_eq!(timeframe, Timeframe::M5);
    assert_eq!(m5.timestamp, day_start());
    assert_eq!(m5.open, 100.0);
    assert_eq!(m5.close, 104.5);
    assert_close(m5.high, 104.55);
    assert_close(m5.low, 99.95);
    assert_eq!(m5.volume, 50.0);
    assert!(m5.complete);
}

#[test]
fn test_forming_bar_is_flagged_incomplete() {
    let mut aggregator = TimeframeAggregator::new(TradingCalendar::default());
    for b in &five_minutes()[..3] {
        aggregator.push(b);
    }
    let forming = aggregator.forming(Timeframe::M5).unwrap();
    assert!(!forming.complete);
    assert_eq!(forming.close, 102.5);
}

#[test]
fn test_replayed_bars_are_ignored() {
    let mut aggregator = TimeframeAggregator::new(TradingCalendar::default());
    let bars = five_minutes();
    let first: Vec<_> = bars.iter().flat_map(|b| aggregator.push(b)).collect();
    assert_eq!(first.len(), 1);

    let forming = aggregator.forming(Timeframe::M5);
    let again: Vec<_> = bars.iter().flat_map(|b| aggregator.push(b)).collect();
    assert!(again.is_empty());
    assert_eq!(aggregator.forming(Timeframe::M5), forming);
}

#[test]
fn test_incomplete_bars_are_ignored() {
    let mut aggregator = TimeframeAggregator::new(TradingCalendar::default());
    let b = bar(day_start(), 100.0, 101.0).forming();
    assert!(aggregator.push(&b).is_empty());
    assert!(aggregator.last_base().is_none());
}

#[test]
fn test_day_boundary_closes_every_timeframe() {
    let mut aggregator = TimeframeAggregator::new(TradingCalendar::default());
    for b in &ramp(day_start(), 1440, 100.0, 0.01) {
        aggregator.push(b);
    }

    let next_day = day_start() + Duration::days(1);
    let closed = aggregator.push(&bar(next_day, 120.0, 120.5));
    let timeframes: Vec<Timeframe> = closed.iter().map(|(tf, _)| *tf).collect();
    assert_eq!(timeframes, Timeframe::DERIVED.to_vec());

    let (_, daily) = closed.last().unwrap();
    assert_eq!(daily.timestamp, day_start());
    assert_close(daily.open, 100.0);
    assert_close(daily.close, 114.4);
    assert_eq!(daily.volume, 14_400.0);
}

#[test]
fn test_truncated_leading_day_is_not_emitted() {
    // Trading day 2024-03-04 runs from 21:00 UTC on the 4th; only its last
    // twelve hours are fed
    let mut aggregator = TimeframeAggregator::new(TradingCalendar::default());
    let late_start = ts(2024, 3, 5, 9, 0);
    for b in &ramp(late_start, 720, 150.0, 0.01) {
        aggregator.push(b);
    }

    let closed = aggregator.push(&bar(ts(2024, 3, 5, 21, 0), 160.0, 160.5));
    let timeframes: Vec<Timeframe> = closed.iter().map(|(tf, _)| *tf).collect();
    assert!(!timeframes.contains(&Timeframe::D1));
    // 09:00 is an H4 boundary, so the intraday buckets are whole
    assert!(timeframes.contains(&Timeframe::H4));
    assert!(timeframes.contains(&Timeframe::M5));
}

#[test]
fn test_bucket_opened_mid_way_is_not_emitted() {
    let mut aggregator = TimeframeAggregator::new(TradingCalendar::default());
    let opened_late = day_start() + Duration::minutes(2);
    for b in &ramp(opened_late, 3, 100.0, 0.1) {
        assert!(aggregator.push(b).is_empty());
    }

    // The 21:00 M5 bucket is dropped; the 21:05 bucket starts on time
    let mut closed = Vec::new();
    for b in &ramp(day_start() + Duration::minutes(5), 6, 101.0, 0.1) {
        closed.extend(aggregator.push(b));
    }
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].0, Timeframe::M5);
    assert_eq!(closed[0].1.timestamp, day_start() + Duration::minutes(5));
}

#[test]
fn test_bucket_after_feed_gap_is_not_emitted() {
    let mut aggregator = TimeframeAggregator::new(TradingCalendar::default());
    for b in &five_minutes()[..5] {
        aggregator.push(b);
    }

    // 21:05 through 21:07 are missing
    let resumed = day_start() + Duration::minutes(8);
    let closed = aggregator.push(&bar(resumed, 104.0, 104.5));
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].1.timestamp, day_start());

    let closed = aggregator.push(&bar(day_start() + Duration::minutes(10), 105.0, 105.5));
    assert!(closed.is_empty());
}

#[test]
fn test_series_ingest_is_idempotent() {
    let mut series = InstrumentSeries::new(TradingCalendar::default(), 100);
    let bars = five_minutes();

    let fresh = series.ingest(&bars);
    // The M5 bar closed by the sixth base bar comes before that base bar
    assert_eq!(fresh.len(), 7);
    assert_eq!(fresh[5].timeframe, Timeframe::M5);
    assert_eq!(fresh[6].timeframe, Timeframe::M1);
    assert_eq!(fresh[6].previous.map(|(b, _)| b.timestamp), Some(bars[4].timestamp));

    assert!(series.ingest(&bars).is_empty());
    assert_eq!(series.series(Timeframe::M1).unwrap().len(), 6);
    assert_eq!(series.series(Timeframe::M5).unwrap().len(), 1);
}

#[test]
fn test_series_ingest_skips_forming_tail() {
    let mut series = InstrumentSeries::new(TradingCalendar::default(), 100);
    let mut bars = five_minutes();
    let last = bars.len() - 1;
    bars[last] = bars[last].forming();

    series.ingest(&bars);
    assert_eq!(series.last_base_time(), Some(bars[4].timestamp));
    assert!(series.latest(Timeframe::M5).is_none());
}

#[test]
fn test_running_low_covers_current_day_only() {
    let mut series = InstrumentSeries::new(TradingCalendar::default(), 100);
    series.ingest(&[
        bar(ts(2024, 3, 4, 20, 59), 90.0, 91.0),
        bar(ts(2024, 3, 4, 21, 0), 100.0, 101.0),
        bar(ts(2024, 3, 4, 21, 1), 101.0, 100.5),
    ]);
    assert_close(series.running_low(ts(2024, 3, 4, 21, 2)).unwrap(), 99.95);
    // Trading day 2024-03-03 began at 21:00 UTC on the 3rd and includes every bar
    assert_close(series.running_low(ts(2024, 3, 4, 20, 59)).unwrap(), 89.95);
}
