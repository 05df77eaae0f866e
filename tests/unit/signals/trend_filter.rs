//! Unit tests for multi-timeframe trend alignment

use quadrant::market::{InstrumentSeries, TradingCalendar};
use quadrant::models::{Direction, Timeframe, TrendColor, TrendReading};
use quadrant::signals::trend_filter::{alignment, color, summary, TREND_TIMEFRAMES};
use quadrant::signals::TrendAlignmentFilter;

fn reading(timeframe: Timeframe, color: TrendColor) -> TrendReading {
    TrendReading {
        timeframe,
        color,
        close: Some(100.0),
        slow: Some(100.0),
    }
}

fn readings(colors: [TrendColor; 3]) -> Vec<TrendReading> {
    TREND_TIMEFRAMES
        .iter()
        .zip(colors)
        .map(|(tf, c)| reading(*tf, c))
        .collect()
}

#[test]
fn test_color_against_slow_average() {
    assert_eq!(color(101.0, 100.0, true), TrendColor::Up);
    assert_eq!(color(99.0, 100.0, true), TrendColor::Down);
    assert_eq!(color(100.0, 100.0, true), TrendColor::Flat);
    assert_eq!(color(100.0, 100.0, false), TrendColor::Up);
}

#[test]
fn test_all_up_aligns_long_only() {
    let up = readings([TrendColor::Up; 3]);
    assert!(alignment(&up, Direction::Long).0);
    assert!(!alignment(&up, Direction::Short).0);
    assert_eq!(summary(&up), "H1:up M30:up M15:up");
}

#[test]
fn test_equality_blocks_alignment() {
    let mixed = readings([TrendColor::Up, TrendColor::Up, TrendColor::Flat]);
    let (aligned, detail) = alignment(&mixed, Direction::Long);
    assert!(!aligned);
    assert_eq!(detail, "M15: flat (need up)");
    assert!(!alignment(&mixed, Direction::Short).0);
}

#[test]
fn test_unknown_timeframe_blocks_alignment() {
    let down = readings([TrendColor::Down, TrendColor::Unknown, TrendColor::Down]);
    let (aligned, detail) = alignment(&down, Direction::Short);
    assert!(!aligned);
    assert!(detail.contains("M30: unknown"));
    assert!(!alignment(&[], Direction::Long).0);
}

#[test]
fn test_readings_without_data_are_unknown() {
    let series = InstrumentSeries::new(TradingCalendar::default(), 100);
    let readings = TrendAlignmentFilter::new(true).readings(&series);
    assert_eq!(readings.len(), 3);
    assert!(readings.iter().all(|r| r.color == TrendColor::Unknown));
    assert_eq!(readings[0].timeframe, Timeframe::H1);
}
