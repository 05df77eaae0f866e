//! Unit tests for trading-day arithmetic

use chrono::NaiveDate;
use quadrant::market::TradingCalendar;
use quadrant::models::Timeframe;

use crate::test_utils::ts;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_trading_day_rolls_at_start_hour() {
    let calendar = TradingCalendar::default();
    // 15:59 in Bogota still belongs to the previous trading day
    assert_eq!(calendar.trading_day(ts(2024, 3, 4, 20, 59)), date(2024, 3, 3));
    assert_eq!(calendar.trading_day(ts(2024, 3, 4, 21, 0)), date(2024, 3, 4));
    // Past UTC midnight, still before 16:00 local on the 5th
    assert_eq!(calendar.trading_day(ts(2024, 3, 5, 3, 0)), date(2024, 3, 4));
}

#[test]
fn test_day_start() {
    let calendar = TradingCalendar::default();
    assert_eq!(calendar.day_start(ts(2024, 3, 5, 3, 0)), ts(2024, 3, 4, 21, 0));
    assert_eq!(calendar.day_start_of(date(2024, 3, 4)), ts(2024, 3, 4, 21, 0));
}

#[test]
fn test_buckets_align_to_day_start() {
    let calendar = TradingCalendar::default();
    let at = ts(2024, 3, 5, 2, 30);
    assert_eq!(calendar.bucket_start(at, Timeframe::H4), ts(2024, 3, 5, 1, 0));
    assert_eq!(calendar.bucket_start(at, Timeframe::H1), ts(2024, 3, 5, 2, 0));
    assert_eq!(calendar.bucket_start(ts(2024, 3, 4, 21, 47), Timeframe::M30), ts(2024, 3, 4, 21, 30));
    assert_eq!(calendar.bucket_start(ts(2024, 3, 4, 21, 47), Timeframe::M5), ts(2024, 3, 4, 21, 45));
    assert_eq!(calendar.bucket_start(at, Timeframe::D1), ts(2024, 3, 4, 21, 0));
}

#[test]
fn test_utc_calendar() {
    let calendar = TradingCalendar::new(chrono_tz::UTC, 0);
    assert_eq!(calendar.trading_day(ts(2024, 3, 4, 0, 0)), date(2024, 3, 4));
    assert_eq!(calendar.day_start(ts(2024, 3, 4, 23, 59)), ts(2024, 3, 4, 0, 0));
    assert_eq!(calendar.start_hour(), 0);
}
