//! Unit tests for the daily bias classifier

use quadrant::market::TradingCalendar;
use quadrant::models::DailyBias;
use quadrant::signals::bias::classify;
use quadrant::signals::DailyBiasClassifier;

use crate::test_utils::{assert_close, ohlc, ts};

#[test]
fn test_dominant_lower_wick_is_directional_up() {
    // body 10, upper wick 20, lower wick 70
    let candle = ohlc(ts(2024, 3, 3, 21, 0), 100.0, 130.0, 30.0, 110.0);
    assert_eq!(classify(&candle, 0.05), DailyBias::DirectionalUp);
}

#[test]
fn test_dominant_upper_wick_is_directional_down_with_stop() {
    // body 10, upper wick 70, lower wick 10
    let candle = ohlc(ts(2024, 3, 3, 21, 0), 110.0, 180.0, 90.0, 100.0);
    let bias = classify(&candle, 0.05);
    assert!(matches!(bias, DailyBias::DirectionalDown { .. }));
    // min(open, close) - half the lower wick
    assert_close(bias.stop_level().unwrap(), 95.0);
}

#[test]
fn test_wicks_within_body_are_neutral() {
    // body 50, upper wick 10, lower wick 20
    let candle = ohlc(ts(2024, 3, 3, 21, 0), 100.0, 160.0, 80.0, 150.0);
    assert_eq!(classify(&candle, 0.05), DailyBias::Neutral);
}

#[test]
fn test_longest_wick_equal_to_body_is_neutral() {
    // body 20, upper wick 0, lower wick 20
    let bullish = ohlc(ts(2024, 3, 3, 21, 0), 100.0, 120.0, 80.0, 120.0);
    assert_eq!(classify(&bullish, 0.05), DailyBias::Neutral);
    assert_eq!(classify(&bullish, 0.0), DailyBias::Neutral);

    // bearish body 20, upper wick 20, lower wick 0
    let bearish = ohlc(ts(2024, 3, 3, 21, 0), 120.0, 140.0, 100.0, 100.0);
    assert_eq!(classify(&bearish, 0.05), DailyBias::Neutral);
}

#[test]
fn test_dominant_upper_wick_within_body_is_neutral() {
    // bearish body 50, upper wick 30, lower wick 5
    let candle = ohlc(ts(2024, 3, 3, 21, 0), 150.0, 180.0, 95.0, 100.0);
    assert_eq!(classify(&candle, 0.05), DailyBias::Neutral);
}

#[test]
fn test_wicks_within_epsilon_are_neutral() {
    // lower 70 vs upper 68: neither beats the other by 5%
    let candle = ohlc(ts(2024, 3, 3, 21, 0), 100.0, 178.0, 30.0, 110.0);
    assert_eq!(classify(&candle, 0.05), DailyBias::Neutral);
    // with no margin the longer wick wins
    assert_eq!(classify(&candle, 0.0), DailyBias::DirectionalUp);
}

#[test]
fn test_classifier_caches_per_trading_day() {
    let mut classifier = DailyBiasClassifier::new(0.05, TradingCalendar::default());
    assert_eq!(classifier.bias(), DailyBias::Neutral);
    assert!(classifier.reading().is_none());

    let up = ohlc(ts(2024, 3, 3, 21, 0), 100.0, 130.0, 30.0, 110.0);
    assert_eq!(
        classifier.on_daily_close("PAIN400", &up),
        Some(DailyBias::DirectionalUp)
    );

    // Same trading day again: kept as is
    let down = ohlc(ts(2024, 3, 3, 21, 0), 110.0, 180.0, 90.0, 100.0);
    assert_eq!(classifier.on_daily_close("PAIN400", &down), None);
    assert_eq!(classifier.bias(), DailyBias::DirectionalUp);

    // Next trading day replaces it
    let next = ohlc(ts(2024, 3, 4, 21, 0), 110.0, 180.0, 90.0, 100.0);
    assert!(classifier.on_daily_close("PAIN400", &next).is_some());
    assert!(matches!(classifier.bias(), DailyBias::DirectionalDown { .. }));
    assert_eq!(
        classifier.reading().unwrap().source_day,
        chrono::NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    );
}
