//! Unit tests for EMA indicator

use quadrant::indicators::{calculate_ema, Ema, IndicatorEngine, FAST_PERIOD, SLOW_PERIOD};

#[test]
fn test_ema_seeds_with_simple_average() {
    let values = calculate_ema(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
    assert_eq!(values[0], None);
    assert_eq!(values[1], None);
    assert_eq!(values[2], Some(2.0));
    // k = 0.5 for period 3
    assert_eq!(values[3], Some(3.0));
    assert_eq!(values[4], Some(4.0));
}

#[test]
fn test_ema_insufficient_data() {
    let values = calculate_ema(&[1.0; 9], 10);
    assert!(values.iter().all(Option::is_none));
}

#[test]
fn test_ema_incremental_matches_batch() {
    let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64 * 0.37).sin()).collect();
    let batch = calculate_ema(&closes, 10);
    let mut ema = Ema::new(10);
    for (close, expected) in closes.iter().zip(&batch) {
        assert_eq!(ema.update(*close), *expected);
    }
    assert_eq!(ema.period(), 10);
}

#[test]
fn test_indicator_engine_fast_seeds_before_slow() {
    let mut engine = IndicatorEngine::new();
    let mut value = engine.current();
    for i in 0..FAST_PERIOD {
        value = engine.update(100.0 + i as f64);
    }
    assert!(value.fast.is_some());
    assert!(value.slow.is_none());

    for i in FAST_PERIOD..SLOW_PERIOD {
        value = engine.update(100.0 + i as f64);
    }
    assert!(value.slow.is_some());
    assert_eq!(engine.current(), value);
}

#[test]
fn test_request_periods_only_accepts_fixed_pair() {
    assert!(IndicatorEngine::request_periods(100, 10));
    assert!(!IndicatorEngine::request_periods(50, 5));
    assert!(!IndicatorEngine::request_periods(100, 20));
}
