//! Unit tests for the M30 breakout detector

use chrono::Duration;
use quadrant::market::NewBar;
use quadrant::models::{Direction, Timeframe};
use quadrant::signals::BreakoutDetector;

use crate::test_utils::{bar, day_start, value};

/// M30 bar `n` closing at `close` against a slow average of 100,
/// following a bar that closed at `prev_close`
fn m30(n: i64, prev_close: Option<f64>, close: f64) -> NewBar {
    let at = day_start() + Duration::minutes(30 * n);
    NewBar {
        timeframe: Timeframe::M30,
        bar: bar(at, close, close),
        value: value(Some(100.0), None),
        previous: prev_close.map(|c| {
            (
                bar(at - Duration::minutes(30), c, c),
                value(Some(100.0), None),
            )
        }),
    }
}

#[test]
fn test_up_break_stays_active_while_above() {
    let mut detector = BreakoutDetector::new();
    detector.on_bar("PAIN400", &m30(1, Some(99.0), 100.0));
    assert!(detector.is_active("PAIN400", Direction::Long));
    assert!(!detector.is_active("PAIN400", Direction::Short));
    let since = detector.state("PAIN400", Direction::Long).active_since;

    detector.on_bar("PAIN400", &m30(2, Some(100.0), 101.0));
    assert!(detector.is_active("PAIN400", Direction::Long));
    assert_eq!(detector.state("PAIN400", Direction::Long).active_since, since);
}

#[test]
fn test_close_back_below_clears_and_breaks_down() {
    let mut detector = BreakoutDetector::new();
    detector.on_bar("PAIN400", &m30(1, Some(99.0), 101.0));
    detector.on_bar("PAIN400", &m30(2, Some(101.0), 99.9));
    assert!(!detector.is_active("PAIN400", Direction::Long));
    assert!(detector.is_active("PAIN400", Direction::Short));
}

#[test]
fn test_no_break_without_previous_side() {
    let mut detector = BreakoutDetector::new();
    detector.on_bar("PAIN400", &m30(1, None, 105.0));
    detector.on_bar("PAIN400", &m30(2, Some(105.0), 106.0));
    assert!(!detector.is_active("PAIN400", Direction::Long));
}

#[test]
fn test_instruments_are_independent() {
    let mut detector = BreakoutDetector::new();
    detector.on_bar("PAIN400", &m30(1, Some(99.0), 101.0));
    assert!(!detector.is_active("GAIN400", Direction::Long));
}
