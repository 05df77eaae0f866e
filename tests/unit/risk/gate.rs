//! Unit tests for the pre-order risk gates

use chrono::{DateTime, Duration, Utc};
use quadrant::market::{TradingCalendar, TradingWindow};
use quadrant::models::{AccountStatus, Quote, StrategyKey, StrategyKind};
use quadrant::risk::{GateCheck, GateDecision, GateRequest, RiskGate, RiskLimits};

use crate::test_utils::ts;

const PIP: f64 = 0.0001;

fn limits() -> RiskLimits {
    RiskLimits {
        max_spread_pips: 2.0,
        daily_profit_target: Some(100.0),
        daily_loss_limit: Some(40.0),
        max_consecutive_orders: 3,
        window: None,
    }
}

fn gate(limits: RiskLimits) -> RiskGate {
    RiskGate::new(limits, TradingCalendar::default())
}

fn key() -> StrategyKey {
    StrategyKey::new("PAIN400", StrategyKind::SimpleLong)
}

fn quote(spread_pips: f64) -> Quote {
    Quote {
        bid: 1.1000,
        ask: 1.1000 + spread_pips * PIP,
        timestamp: now(),
    }
}

fn healthy() -> AccountStatus {
    AccountStatus {
        connected: true,
        equity: 1000.0,
        free_margin: 900.0,
    }
}

/// 23:00 in Bogota
fn now() -> DateTime<Utc> {
    ts(2024, 3, 5, 4, 0)
}

fn check(gate: &RiskGate, at: DateTime<Utc>, quote: Option<&Quote>, account: Option<&AccountStatus>) -> GateDecision {
    let key = key();
    gate.evaluate(&GateRequest {
        key: &key,
        now: at,
        instrument_enabled: true,
        pip_size: PIP,
        quote,
        account,
    })
}

#[test]
fn test_all_gates_pass() {
    let decision = check(&gate(limits()), now(), Some(&quote(1.0)), Some(&healthy()));
    assert!(decision.allowed);
    assert!(decision.failed.is_none());
}

#[test]
fn test_wide_spread_blocks() {
    let decision = check(&gate(limits()), now(), Some(&quote(3.0)), Some(&healthy()));
    assert_eq!(decision.failed, Some(GateCheck::Spread));

    let no_quote = check(&gate(limits()), now(), None, Some(&healthy()));
    assert_eq!(no_quote.failed, Some(GateCheck::Spread));
}

#[test]
fn test_three_losses_block_fourth_order_until_a_win() {
    let mut gate = gate(limits());
    let key = key();
    for _ in 0..3 {
        assert!(check(&gate, now(), Some(&quote(1.0)), Some(&healthy())).allowed);
        gate.record_order_placed(&key, now());
        gate.record_trade_closed(&key, -1.0, now());
    }
    let blocked = check(&gate, now(), Some(&quote(1.0)), Some(&healthy()));
    assert_eq!(blocked.failed, Some(GateCheck::ConsecutiveOrders));
    assert_eq!(gate.consecutive_orders(&key, now()), 3);

    gate.record_trade_closed(&key, 2.5, now());
    assert_eq!(gate.consecutive_orders(&key, now()), 0);
    assert!(check(&gate, now(), Some(&quote(1.0)), Some(&healthy())).allowed);

    let pnl = gate.daily_pnl("PAIN400", now());
    assert_eq!(pnl.wins, 1);
    assert_eq!(pnl.losses, 3);
    assert!((pnl.realized - -0.5).abs() < 1e-9);
}

#[test]
fn test_daily_loss_and_target() {
    let mut losing = gate(limits());
    losing.record_trade_closed(&key(), -45.0, now());
    let decision = check(&losing, now(), Some(&quote(1.0)), Some(&healthy()));
    assert_eq!(decision.failed, Some(GateCheck::DailyLoss));

    let mut winning = gate(limits());
    winning.record_trade_closed(&key(), 120.0, now());
    let decision = check(&winning, now(), Some(&quote(1.0)), Some(&healthy()));
    assert_eq!(decision.failed, Some(GateCheck::DailyTarget));

    let mut disabled = limits();
    disabled.daily_profit_target = None;
    let mut unlimited = gate(disabled);
    unlimited.record_trade_closed(&key(), 120.0, now());
    assert!(check(&unlimited, now(), Some(&quote(1.0)), Some(&healthy())).allowed);
}

#[test]
fn test_counters_reset_on_next_trading_day() {
    let mut gate = gate(limits());
    let key = key();
    for _ in 0..3 {
        gate.record_order_placed(&key, now());
    }
    gate.record_trade_closed(&key, -45.0, now());
    assert!(!check(&gate, now(), Some(&quote(1.0)), Some(&healthy())).allowed);

    let tomorrow = now() + Duration::days(1);
    assert_eq!(gate.consecutive_orders(&key, tomorrow), 0);
    assert_eq!(gate.daily_pnl("PAIN400", tomorrow).realized, 0.0);
    assert!(check(&gate, tomorrow, Some(&quote(1.0)), Some(&healthy())).allowed);
}

#[test]
fn test_trading_window_checked_first() {
    let mut limits = limits();
    limits.window = TradingWindow::parse("19:00", "06:00");
    let gate = gate(limits);

    // 12:00 in Bogota, with a bad spread as well
    let midday = ts(2024, 3, 5, 17, 0);
    let decision = check(&gate, midday, Some(&quote(5.0)), Some(&healthy()));
    assert_eq!(decision.failed, Some(GateCheck::TradingWindow));

    assert!(check(&gate, now(), Some(&quote(1.0)), Some(&healthy())).allowed);
}

#[test]
fn test_disabled_instrument_blocks() {
    let gate = gate(limits());
    let key = key();
    let q = quote(1.0);
    let account = healthy();
    let decision = gate.evaluate(&GateRequest {
        key: &key,
        now: now(),
        instrument_enabled: false,
        pip_size: PIP,
        quote: Some(&q),
        account: Some(&account),
    });
    assert_eq!(decision.failed, Some(GateCheck::InstrumentEnabled));
}

#[test]
fn test_unhealthy_account_blocks() {
    let gate = gate(limits());
    let broke = AccountStatus {
        free_margin: 0.0,
        ..healthy()
    };
    let decision = check(&gate, now(), Some(&quote(1.0)), Some(&broke));
    assert_eq!(decision.failed, Some(GateCheck::AccountHealth));

    let unknown = check(&gate, now(), Some(&quote(1.0)), None);
    assert_eq!(unknown.failed, Some(GateCheck::AccountHealth));
}
