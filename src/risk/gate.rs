//! Pre-order risk gates and the counters they read

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::market::{TradingCalendar, TradingWindow};
use crate::models::{AccountStatus, Quote, StrategyKey};

/// Gates in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCheck {
    TradingWindow,
    InstrumentEnabled,
    Spread,
    DailyTarget,
    DailyLoss,
    ConsecutiveOrders,
    AccountHealth,
}

impl GateCheck {
    pub fn as_str(self) -> &'static str {
        match self {
            GateCheck::TradingWindow => "trading_window",
            GateCheck::InstrumentEnabled => "instrument_enabled",
            GateCheck::Spread => "spread",
            GateCheck::DailyTarget => "daily_target",
            GateCheck::DailyLoss => "daily_loss",
            GateCheck::ConsecutiveOrders => "consecutive_orders",
            GateCheck::AccountHealth => "account_health",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub allowed: bool,
    pub failed: Option<GateCheck>,
    pub reason: String,
}

impl GateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            failed: None,
            reason: "all gates passed".to_string(),
        }
    }

    fn block(check: GateCheck, reason: String) -> Self {
        Self {
            allowed: false,
            failed: Some(check),
            reason,
        }
    }
}

/// Inputs for one gate evaluation
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub key: &'a StrategyKey,
    pub now: DateTime<Utc>,
    pub instrument_enabled: bool,
    pub pip_size: f64,
    pub quote: Option<&'a Quote>,
    pub account: Option<&'a AccountStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskLimits {
    pub max_spread_pips: f64,
    pub daily_profit_target: Option<f64>,
    pub daily_loss_limit: Option<f64>,
    pub max_consecutive_orders: u32,
    pub window: Option<TradingWindow>,
}

impl RiskLimits {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_spread_pips: config.risk.max_spread_pips,
            daily_profit_target: config
                .risk
                .daily_target_enabled
                .then_some(config.risk.daily_profit_target),
            daily_loss_limit: config
                .risk
                .daily_stop_enabled
                .then_some(config.risk.daily_loss_limit),
            max_consecutive_orders: config.risk.max_consecutive_orders,
            window: config.trading_window(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DailyPnl {
    pub realized: f64,
    pub wins: u32,
    pub losses: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DayScoped<T> {
    day: NaiveDate,
    value: T,
}

/// Owns the consecutive-order counters and daily realized P&L.
///
/// State changes only through [`RiskGate::record_order_placed`] and
/// [`RiskGate::record_trade_closed`]; values from an earlier trading day read
/// as zero, which is how the day boundary resets them.
#[derive(Debug, Clone)]
pub struct RiskGate {
    limits: RiskLimits,
    calendar: TradingCalendar,
    consecutive: HashMap<StrategyKey, DayScoped<u32>>,
    pnl: HashMap<String, DayScoped<DailyPnl>>,
}

impl RiskGate {
    pub fn new(limits: RiskLimits, calendar: TradingCalendar) -> Self {
        Self {
            limits,
            calendar,
            consecutive: HashMap::new(),
            pnl: HashMap::new(),
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Run the gates in order, stopping at the first failure
    pub fn evaluate(&self, request: &GateRequest<'_>) -> GateDecision {
        let key = request.key;

        if let Some(window) = self.limits.window {
            let local = self.calendar.local_time(request.now);
            if !window.contains(local) {
                return GateDecision::block(
                    GateCheck::TradingWindow,
                    format!("{} outside trading window {}", local.format("%H:%M"), window),
                );
            }
        }

        if !request.instrument_enabled {
            return GateDecision::block(
                GateCheck::InstrumentEnabled,
                format!("{} disabled", key.instrument),
            );
        }

        match request.quote {
            Some(quote) => {
                let spread_pips = quote.spread() / request.pip_size;
                if !(spread_pips <= self.limits.max_spread_pips) {
                    return GateDecision::block(
                        GateCheck::Spread,
                        format!("spread {:.1} pips > max {:.1}", spread_pips, self.limits.max_spread_pips),
                    );
                }
            }
            None => {
                return GateDecision::block(GateCheck::Spread, "no quote".to_string());
            }
        }

        let pnl = self.daily_pnl(&key.instrument, request.now);
        if let Some(target) = self.limits.daily_profit_target {
            if pnl.realized >= target {
                return GateDecision::block(
                    GateCheck::DailyTarget,
                    format!("daily target reached: {:.2} >= {:.2}", pnl.realized, target),
                );
            }
        }
        if let Some(limit) = self.limits.daily_loss_limit {
            if pnl.realized <= -limit {
                return GateDecision::block(
                    GateCheck::DailyLoss,
                    format!("daily loss limit hit: {:.2} <= -{:.2}", pnl.realized, limit),
                );
            }
        }

        let count = self.consecutive_orders(key, request.now);
        if count >= self.limits.max_consecutive_orders {
            return GateDecision::block(
                GateCheck::ConsecutiveOrders,
                format!(
                    "{} consecutive orders without a win (limit {})",
                    count, self.limits.max_consecutive_orders
                ),
            );
        }

        match request.account {
            Some(account) if account.is_healthy() => GateDecision::allow(),
            Some(account) => GateDecision::block(
                GateCheck::AccountHealth,
                format!(
                    "account unhealthy: connected={} equity={:.2} free_margin={:.2}",
                    account.connected, account.equity, account.free_margin
                ),
            ),
            None => GateDecision::block(GateCheck::AccountHealth, "account status unavailable".to_string()),
        }
    }

    /// Count an order that the gateway accepted
    pub fn record_order_placed(&mut self, key: &StrategyKey, now: DateTime<Utc>) -> u32 {
        let day = self.calendar.trading_day(now);
        let entry = self
            .consecutive
            .entry(key.clone())
            .or_insert(DayScoped { day, value: 0 });
        if entry.day != day {
            *entry = DayScoped { day, value: 0 };
        }
        entry.value += 1;
        debug!(key = %key, count = entry.value, "RiskGate: {} consecutive orders for {}", entry.value, key);
        entry.value
    }

    /// Book a closed trade. A profitable close resets the strategy's counter.
    pub fn record_trade_closed(&mut self, key: &StrategyKey, profit: f64, now: DateTime<Utc>) {
        let day = self.calendar.trading_day(now);
        let entry = self
            .pnl
            .entry(key.instrument.clone())
            .or_insert(DayScoped {
                day,
                value: DailyPnl::default(),
            });
        if entry.day != day {
            *entry = DayScoped {
                day,
                value: DailyPnl::default(),
            };
        }
        entry.value.realized += profit;
        if profit > 0.0 {
            entry.value.wins += 1;
            if let Some(counter) = self.consecutive.get_mut(key) {
                counter.value = 0;
            }
        } else {
            entry.value.losses += 1;
        }
        info!(
            key = %key,
            profit = profit,
            realized = entry.value.realized,
            "RiskGate: {} closed {:+.2}, day realized {:+.2}",
            key,
            profit,
            entry.value.realized
        );
    }

    pub fn consecutive_orders(&self, key: &StrategyKey, now: DateTime<Utc>) -> u32 {
        let day = self.calendar.trading_day(now);
        self.consecutive
            .get(key)
            .filter(|c| c.day == day)
            .map_or(0, |c| c.value)
    }

    pub fn daily_pnl(&self, instrument: &str, now: DateTime<Utc>) -> DailyPnl {
        let day = self.calendar.trading_day(now);
        self.pnl
            .get(instrument)
            .filter(|p| p.day == day)
            .map_or_else(DailyPnl::default, |p| p.value)
    }
}
