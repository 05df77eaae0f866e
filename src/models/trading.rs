//! Gateway-facing account, order and position types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::strategy::{Direction, StrategyKey, StrategyKind};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Entry price for a market order in `direction`
    pub fn entry_price(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.ask,
            Direction::Short => self.bid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountStatus {
    pub connected: bool,
    pub equity: f64,
    pub free_margin: f64,
}

impl AccountStatus {
    pub fn is_healthy(&self) -> bool {
        self.connected && self.equity > 0.0 && self.free_margin > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub strategy: StrategyKind,
    pub direction: Direction,
    pub volume: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub ticket: u64,
    pub price: f64,
    pub volume: f64,
    pub filled_at: DateTime<Utc>,
}

/// An open position as reported by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticket: u64,
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub entry_price: f64,
    pub profit: f64,
    /// Strategy tag carried on the order comment
    pub strategy: Option<StrategyKind>,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn key(&self) -> Option<StrategyKey> {
        self.strategy.map(|s| StrategyKey::new(self.symbol.clone(), s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub ticket: u64,
    pub symbol: String,
    pub exit_price: f64,
    pub profit: f64,
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Base-timeframe close crossed the fast average against the position
    EarlyExit,
    /// Closed broker-side (take profit, stop loss or manual)
    External,
}

/// Published on the trade feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TradeEvent {
    Opened {
        key: StrategyKey,
        ticket: u64,
        direction: Direction,
        price: f64,
        volume: f64,
        take_profit: f64,
        stop_loss: f64,
        at: DateTime<Utc>,
    },
    Closed {
        key: StrategyKey,
        ticket: u64,
        profit: f64,
        reason: CloseReason,
        at: DateTime<Utc>,
    },
}
