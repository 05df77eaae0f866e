//! Decision outputs: bias, trend readings, verdicts and per-instrument snapshots

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::bar::{Bar, Timeframe};
use super::strategy::{Direction, StrategyKind};

/// Directional reading of the previous trading day's candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DailyBias {
    DirectionalUp,
    DirectionalDown { stop_level: f64 },
    Neutral,
}

impl DailyBias {
    /// Direction this bias favours, if any
    pub fn direction(&self) -> Option<Direction> {
        match self {
            DailyBias::DirectionalUp => Some(Direction::Long),
            DailyBias::DirectionalDown { .. } => Some(Direction::Short),
            DailyBias::Neutral => None,
        }
    }

    pub fn stop_level(&self) -> Option<f64> {
        match self {
            DailyBias::DirectionalDown { stop_level } => Some(*stop_level),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DailyBias::DirectionalUp => "directional_up",
            DailyBias::DirectionalDown { .. } => "directional_down",
            DailyBias::Neutral => "neutral",
        }
    }
}

/// Cached bias together with the trading day of the candle it came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasReading {
    pub bias: DailyBias,
    pub source_day: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendColor {
    Up,
    Down,
    /// Close exactly on the slow average while equality is not a trend
    Flat,
    /// No completed bar or slow average not yet seeded
    Unknown,
}

impl TrendColor {
    pub fn matches(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (TrendColor::Up, Direction::Long) | (TrendColor::Down, Direction::Short)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrendColor::Up => "up",
            TrendColor::Down => "down",
            TrendColor::Flat => "flat",
            TrendColor::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReading {
    pub timeframe: Timeframe,
    pub color: TrendColor,
    pub close: Option<f64>,
    pub slow: Option<f64>,
}

/// Result of the 50% retracement containment check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureCheck {
    pub passed: bool,
    pub level: Option<f64>,
    pub swing_low: Option<f64>,
    pub swing_high: Option<f64>,
    pub candle: Option<Bar>,
    pub reason: String,
}

impl StructureCheck {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            level: None,
            swing_low: None,
            swing_high: None,
            candle: None,
            reason: reason.into(),
        }
    }
}

/// Entry timing state of one (instrument, strategy) pair.
/// `at` is the absolute M1 index of the cross that opened the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryState {
    #[default]
    Idle,
    CrossedUp { at: i64 },
    CrossedDown { at: i64 },
    ReadyLong { at: i64 },
    ReadyShort { at: i64 },
    Executed,
}

impl EntryState {
    pub fn is_ready_for(&self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (EntryState::ReadyLong { .. }, Direction::Long)
                | (EntryState::ReadyShort { .. }, Direction::Short)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntryState::Idle => "idle",
            EntryState::CrossedUp { .. } => "crossed_up",
            EntryState::CrossedDown { .. } => "crossed_down",
            EntryState::ReadyLong { .. } => "ready_long",
            EntryState::ReadyShort { .. } => "ready_short",
            EntryState::Executed => "executed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Bias,
    Trend,
    Breakout,
    Structure,
    Entry,
    DayStop,
}

/// One line of a verdict's reason trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionReason {
    pub condition: Condition,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyVerdict {
    pub strategy: StrategyKind,
    pub direction: Direction,
    pub ready: bool,
    pub reasons: Vec<ConditionReason>,
}

impl StrategyVerdict {
    /// First failing condition, if any
    pub fn blocker(&self) -> Option<&ConditionReason> {
        self.reasons.iter().find(|r| !r.passed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub strategy: StrategyKind,
    pub state: EntryState,
}

/// Everything the engine knows about one instrument after a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    pub symbol: String,
    pub evaluated_at: DateTime<Utc>,
    pub trading_day: NaiveDate,
    pub last_bar_time: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    pub bias: DailyBias,
    pub trend: Vec<TrendReading>,
    pub breakout_long: bool,
    pub breakout_short: bool,
    pub structure: StructureCheck,
    pub running_low: Option<f64>,
    pub entries: Vec<EntrySnapshot>,
    pub verdicts: Vec<StrategyVerdict>,
    pub summary: String,
}

impl InstrumentSnapshot {
    pub fn verdict(&self, strategy: StrategyKind) -> Option<&StrategyVerdict> {
        self.verdicts.iter().find(|v| v.strategy == strategy)
    }

    pub fn ready_verdicts(&self) -> impl Iterator<Item = &StrategyVerdict> {
        self.verdicts.iter().filter(|v| v.ready)
    }
}
