//! Strategy identity and descriptors

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

/// Which higher-timeframe confirmation a strategy requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    /// Slow-average breakout on M30
    Breakout,
    /// H4 candle containing today's 50% retracement level
    Structure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    SimpleLong,
    SimpleShort,
    ConfirmedLong,
    ConfirmedShort,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::SimpleLong,
        StrategyKind::SimpleShort,
        StrategyKind::ConfirmedLong,
        StrategyKind::ConfirmedShort,
    ];

    pub fn descriptor(self) -> StrategyDescriptor {
        let (direction, confirmation) = match self {
            StrategyKind::SimpleLong => (Direction::Long, ConfirmationMode::Breakout),
            StrategyKind::SimpleShort => (Direction::Short, ConfirmationMode::Breakout),
            StrategyKind::ConfirmedLong => (Direction::Long, ConfirmationMode::Structure),
            StrategyKind::ConfirmedShort => (Direction::Short, ConfirmationMode::Structure),
        };
        StrategyDescriptor {
            kind: self,
            direction,
            confirmation,
        }
    }

    pub fn direction(self) -> Direction {
        self.descriptor().direction
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::SimpleLong => "simple_long",
            StrategyKind::SimpleShort => "simple_short",
            StrategyKind::ConfirmedLong => "confirmed_long",
            StrategyKind::ConfirmedShort => "confirmed_short",
        }
    }

    /// Parse the tag carried on broker positions
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == tag)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the generic evaluator needs to know about a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    pub kind: StrategyKind,
    pub direction: Direction,
    pub confirmation: ConfirmationMode,
}

impl StrategyDescriptor {
    /// Only the simple short strategy watches the daily stop level
    pub fn watches_day_stop(&self) -> bool {
        self.kind == StrategyKind::SimpleShort
    }
}

/// Composite key for per-(instrument, strategy) state tables
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrategyKey {
    pub instrument: String,
    pub strategy: StrategyKind,
}

impl StrategyKey {
    pub fn new(instrument: impl Into<String>, strategy: StrategyKind) -> Self {
        Self {
            instrument: instrument.into(),
            strategy,
        }
    }
}

impl std::fmt::Display for StrategyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.instrument, self.strategy)
    }
}
