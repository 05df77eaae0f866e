//! Early exit on M5 closes crossing the fast average against the position

use crate::market::InstrumentSeries;
use crate::models::{Direction, Position, Timeframe};

/// Timeframe the early exit is read on
pub const EXIT_TIMEFRAME: Timeframe = Timeframe::M5;

#[derive(Debug, Clone, PartialEq)]
pub struct ExitSignal {
    pub ticket: u64,
    pub close: f64,
    pub fast: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ExitMonitor {
    enabled: bool,
}

impl ExitMonitor {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Exit signal for `position` from the latest completed M5 bar, if any
    pub fn check(&self, position: &Position, series: &InstrumentSeries) -> Option<ExitSignal> {
        if !self.enabled {
            return None;
        }
        let (bar, value) = series.latest(EXIT_TIMEFRAME)?;
        let fast = value.fast?;
        let exit = match position.direction {
            Direction::Long => bar.close < fast,
            Direction::Short => bar.close > fast,
        };
        exit.then(|| ExitSignal {
            ticket: position.ticket,
            close: bar.close,
            fast,
            reason: format!(
                "M5 close {:.5} {} fast {:.5}",
                bar.close,
                if position.direction == Direction::Long { "below" } else { "above" },
                fast
            ),
        })
    }
}
