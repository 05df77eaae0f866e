//! M30 breakout of the slow average

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::market::NewBar;
use crate::models::Direction;

/// Timeframe the breakout is read on
pub const BREAKOUT_TIMEFRAME: crate::models::Timeframe = crate::models::Timeframe::M30;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BreakoutKey {
    pub instrument: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BreakoutState {
    /// Bar index of the break while it is active
    pub active_since: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Above,
    Below,
}

fn side(close: f64, slow: f64) -> Side {
    if close >= slow {
        Side::Above
    } else {
        Side::Below
    }
}

/// Tracks the last breakout per (instrument, direction).
///
/// An up break is recorded on the first close at or above the slow average
/// after a close below it, and stays active while closes remain above. A
/// single close back below clears it. Down breaks mirror this.
#[derive(Debug, Clone, Default)]
pub struct BreakoutDetector {
    states: HashMap<BreakoutKey, BreakoutState>,
}

impl BreakoutDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step both directions with a newly completed M30 bar
    pub fn on_bar(&mut self, instrument: &str, new: &NewBar) {
        let Some(slow) = new.value.slow else {
            return;
        };
        let current = side(new.bar.close, slow);
        let previous = new
            .previous
            .and_then(|(bar, value)| value.slow.map(|s| side(bar.close, s)));
        let index = new.bar.index(new.timeframe);

        for direction in [Direction::Long, Direction::Short] {
            let (broken_to, against) = match direction {
                Direction::Long => (Side::Above, Side::Below),
                Direction::Short => (Side::Below, Side::Above),
            };
            let state = self
                .states
                .entry(BreakoutKey {
                    instrument: instrument.to_string(),
                    direction,
                })
                .or_default();

            if current == against {
                state.active_since = None;
            } else if previous == Some(against) && current == broken_to {
                state.active_since = Some(index);
                info!(
                    symbol = %instrument,
                    direction = direction.as_str(),
                    close = new.bar.close,
                    slow = slow,
                    "Breakout: {} {} break on M30 at {}",
                    instrument,
                    direction.as_str(),
                    new.bar.timestamp
                );
            }
        }
    }

    pub fn is_active(&self, instrument: &str, direction: Direction) -> bool {
        self.state(instrument, direction).active_since.is_some()
    }

    pub fn state(&self, instrument: &str, direction: Direction) -> BreakoutState {
        self.states
            .get(&BreakoutKey {
                instrument: instrument.to_string(),
                direction,
            })
            .copied()
            .unwrap_or_default()
    }
}
