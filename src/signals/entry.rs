//! Base-timeframe entry timing: cross of the fast average, then a pullback
//! touch that closes on the right side.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::market::NewBar;
use crate::models::{
    Bar, Direction, EntrySnapshot, EntryState, IndicatorValue, StrategyKey, Timeframe,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryConfig {
    /// Bars allowed between the cross and the qualifying touch
    pub max_bars: i64,
    /// The touch bar must also close on the trade side of the slow average
    pub touch_requires_slow_side: bool,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            max_bars: 20,
            touch_requires_slow_side: true,
        }
    }
}

/// Entry machine for one (instrument, strategy), bound to the strategy's direction
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMachine {
    direction: Direction,
    state: EntryState,
    last_index: Option<i64>,
}

/// Why a machine was forced back to idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    IndexNotIncreasing,
    CrossInFuture,
    WrongDirection,
    ExecuteOutsideReady,
}

impl EntryMachine {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            state: EntryState::Idle,
            last_index: None,
        }
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Advance on one completed base bar. `index` is the bar's absolute index.
    pub fn step(
        &mut self,
        config: &EntryConfig,
        previous: Option<(&Bar, &IndicatorValue)>,
        current: (&Bar, &IndicatorValue),
        index: i64,
    ) -> Result<EntryState, Anomaly> {
        if let Some(last) = self.last_index {
            if index <= last {
                self.state = EntryState::Idle;
                return Err(Anomaly::IndexNotIncreasing);
            }
        }
        self.last_index = Some(index);

        let (bar, value) = current;
        let long = self.direction == Direction::Long;

        self.state = match self.state {
            EntryState::Idle => match (previous, value.fast) {
                (Some((prev_bar, prev_value)), Some(fast)) => match prev_value.fast {
                    Some(prev_fast) if self.crossed(prev_bar.close, prev_fast, bar.close, fast) => {
                        if long {
                            EntryState::CrossedUp { at: index }
                        } else {
                            EntryState::CrossedDown { at: index }
                        }
                    }
                    _ => EntryState::Idle,
                },
                _ => EntryState::Idle,
            },
            EntryState::CrossedUp { at } | EntryState::CrossedDown { at } => {
                if matches!(self.state, EntryState::CrossedUp { .. }) != long {
                    self.state = EntryState::Idle;
                    return Err(Anomaly::WrongDirection);
                }
                if at > index {
                    self.state = EntryState::Idle;
                    return Err(Anomaly::CrossInFuture);
                }
                match value.fast {
                    _ if index - at > config.max_bars => EntryState::Idle,
                    Some(fast) if self.qualifies(config, bar, fast, value.slow) => {
                        if long {
                            EntryState::ReadyLong { at }
                        } else {
                            EntryState::ReadyShort { at }
                        }
                    }
                    Some(fast) if self.against(bar.close, fast) => EntryState::Idle,
                    _ => self.state,
                }
            }
            EntryState::ReadyLong { at } | EntryState::ReadyShort { at } => {
                if matches!(self.state, EntryState::ReadyLong { .. }) != long {
                    self.state = EntryState::Idle;
                    return Err(Anomaly::WrongDirection);
                }
                match value.fast {
                    _ if index - at > config.max_bars => EntryState::Idle,
                    Some(fast) if self.against(bar.close, fast) => EntryState::Idle,
                    _ => self.state,
                }
            }
            EntryState::Executed => EntryState::Executed,
        };
        Ok(self.state)
    }

    /// Ready -> Executed once the order is placed
    pub fn mark_executed(&mut self) -> Result<(), Anomaly> {
        if self.state.is_ready_for(self.direction) {
            self.state = EntryState::Executed;
            Ok(())
        } else {
            self.state = EntryState::Idle;
            Err(Anomaly::ExecuteOutsideReady)
        }
    }

    /// Bound position closed: start over
    pub fn release(&mut self) {
        self.state = EntryState::Idle;
    }

    /// Position for this strategy already open at startup
    pub fn adopt(&mut self) {
        self.state = EntryState::Executed;
    }

    fn crossed(&self, prev_close: f64, prev_fast: f64, close: f64, fast: f64) -> bool {
        match self.direction {
            Direction::Long => prev_close < prev_fast && close > fast,
            Direction::Short => prev_close > prev_fast && close < fast,
        }
    }

    fn against(&self, close: f64, fast: f64) -> bool {
        match self.direction {
            Direction::Long => close < fast,
            Direction::Short => close > fast,
        }
    }

    fn qualifies(&self, config: &EntryConfig, bar: &Bar, fast: f64, slow: Option<f64>) -> bool {
        if !bar.contains(fast) || self.against(bar.close, fast) {
            return false;
        }
        if !config.touch_requires_slow_side {
            return true;
        }
        match (self.direction, slow) {
            (Direction::Long, Some(slow)) => bar.close >= slow,
            (Direction::Short, Some(slow)) => bar.close <= slow,
            (_, None) => false,
        }
    }
}

/// Entry machines for every (instrument, strategy) pair
#[derive(Debug, Clone, Default)]
pub struct EntryTable {
    config: EntryConfig,
    machines: HashMap<StrategyKey, EntryMachine>,
}

impl EntryTable {
    pub fn new(config: EntryConfig) -> Self {
        Self {
            config,
            machines: HashMap::new(),
        }
    }

    /// Register a machine for `key` if not present
    pub fn ensure(&mut self, key: StrategyKey) {
        let direction = key.strategy.direction();
        self.machines
            .entry(key)
            .or_insert_with(|| EntryMachine::new(direction));
    }

    /// Step every machine of `instrument` with a newly completed base bar
    pub fn on_base_bar(&mut self, instrument: &str, new: &NewBar) {
        if new.timeframe != Timeframe::M1 {
            return;
        }
        let index = new.bar.index(Timeframe::M1);
        let previous = new.previous.as_ref().map(|(b, v)| (b, v));
        for (key, machine) in self
            .machines
            .iter_mut()
            .filter(|(key, _)| key.instrument == instrument)
        {
            let before = machine.state();
            match machine.step(&self.config, previous, (&new.bar, &new.value), index) {
                Ok(after) if after != before => {
                    if after.is_ready_for(machine.direction()) {
                        info!(
                            key = %key,
                            close = new.bar.close,
                            fast = ?new.value.fast,
                            slow = ?new.value.slow,
                            "Entry: {} ready at {}",
                            key,
                            new.bar.timestamp
                        );
                    } else {
                        debug!(
                            key = %key,
                            from = before.label(),
                            to = after.label(),
                            "Entry: {} {} -> {}",
                            key,
                            before.label(),
                            after.label()
                        );
                    }
                }
                Ok(_) => {}
                Err(anomaly) => {
                    warn!(
                        key = %key,
                        anomaly = ?anomaly,
                        state = before.label(),
                        "Entry: {} reset to idle after {:?}",
                        key,
                        anomaly
                    );
                }
            }
        }
    }

    pub fn state(&self, key: &StrategyKey) -> EntryState {
        self.machines.get(key).map_or(EntryState::Idle, |m| m.state())
    }

    /// Record that the order for `key` was placed
    pub fn mark_executed(&mut self, key: &StrategyKey) -> bool {
        let Some(machine) = self.machines.get_mut(key) else {
            warn!(key = %key, "Entry: mark_executed for unknown {}", key);
            return false;
        };
        match machine.mark_executed() {
            Ok(()) => true,
            Err(anomaly) => {
                warn!(key = %key, anomaly = ?anomaly, "Entry: {} reset to idle after {:?}", key, anomaly);
                false
            }
        }
    }

    /// The position bound to `key` closed
    pub fn release(&mut self, key: &StrategyKey) {
        if let Some(machine) = self.machines.get_mut(key) {
            machine.release();
        }
    }

    pub fn adopt(&mut self, key: StrategyKey) {
        self.ensure(key.clone());
        if let Some(machine) = self.machines.get_mut(&key) {
            machine.adopt();
        }
    }

    pub fn snapshot(&self, instrument: &str) -> Vec<EntrySnapshot> {
        let mut entries: Vec<EntrySnapshot> = self
            .machines
            .iter()
            .filter(|(key, _)| key.instrument == instrument)
            .map(|(key, machine)| EntrySnapshot {
                strategy: key.strategy,
                state: machine.state(),
            })
            .collect();
        entries.sort_by_key(|e| e.strategy);
        entries
    }
}
