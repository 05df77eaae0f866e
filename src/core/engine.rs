//! Per-instrument decision pipeline over flat state tables

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::market::{InstrumentSeries, TradingCalendar};
use crate::models::{
    Bar, DailyBias, Direction, InstrumentSnapshot, Position, StrategyKey, StrategyKind, Timeframe,
};
use crate::signals::entry::EntryConfig;
use crate::signals::{
    trend_filter, BreakoutDetector, DailyBiasClassifier, EntryTable, ExitMonitor, ExitSignal,
    StructureValidator, TrendAlignmentFilter,
};
use crate::strategies::{EvaluationContext, StrategyEvaluator};

/// Synchronous core of the engine: ingests base bars, keeps every derived
/// series and state table current, and produces instrument snapshots.
pub struct DecisionEngine {
    config: EngineConfig,
    calendar: TradingCalendar,
    series: HashMap<String, InstrumentSeries>,
    biases: HashMap<String, DailyBiasClassifier>,
    breakouts: BreakoutDetector,
    entries: EntryTable,
    trend: TrendAlignmentFilter,
    structure: StructureValidator,
    evaluator: StrategyEvaluator,
    exits: ExitMonitor,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        let calendar = config.calendar();
        let mut entries = EntryTable::new(EntryConfig {
            max_bars: config.signals.entry_timeout_bars,
            touch_requires_slow_side: config.signals.touch_requires_slow_side,
        });
        let mut series = HashMap::new();
        let mut biases = HashMap::new();
        for instrument in &config.instruments {
            series.insert(
                instrument.symbol.clone(),
                InstrumentSeries::new(calendar, config.runtime.max_series_len),
            );
            biases.insert(
                instrument.symbol.clone(),
                DailyBiasClassifier::new(config.signals.bias_epsilon, calendar),
            );
            for kind in StrategyKind::ALL {
                if config.strategy_enabled(&instrument.symbol, kind) {
                    entries.ensure(StrategyKey::new(instrument.symbol.clone(), kind));
                }
            }
        }
        Self {
            trend: TrendAlignmentFilter::new(config.signals.equality_is_not_trend),
            structure: StructureValidator::new(config.signals.structure_lookback),
            exits: ExitMonitor::new(config.signals.early_exit_enabled),
            evaluator: StrategyEvaluator::new(),
            breakouts: BreakoutDetector::new(),
            calendar,
            series,
            biases,
            entries,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    /// Ingest a fetched window of base bars; returns the number of new base bars
    pub fn ingest(&mut self, symbol: &str, window: &[Bar]) -> usize {
        let Some(series) = self.series.get_mut(symbol) else {
            warn!(symbol = %symbol, "DecisionEngine: bars for unconfigured instrument {} ignored", symbol);
            return 0;
        };
        let fresh = series.ingest(window);
        let mut base = 0;
        for new in &fresh {
            match new.timeframe {
                Timeframe::M1 => {
                    base += 1;
                    self.entries.on_base_bar(symbol, new);
                }
                Timeframe::M30 => self.breakouts.on_bar(symbol, new),
                Timeframe::D1 => {
                    if let Some(bias) = self.biases.get_mut(symbol) {
                        bias.on_daily_close(symbol, &new.bar);
                    }
                }
                _ => {}
            }
        }
        debug!(
            symbol = %symbol,
            base = base,
            total = fresh.len(),
            "DecisionEngine: ingested {} base bars ({} bars across timeframes)",
            base,
            fresh.len()
        );
        base
    }

    /// Reference time for day-scoped reads: just after the last ingested bar,
    /// or `now` before any data.
    fn as_of(&self, symbol: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        self.series
            .get(symbol)
            .and_then(|s| s.last_base_time())
            .map_or(now, |t| t + Duration::minutes(1))
    }

    /// Evaluate every enabled strategy for `symbol`
    pub fn evaluate(&self, symbol: &str, now: DateTime<Utc>) -> Option<InstrumentSnapshot> {
        let series = self.series.get(symbol)?;
        let as_of = self.as_of(symbol, now);

        let bias = self
            .biases
            .get(symbol)
            .map_or(DailyBias::Neutral, |b| b.bias());
        let trend = self.trend.readings(series);
        let structure = self.structure.evaluate(series, as_of);
        let entries = self.entries.snapshot(symbol);
        let running_low = series.running_low(as_of);
        let breakout_long = self.breakouts.is_active(symbol, Direction::Long);
        let breakout_short = self.breakouts.is_active(symbol, Direction::Short);

        let ctx = EvaluationContext {
            bias,
            trend: &trend,
            breakout_long,
            breakout_short,
            structure: &structure,
            entries: &entries,
            running_low,
        };
        let verdicts: Vec<_> = StrategyKind::ALL
            .into_iter()
            .filter(|&kind| self.config.strategy_enabled(symbol, kind))
            .map(|kind| self.evaluator.evaluate(&kind.descriptor(), &ctx))
            .collect();

        let latest = series.latest(Timeframe::M1).map(|(bar, _)| *bar);
        let ready: Vec<&str> = verdicts
            .iter()
            .filter(|v| v.ready)
            .map(|v| v.strategy.as_str())
            .collect();
        let summary = format!(
            "bias={} trend=[{}] breakout={}/{} structure={} ready=[{}]",
            bias.label(),
            trend_filter::summary(&trend),
            if breakout_long { "up" } else { "-" },
            if breakout_short { "down" } else { "-" },
            if structure.passed { "pass" } else { "fail" },
            ready.join(",")
        );

        Some(InstrumentSnapshot {
            symbol: symbol.to_string(),
            evaluated_at: now,
            trading_day: self.calendar.trading_day(as_of),
            last_bar_time: latest.map(|b| b.timestamp),
            price: latest.map(|b| b.close),
            bias,
            trend,
            breakout_long,
            breakout_short,
            structure,
            running_low,
            entries,
            verdicts,
            summary,
        })
    }

    /// Ingest then evaluate
    pub fn process(
        &mut self,
        symbol: &str,
        window: &[Bar],
        now: DateTime<Utc>,
    ) -> Option<InstrumentSnapshot> {
        self.ingest(symbol, window);
        self.evaluate(symbol, now)
    }

    pub fn mark_executed(&mut self, key: &StrategyKey) -> bool {
        self.entries.mark_executed(key)
    }

    pub fn release(&mut self, key: &StrategyKey) {
        self.entries.release(key);
    }

    /// Bind an already-open position to its strategy's entry machine
    pub fn adopt(&mut self, key: StrategyKey) {
        self.entries.adopt(key);
    }

    pub fn exit_signal(&self, position: &Position) -> Option<ExitSignal> {
        let series = self.series.get(&position.symbol)?;
        self.exits.check(position, series)
    }

    pub fn series(&self, symbol: &str) -> Option<&InstrumentSeries> {
        self.series.get(symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.config.symbols()
    }
}
