//! Engine configuration: JSON file plus environment overrides, validated once
//! at startup and immutable for the rest of the run.

use std::collections::HashSet;
use std::env;
use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::indicators::IndicatorEngine;
use crate::market::{TradingCalendar, TradingWindow};
use crate::models::{StrategyKind, Timeframe};

/// Deployment environment, drives log formatting
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

/// Smallest base-bar window that seeds the slow average on the slowest trend
/// timeframe, plus one trading day for the daily bias.
pub fn min_history_bars() -> usize {
    let day = (Timeframe::D1.to_seconds() / Timeframe::M1.to_seconds()) as usize;
    IndicatorEngine::warmup_base_bars(Timeframe::H1) + day
}

const DEFAULT_TIMEZONE: &str = "America/Bogota";
const DEFAULT_DAY_START_HOUR: u32 = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub enabled: bool,
    /// Strategies allowed to run on this instrument
    pub strategies: Vec<StrategyKind>,
    pub pip_size: f64,
    pub contract_size: f64,
    /// Per-instrument lot size, falls back to `orders.lot_size`
    pub lot_size: Option<f64>,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            enabled: true,
            strategies: StrategyKind::ALL.to_vec(),
            pip_size: 0.0001,
            contract_size: 1.0,
            lot_size: None,
        }
    }
}

impl InstrumentConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    pub fn with_strategies(mut self, strategies: &[StrategyKind]) -> Self {
        self.strategies = strategies.to_vec();
        self
    }

    pub fn runs(&self, strategy: StrategyKind) -> bool {
        self.strategies.contains(&strategy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingWindowConfig {
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

impl Default for TradingWindowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "19:00".to_string(),
            end: "06:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_spread_pips: f64,
    pub daily_profit_target: f64,
    pub daily_loss_limit: f64,
    pub daily_target_enabled: bool,
    pub daily_stop_enabled: bool,
    pub max_consecutive_orders: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_spread_pips: 2.0,
            daily_profit_target: 100.0,
            daily_loss_limit: 40.0,
            daily_target_enabled: true,
            daily_stop_enabled: true,
            max_consecutive_orders: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Wick dominance margin for the daily bias
    pub bias_epsilon: f64,
    /// Number of completed H4 candles scanned for the structure check
    pub structure_lookback: usize,
    /// Base bars allowed between a cross and its touch
    pub entry_timeout_bars: i64,
    pub touch_requires_slow_side: bool,
    pub equality_is_not_trend: bool,
    pub early_exit_enabled: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            bias_epsilon: 0.05,
            structure_lookback: 3,
            entry_timeout_bars: 20,
            touch_requires_slow_side: true,
            equality_is_not_trend: true,
            early_exit_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyToggles {
    pub simple_long: bool,
    pub simple_short: bool,
    pub confirmed_long: bool,
    pub confirmed_short: bool,
}

impl Default for StrategyToggles {
    fn default() -> Self {
        Self {
            simple_long: true,
            simple_short: true,
            confirmed_long: true,
            confirmed_short: true,
        }
    }
}

impl StrategyToggles {
    pub fn is_enabled(&self, kind: StrategyKind) -> bool {
        match kind {
            StrategyKind::SimpleLong => self.simple_long,
            StrategyKind::SimpleShort => self.simple_short,
            StrategyKind::ConfirmedLong => self.confirmed_long,
            StrategyKind::ConfirmedShort => self.confirmed_short,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    pub lot_size: f64,
    pub min_lot_size: f64,
    pub max_lot_size: f64,
    /// Profit per trade, in account currency, that sets the take-profit distance
    pub trade_target_usd: f64,
    /// Stop-loss distance as a multiple of the take-profit distance
    pub stop_multiple: f64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            lot_size: 0.10,
            min_lot_size: 0.01,
            max_lot_size: 1.0,
            trade_target_usd: 2.0,
            stop_multiple: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub evaluation_interval_seconds: u64,
    pub gateway_timeout_ms: u64,
    /// Base bars requested from the gateway per cycle
    pub history_bars: usize,
    /// Bars retained per timeframe series
    pub max_series_len: usize,
    pub http_port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            evaluation_interval_seconds: 5,
            gateway_timeout_ms: 3000,
            history_bars: min_history_bars(),
            max_series_len: min_history_bars(),
            http_port: 8080,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPeriods {
    pub slow: usize,
    pub fast: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub instruments: Vec<InstrumentConfig>,
    pub timezone: String,
    pub trading_day_start_hour: u32,
    pub trading_window: TradingWindowConfig,
    pub risk: RiskConfig,
    pub signals: SignalConfig,
    pub strategies: StrategyToggles,
    pub orders: OrderConfig,
    pub runtime: RuntimeConfig,
    /// Accepted for compatibility; periods are fixed and overrides are ignored
    pub indicator_periods: Option<IndicatorPeriods>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instruments: Vec::new(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            trading_day_start_hour: DEFAULT_DAY_START_HOUR,
            trading_window: TradingWindowConfig::default(),
            risk: RiskConfig::default(),
            signals: SignalConfig::default(),
            strategies: StrategyToggles::default(),
            orders: OrderConfig::default(),
            runtime: RuntimeConfig::default(),
            indicator_periods: None,
        }
    }
}

impl EngineConfig {
    /// Load from `ENGINE_CONFIG_PATH` (if set), apply environment overrides,
    /// then validate.
    pub fn load() -> EngineResult<Self> {
        let config = match env::var("ENGINE_CONFIG_PATH") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => {
                info!("EngineConfig: ENGINE_CONFIG_PATH not set, using defaults");
                Self::default()
            }
        };
        Ok(config.with_env_overrides().validate())
    }

    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        info!(path = %path.display(), "EngineConfig: loaded {}", path.display());
        Ok(config)
    }

    pub fn from_json(raw: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply overrides from environment variables
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("EVAL_INTERVAL_SECONDS") {
            self.runtime.evaluation_interval_seconds = v;
        }
        if let Some(v) = env_parse("HTTP_PORT") {
            self.runtime.http_port = v;
        }
        if let Some(v) = env_parse("GATEWAY_TIMEOUT_MS") {
            self.runtime.gateway_timeout_ms = v;
        }
        if let Ok(tz) = env::var("ENGINE_TIMEZONE") {
            self.timezone = tz;
        }
        if let Ok(symbols) = env::var("ENGINE_SYMBOLS") {
            let known: HashSet<String> =
                self.instruments.iter().map(|i| i.symbol.clone()).collect();
            for symbol in symbols.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !known.contains(symbol) {
                    self.instruments.push(InstrumentConfig::new(symbol));
                }
            }
        }
        self
    }

    /// Clamp out-of-range values to safe defaults, logging each correction.
    pub fn validate(mut self) -> Self {
        if self.timezone.parse::<Tz>().is_err() {
            warn!(timezone = %self.timezone, "EngineConfig: unknown timezone, using {}", DEFAULT_TIMEZONE);
            self.timezone = DEFAULT_TIMEZONE.to_string();
        }
        if self.trading_day_start_hour > 23 {
            warn!(
                hour = self.trading_day_start_hour,
                "EngineConfig: trading_day_start_hour out of range, using {}",
                DEFAULT_DAY_START_HOUR
            );
            self.trading_day_start_hour = DEFAULT_DAY_START_HOUR;
        }
        if self.trading_window.enabled
            && TradingWindow::parse(&self.trading_window.start, &self.trading_window.end).is_none()
        {
            warn!(
                start = %self.trading_window.start,
                end = %self.trading_window.end,
                "EngineConfig: unparseable trading window, window check disabled"
            );
            self.trading_window.enabled = false;
        }

        let signals = SignalConfig::default();
        if !(0.0..=1.0).contains(&self.signals.bias_epsilon) {
            warn!(epsilon = self.signals.bias_epsilon, "EngineConfig: bias_epsilon outside [0, 1], using {}", signals.bias_epsilon);
            self.signals.bias_epsilon = signals.bias_epsilon;
        }
        if self.signals.structure_lookback == 0 {
            warn!("EngineConfig: structure_lookback must be > 0, using {}", signals.structure_lookback);
            self.signals.structure_lookback = signals.structure_lookback;
        }
        if self.signals.entry_timeout_bars <= 0 {
            warn!(bars = self.signals.entry_timeout_bars, "EngineConfig: entry_timeout_bars must be > 0, using {}", signals.entry_timeout_bars);
            self.signals.entry_timeout_bars = signals.entry_timeout_bars;
        }

        let risk = RiskConfig::default();
        if !(self.risk.max_spread_pips >= 0.0) {
            warn!(value = self.risk.max_spread_pips, "EngineConfig: max_spread_pips must be >= 0, using {}", risk.max_spread_pips);
            self.risk.max_spread_pips = risk.max_spread_pips;
        }
        if !(self.risk.daily_profit_target > 0.0) {
            warn!(value = self.risk.daily_profit_target, "EngineConfig: daily_profit_target must be > 0, using {}", risk.daily_profit_target);
            self.risk.daily_profit_target = risk.daily_profit_target;
        }
        if !(self.risk.daily_loss_limit > 0.0) {
            warn!(value = self.risk.daily_loss_limit, "EngineConfig: daily_loss_limit must be > 0, using {}", risk.daily_loss_limit);
            self.risk.daily_loss_limit = risk.daily_loss_limit;
        }
        if self.risk.max_consecutive_orders == 0 {
            warn!("EngineConfig: max_consecutive_orders must be > 0, using {}", risk.max_consecutive_orders);
            self.risk.max_consecutive_orders = risk.max_consecutive_orders;
        }

        let orders = OrderConfig::default();
        if !(self.orders.min_lot_size > 0.0) || self.orders.min_lot_size > self.orders.max_lot_size {
            warn!(
                min = self.orders.min_lot_size,
                max = self.orders.max_lot_size,
                "EngineConfig: invalid lot bounds, using {}..{}",
                orders.min_lot_size,
                orders.max_lot_size
            );
            self.orders.min_lot_size = orders.min_lot_size;
            self.orders.max_lot_size = orders.max_lot_size;
        }
        self.orders.lot_size = self.clamp_lot("default", self.orders.lot_size);
        if !(self.orders.trade_target_usd > 0.0) {
            warn!(value = self.orders.trade_target_usd, "EngineConfig: trade_target_usd must be > 0, using {}", orders.trade_target_usd);
            self.orders.trade_target_usd = orders.trade_target_usd;
        }
        if !(self.orders.stop_multiple > 0.0) {
            warn!(value = self.orders.stop_multiple, "EngineConfig: stop_multiple must be > 0, using {}", orders.stop_multiple);
            self.orders.stop_multiple = orders.stop_multiple;
        }

        let runtime = RuntimeConfig::default();
        if self.runtime.evaluation_interval_seconds == 0 {
            warn!("EngineConfig: evaluation_interval_seconds must be > 0, using {}", runtime.evaluation_interval_seconds);
            self.runtime.evaluation_interval_seconds = runtime.evaluation_interval_seconds;
        }
        if self.runtime.gateway_timeout_ms == 0 {
            warn!("EngineConfig: gateway_timeout_ms must be > 0, using {}", runtime.gateway_timeout_ms);
            self.runtime.gateway_timeout_ms = runtime.gateway_timeout_ms;
        }
        let warmup = min_history_bars();
        if self.runtime.history_bars < warmup {
            warn!(
                value = self.runtime.history_bars,
                "EngineConfig: history_bars cannot seed the H1 slow average, raising to {}",
                warmup
            );
            self.runtime.history_bars = warmup;
        }
        if self.runtime.max_series_len < self.runtime.history_bars {
            warn!(
                value = self.runtime.max_series_len,
                "EngineConfig: max_series_len below history_bars, raising to {}",
                self.runtime.history_bars
            );
            self.runtime.max_series_len = self.runtime.history_bars;
        }

        if let Some(periods) = self.indicator_periods.take() {
            IndicatorEngine::request_periods(periods.slow, periods.fast);
        }

        let mut seen = HashSet::new();
        let mut instruments = Vec::with_capacity(self.instruments.len());
        for mut instrument in std::mem::take(&mut self.instruments) {
            if instrument.symbol.trim().is_empty() {
                warn!("EngineConfig: instrument without symbol dropped");
                continue;
            }
            if !seen.insert(instrument.symbol.clone()) {
                warn!(symbol = %instrument.symbol, "EngineConfig: duplicate instrument {} dropped", instrument.symbol);
                continue;
            }
            let defaults = InstrumentConfig::default();
            if !(instrument.pip_size > 0.0) {
                warn!(symbol = %instrument.symbol, "EngineConfig: pip_size must be > 0, using {}", defaults.pip_size);
                instrument.pip_size = defaults.pip_size;
            }
            if !(instrument.contract_size > 0.0) {
                warn!(symbol = %instrument.symbol, "EngineConfig: contract_size must be > 0, using {}", defaults.contract_size);
                instrument.contract_size = defaults.contract_size;
            }
            if let Some(lot) = instrument.lot_size {
                instrument.lot_size = Some(self.clamp_lot(&instrument.symbol, lot));
            }
            instruments.push(instrument);
        }
        self.instruments = instruments;

        self
    }

    fn clamp_lot(&self, scope: &str, lot: f64) -> f64 {
        let clamped = if lot.is_finite() {
            lot.clamp(self.orders.min_lot_size, self.orders.max_lot_size)
        } else {
            self.orders.min_lot_size
        };
        if clamped != lot {
            warn!(scope = scope, requested = lot, clamped = clamped, "EngineConfig: lot size {} clamped to {}", lot, clamped);
        }
        clamped
    }

    pub fn calendar(&self) -> TradingCalendar {
        let tz = self.timezone.parse::<Tz>().unwrap_or(chrono_tz::America::Bogota);
        TradingCalendar::new(tz, self.trading_day_start_hour)
    }

    /// Session window, if enabled and well-formed
    pub fn trading_window(&self) -> Option<TradingWindow> {
        if !self.trading_window.enabled {
            return None;
        }
        TradingWindow::parse(&self.trading_window.start, &self.trading_window.end)
    }

    pub fn instrument(&self, symbol: &str) -> Option<&InstrumentConfig> {
        self.instruments.iter().find(|i| i.symbol == symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.instruments.iter().map(|i| i.symbol.clone()).collect()
    }

    /// Lot size used for orders on `symbol`
    pub fn lot_size_for(&self, symbol: &str) -> f64 {
        self.instrument(symbol)
            .and_then(|i| i.lot_size)
            .unwrap_or(self.orders.lot_size)
    }

    /// Whether `strategy` runs on `symbol`: globally enabled and listed for the instrument
    pub fn strategy_enabled(&self, symbol: &str, strategy: StrategyKind) -> bool {
        self.strategies.is_enabled(strategy)
            && self.instrument(symbol).map_or(false, |i| i.runs(strategy))
    }

    pub fn require_instruments(&self) -> EngineResult<()> {
        if self.instruments.is_empty() {
            return Err(EngineError::Config(
                "no instruments configured (set instruments in ENGINE_CONFIG_PATH or ENGINE_SYMBOLS)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
