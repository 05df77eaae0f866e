//! Order sizing and broker-side protective levels

use crate::config::EngineConfig;
use crate::models::{Direction, OrderRequest, Quote, StrategyKey};

/// Price distance that earns `target` at `lot` lots of `contract_size`
pub fn target_distance(target: f64, contract_size: f64, lot: f64) -> f64 {
    target / (contract_size * lot)
}

/// Take-profit and stop-loss around `entry`; the stop sits `stop_multiple`
/// target distances away on the other side.
pub fn protective_levels(direction: Direction, entry: f64, distance: f64, stop_multiple: f64) -> (f64, f64) {
    let sign = direction.sign();
    (
        entry + sign * distance,
        entry - sign * distance * stop_multiple,
    )
}

/// Market order for `key` priced off `quote`
pub fn build_order(config: &EngineConfig, key: &StrategyKey, quote: &Quote) -> OrderRequest {
    let direction = key.strategy.direction();
    let lot = config.lot_size_for(&key.instrument);
    let contract_size = config
        .instrument(&key.instrument)
        .map_or(1.0, |i| i.contract_size);
    let distance = target_distance(config.orders.trade_target_usd, contract_size, lot);
    let (take_profit, stop_loss) = protective_levels(
        direction,
        quote.entry_price(direction),
        distance,
        config.orders.stop_multiple,
    );
    OrderRequest {
        symbol: key.instrument.clone(),
        strategy: key.strategy,
        direction,
        volume: lot,
        take_profit,
        stop_loss,
        comment: key.strategy.as_str().to_string(),
    }
}
