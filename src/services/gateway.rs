//! Market-data and order gateway interface.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AccountStatus, Bar, ClosedTrade, OrderFill, OrderRequest, Position, Quote};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("unknown symbol {0}")]
    UnknownSymbol(String),

    #[error("unknown position {0}")]
    UnknownPosition(u64),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Latest `count` base bars for `symbol`, oldest first. The last bar may
    /// still be forming and is then flagged incomplete.
    async fn fetch_base_bars(&self, symbol: &str, count: usize) -> GatewayResult<Vec<Bar>>;

    async fn quote(&self, symbol: &str) -> GatewayResult<Quote>;

    async fn account_status(&self) -> GatewayResult<AccountStatus>;

    async fn place_order(&self, request: &OrderRequest) -> GatewayResult<OrderFill>;

    async fn close_position(&self, ticket: u64) -> GatewayResult<ClosedTrade>;

    async fn open_positions(&self) -> GatewayResult<Vec<Position>>;

    /// Outcome of a position that was closed broker-side. Gateways that
    /// cannot report it return `None`.
    async fn closed_trade(&self, _ticket: u64) -> GatewayResult<Option<ClosedTrade>> {
        Ok(None)
    }
}
