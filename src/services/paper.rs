//! In-memory gateway: fills at the current quote and settles protective
//! levels against incoming bars. Drives dry runs and tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::gateway::{GatewayError, GatewayResult, MarketGateway};
use crate::error::EngineResult;
use crate::models::{
    AccountStatus, Bar, ClosedTrade, Direction, OrderFill, OrderRequest, Position, Quote,
    StrategyKind,
};

#[derive(Debug, Clone)]
struct PaperPosition {
    position: Position,
    take_profit: f64,
    stop_loss: f64,
    contract_size: f64,
    /// Full notional held against free margin while open
    margin: f64,
}

impl PaperPosition {
    fn profit_at(&self, price: f64) -> f64 {
        (price - self.position.entry_price)
            * self.position.direction.sign()
            * self.position.volume
            * self.contract_size
    }
}

#[derive(Debug, Default)]
struct PaperState {
    bars: HashMap<String, Vec<Bar>>,
    replay: HashMap<String, VecDeque<Bar>>,
    quotes: HashMap<String, Quote>,
    spreads: HashMap<String, f64>,
    contract_sizes: HashMap<String, f64>,
    account: Option<AccountStatus>,
    positions: HashMap<u64, PaperPosition>,
    closed: HashMap<u64, ClosedTrade>,
    orders: Vec<OrderRequest>,
    failing: HashSet<String>,
    reject_orders: bool,
    next_ticket: u64,
}

pub struct PaperGateway {
    state: Mutex<PaperState>,
    latency: Mutex<Option<Duration>>,
}

impl Default for PaperGateway {
    fn default() -> Self {
        Self::new(10_000.0)
    }
}

impl PaperGateway {
    /// Connected account with `balance` as equity and free margin. Open
    /// positions hold their full notional against free margin.
    pub fn new(balance: f64) -> Self {
        let state = PaperState {
            account: Some(AccountStatus {
                connected: true,
                equity: balance,
                free_margin: balance,
            }),
            next_ticket: 1,
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
            latency: Mutex::new(None),
        }
    }

    /// Load replay bars from a JSON object mapping symbol to bar list
    pub fn from_replay_file(path: impl AsRef<Path>, balance: f64) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let replay: HashMap<String, Vec<Bar>> = serde_json::from_str(&raw)?;
        let mut gateway = Self::new(balance);
        let state = gateway.state.get_mut();
        for (symbol, mut bars) in replay {
            bars.sort_by_key(|b| b.timestamp);
            info!(symbol = %symbol, bars = bars.len(), "PaperGateway: loaded {} replay bars for {}", bars.len(), symbol);
            state.replay.insert(symbol, bars.into());
        }
        Ok(gateway)
    }

    pub async fn set_contract_size(&self, symbol: &str, contract_size: f64) {
        self.state
            .lock()
            .await
            .contract_sizes
            .insert(symbol.to_string(), contract_size);
    }

    /// Spread applied to quotes derived from bar closes
    pub async fn set_spread(&self, symbol: &str, spread: f64) {
        self.state
            .lock()
            .await
            .spreads
            .insert(symbol.to_string(), spread);
    }

    pub async fn set_account(&self, account: Option<AccountStatus>) {
        self.state.lock().await.account = account;
    }

    /// Make every call touching `symbol` fail
    pub async fn set_failing(&self, symbol: &str, failing: bool) {
        let mut state = self.state.lock().await;
        if failing {
            state.failing.insert(symbol.to_string());
        } else {
            state.failing.remove(symbol);
        }
    }

    pub async fn set_reject_orders(&self, reject: bool) {
        self.state.lock().await.reject_orders = reject;
    }

    /// Delay applied to every bar fetch
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().await = latency;
    }

    /// Orders received so far
    pub async fn orders(&self) -> Vec<OrderRequest> {
        self.state.lock().await.orders.clone()
    }

    pub async fn push_bars(&self, symbol: &str, bars: &[Bar]) {
        let mut state = self.state.lock().await;
        for bar in bars {
            Self::apply_bar(&mut state, symbol, *bar);
        }
    }

    /// Reveal the next replay bar of every symbol. Returns how many were revealed.
    pub async fn advance(&self) -> usize {
        let mut state = self.state.lock().await;
        let next: Vec<(String, Bar)> = state
            .replay
            .iter_mut()
            .filter_map(|(symbol, queue)| queue.pop_front().map(|bar| (symbol.clone(), bar)))
            .collect();
        for (symbol, bar) in &next {
            Self::apply_bar(&mut state, symbol, *bar);
        }
        next.len()
    }

    /// Close a position as if the broker had done it
    pub async fn close_externally(&self, ticket: u64, price: f64) -> GatewayResult<ClosedTrade> {
        let mut state = self.state.lock().await;
        Self::settle(&mut state, ticket, price)
    }

    fn apply_bar(state: &mut PaperState, symbol: &str, bar: Bar) {
        let spread = state.spreads.get(symbol).copied().unwrap_or(0.0);
        state.quotes.insert(
            symbol.to_string(),
            Quote {
                bid: bar.close,
                ask: bar.close + spread,
                timestamp: bar.timestamp,
            },
        );

        let hits: Vec<(u64, f64)> = state
            .positions
            .values()
            .filter(|p| p.position.symbol == symbol)
            .filter_map(|p| {
                let (stop_hit, target_hit) = match p.position.direction {
                    Direction::Long => (bar.low <= p.stop_loss, bar.high >= p.take_profit),
                    Direction::Short => (bar.high >= p.stop_loss, bar.low <= p.take_profit),
                };
                if stop_hit {
                    Some((p.position.ticket, p.stop_loss))
                } else if target_hit {
                    Some((p.position.ticket, p.take_profit))
                } else {
                    None
                }
            })
            .collect();
        for (ticket, price) in hits {
            if let Ok(trade) = Self::settle(state, ticket, price) {
                debug!(ticket = ticket, profit = trade.profit, "PaperGateway: protective level hit");
            }
        }

        for paper in state.positions.values_mut() {
            if paper.position.symbol == symbol {
                paper.position.profit = paper.profit_at(bar.close);
            }
        }
        state.bars.entry(symbol.to_string()).or_default().push(bar);
    }

    fn settle(state: &mut PaperState, ticket: u64, price: f64) -> GatewayResult<ClosedTrade> {
        let paper = state
            .positions
            .remove(&ticket)
            .ok_or(GatewayError::UnknownPosition(ticket))?;
        let profit = paper.profit_at(price);
        if let Some(account) = state.account.as_mut() {
            account.equity += profit;
            account.free_margin += paper.margin + profit;
        }
        let trade = ClosedTrade {
            ticket,
            symbol: paper.position.symbol.clone(),
            exit_price: price,
            profit,
            closed_at: Utc::now(),
        };
        state.closed.insert(ticket, trade.clone());
        Ok(trade)
    }

    fn check_symbol(state: &PaperState, symbol: &str) -> GatewayResult<()> {
        if state.failing.contains(symbol) {
            return Err(GatewayError::Unavailable(format!("{} feed down", symbol)));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketGateway for PaperGateway {
    async fn fetch_base_bars(&self, symbol: &str, count: usize) -> GatewayResult<Vec<Bar>> {
        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let state = self.state.lock().await;
        Self::check_symbol(&state, symbol)?;
        let bars = state
            .bars
            .get(symbol)
            .ok_or_else(|| GatewayError::UnknownSymbol(symbol.to_string()))?;
        Ok(bars[bars.len().saturating_sub(count)..].to_vec())
    }

    async fn quote(&self, symbol: &str) -> GatewayResult<Quote> {
        let state = self.state.lock().await;
        Self::check_symbol(&state, symbol)?;
        state
            .quotes
            .get(symbol)
            .copied()
            .ok_or_else(|| GatewayError::UnknownSymbol(symbol.to_string()))
    }

    async fn account_status(&self) -> GatewayResult<AccountStatus> {
        self.state
            .lock()
            .await
            .account
            .ok_or_else(|| GatewayError::Unavailable("not logged in".to_string()))
    }

    async fn place_order(&self, request: &OrderRequest) -> GatewayResult<OrderFill> {
        let mut state = self.state.lock().await;
        Self::check_symbol(&state, &request.symbol)?;
        if state.reject_orders {
            return Err(GatewayError::Rejected("trading disabled".to_string()));
        }
        let quote = state
            .quotes
            .get(&request.symbol)
            .copied()
            .ok_or_else(|| GatewayError::UnknownSymbol(request.symbol.clone()))?;
        let price = quote.entry_price(request.direction);
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        let contract_size = state
            .contract_sizes
            .get(&request.symbol)
            .copied()
            .unwrap_or(1.0);
        let margin = price * request.volume * contract_size;
        if let Some(account) = state.account.as_mut() {
            account.free_margin -= margin;
        }
        let now = Utc::now();
        state.positions.insert(
            ticket,
            PaperPosition {
                position: Position {
                    ticket,
                    symbol: request.symbol.clone(),
                    direction: request.direction,
                    volume: request.volume,
                    entry_price: price,
                    profit: 0.0,
                    strategy: StrategyKind::from_tag(&request.comment),
                    opened_at: now,
                },
                take_profit: request.take_profit,
                stop_loss: request.stop_loss,
                contract_size,
                margin,
            },
        );
        state.orders.push(request.clone());
        Ok(OrderFill {
            ticket,
            price,
            volume: request.volume,
            filled_at: now,
        })
    }

    async fn close_position(&self, ticket: u64) -> GatewayResult<ClosedTrade> {
        let mut state = self.state.lock().await;
        let (symbol, direction) = state
            .positions
            .get(&ticket)
            .map(|p| (p.position.symbol.clone(), p.position.direction))
            .ok_or(GatewayError::UnknownPosition(ticket))?;
        Self::check_symbol(&state, &symbol)?;
        let quote = state
            .quotes
            .get(&symbol)
            .copied()
            .ok_or_else(|| GatewayError::UnknownSymbol(symbol.clone()))?;
        let price = match direction {
            Direction::Long => quote.bid,
            Direction::Short => quote.ask,
        };
        Self::settle(&mut state, ticket, price)
    }

    async fn open_positions(&self) -> GatewayResult<Vec<Position>> {
        let state = self.state.lock().await;
        let mut positions: Vec<Position> =
            state.positions.values().map(|p| p.position.clone()).collect();
        positions.sort_by_key(|p| p.ticket);
        Ok(positions)
    }

    async fn closed_trade(&self, ticket: u64) -> GatewayResult<Option<ClosedTrade>> {
        Ok(self.state.lock().await.closed.get(&ticket).cloned())
    }
}
