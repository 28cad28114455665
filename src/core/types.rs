// Shared state types and the narrow interfaces to the market collaborators

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::TradingResult;

/// One open position as reported by the broker.
///
/// `account_price` is the price the broker attaches to the position snapshot;
/// `market_price` is the latest trade price, which may be fresher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub account_price: f64,
    pub market_price: f64,
}

/// A single OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-cycle trade decision for a symbol. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSignal {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Broker acknowledgement for a placed order.
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub status: String,
}

/// A historical filled order, used to rebuild the lot ledger at startup.
#[derive(Debug, Clone)]
pub struct FilledOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub filled_avg_price: Option<f64>,
    pub filled_qty: i64,
    pub filled_at: Option<DateTime<Utc>>,
}

/// Process-wide cache of open positions.
///
/// Writers replace the whole map; readers clone a consistent snapshot. The
/// last writer wins, there is no merging.
#[derive(Debug, Clone, Default)]
pub struct PositionCache {
    inner: Arc<RwLock<HashMap<String, Position>>>,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, positions: HashMap<String, Position>) {
        *self.inner.write().unwrap() = positions;
    }

    pub fn snapshot(&self) -> HashMap<String, Position> {
        self.inner.read().unwrap().clone()
    }

    pub fn get(&self, symbol: &str) -> Option<Position> {
        self.inner.read().unwrap().get(symbol).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }
}

/// Bounded FIFO of raw streamed payloads.
///
/// The streaming client pushes, the queue purger drains. At capacity the
/// oldest entry is evicted so the producer never blocks.
#[derive(Debug, Clone)]
pub struct InboundQueue {
    inner: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
            capacity,
        }
    }

    pub fn push(&self, payload: String) {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(payload);
    }

    /// Remove every queued payload without touching the contents.
    pub fn drain(&self) -> usize {
        let mut queue = self.inner.lock().unwrap();
        let drained = queue.len();
        queue.clear();
        drained
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Cooperative shutdown flag. Every loop checks it before each iteration.
#[derive(Debug, Clone)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Narrow interface to the brokerage REST API.
///
/// Transport, auth, and rate-limit handling live entirely behind this trait.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    async fn fetch_positions(&self) -> TradingResult<HashMap<String, Position>>;

    async fn fetch_historical_bars(&self, symbol: &str, start: NaiveDate) -> TradingResult<Vec<Bar>>;

    async fn fetch_latest_bar(&self, symbol: &str) -> TradingResult<Bar>;

    async fn place_order(&self, symbol: &str, qty: i64, side: OrderSide) -> TradingResult<OrderConfirmation>;

    async fn portfolio_value(&self) -> TradingResult<f64>;

    async fn is_market_open(&self) -> TradingResult<bool>;

    async fn fetch_filled_orders(&self) -> TradingResult<Vec<FilledOrder>>;
}

/// Narrow interface to the push market-data/order-update feed.
#[async_trait]
pub trait StreamClient: Send + Sync {
    async fn connect(&self) -> TradingResult<()>;

    /// Reconnect with internal retries; returns whether a connection was
    /// established.
    async fn connect_with_retries(&self) -> bool;

    fn is_connected(&self) -> bool;

    async fn close(&self);
}
