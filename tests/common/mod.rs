// Common test utilities: mock collaborators and data generators
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use equity_trading_bot::{
    Bar, FilledOrder, MarketGateway, OrderConfirmation, OrderSide, Position, StreamClient,
    TradingConfig, TradingError, TradingResult,
};

/// Trading config with one-second loop intervals for fast tests.
pub fn fast_config() -> TradingConfig {
    TradingConfig {
        monitor_interval_secs: 1,
        refresh_interval_secs: 1,
        purge_interval_secs: 1,
        health_interval_secs: 1,
        closed_market_backoff_secs: 1,
        ..TradingConfig::default()
    }
}

/// In-memory market gateway with scripted state.
#[derive(Default)]
pub struct MockGateway {
    pub positions: Mutex<HashMap<String, Position>>,
    pub bars: Mutex<HashMap<String, Vec<Bar>>>,
    pub filled_orders: Mutex<Vec<FilledOrder>>,
    pub placed_orders: Mutex<Vec<(String, i64, OrderSide)>>,
    pub fail_orders: AtomicBool,
    pub market_closed: AtomicBool,
    pub portfolio_value: f64,
}

impl MockGateway {
    pub fn with_position(self, symbol: &str, quantity: i64, account_price: f64, market_price: f64) -> Self {
        self.positions.lock().unwrap().insert(
            symbol.to_string(),
            Position {
                symbol: symbol.to_string(),
                quantity,
                account_price,
                market_price,
            },
        );
        self
    }

    pub fn with_bars(self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.bars.lock().unwrap().insert(symbol.to_string(), bars);
        self
    }

    pub fn with_filled_orders(self, orders: Vec<FilledOrder>) -> Self {
        *self.filled_orders.lock().unwrap() = orders;
        self
    }

    pub fn orders_placed(&self) -> Vec<(String, i64, OrderSide)> {
        self.placed_orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketGateway for MockGateway {
    async fn fetch_positions(&self) -> TradingResult<HashMap<String, Position>> {
        Ok(self.positions.lock().unwrap().clone())
    }

    async fn fetch_historical_bars(
        &self,
        symbol: &str,
        _start: chrono::NaiveDate,
    ) -> TradingResult<Vec<Bar>> {
        Ok(self
            .bars
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_latest_bar(&self, symbol: &str) -> TradingResult<Bar> {
        self.bars
            .lock()
            .unwrap()
            .get(symbol)
            .and_then(|bars| bars.last().cloned())
            .ok_or_else(|| TradingError::InsufficientData(format!("no bars for {}", symbol)))
    }

    async fn place_order(
        &self,
        symbol: &str,
        qty: i64,
        side: OrderSide,
    ) -> TradingResult<OrderConfirmation> {
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(TradingError::OrderFailed("scripted rejection".to_string()));
        }

        let mut placed = self.placed_orders.lock().unwrap();
        placed.push((symbol.to_string(), qty, side));
        Ok(OrderConfirmation {
            order_id: format!("mock-order-{}", placed.len()),
            status: "accepted".to_string(),
        })
    }

    async fn portfolio_value(&self) -> TradingResult<f64> {
        Ok(self.portfolio_value)
    }

    async fn is_market_open(&self) -> TradingResult<bool> {
        Ok(!self.market_closed.load(Ordering::SeqCst))
    }

    async fn fetch_filled_orders(&self) -> TradingResult<Vec<FilledOrder>> {
        Ok(self.filled_orders.lock().unwrap().clone())
    }
}

/// Streaming client stub with scripted liveness.
pub struct MockStream {
    pub connected: AtomicBool,
    pub reconnect_succeeds: bool,
    pub connect_calls: AtomicUsize,
}

impl MockStream {
    pub fn connected() -> Self {
        Self {
            connected: AtomicBool::new(true),
            reconnect_succeeds: true,
            connect_calls: AtomicUsize::new(0),
        }
    }

    pub fn dead() -> Self {
        Self {
            connected: AtomicBool::new(false),
            reconnect_succeeds: false,
            connect_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StreamClient for MockStream {
    async fn connect(&self) -> TradingResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.reconnect_succeeds {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(TradingError::Stream("scripted connect failure".to_string()))
        }
    }

    async fn connect_with_retries(&self) -> bool {
        self.connect().await.is_ok()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Daily bars drifting upward with a bounded intra-bar range, noisy enough to
/// look like market data but deterministic in trend.
pub fn trending_bars(start_price: f64, count: usize, drift: f64, range: f64) -> Vec<Bar> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let start_day = Utc.with_ymd_and_hms(2025, 1, 2, 21, 0, 0).unwrap();
    let mut close = start_price;

    (0..count)
        .map(|i| {
            close += drift + rng.gen_range(-drift * 0.1..drift * 0.1);
            Bar {
                open: close - drift,
                high: close + range / 2.0,
                low: close - range / 2.0,
                close,
                volume: rng.gen_range(1_000.0..100_000.0),
                timestamp: start_day + Duration::days(i as i64),
            }
        })
        .collect()
}

/// Bars that pass the backtest gate with default settings: a steady uptrend
/// whose average true range sits inside the default volatility band.
pub fn gate_passing_bars(count: usize) -> Vec<Bar> {
    trending_bars(100.0, count, 1.0, 3.0)
}
