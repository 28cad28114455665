// Trading bot orchestration: four periodic loops sharing process state

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::TradingConfig;
use crate::core::engine;
use crate::core::executor::TradeExecutor;
use crate::core::ledger::LotLedger;
use crate::core::types::{
    InboundQueue, MarketGateway, OrderSide, Position, PositionCache, RunningFlag, StreamClient,
    TradeSignal,
};
use crate::error::{TradingError, TradingResult};

/// The automated position manager.
///
/// Owns the shared state (position cache, lot ledger, inbound queue, running
/// flag) and runs four loops over it: position monitoring, live data refresh,
/// queue purging, and health supervision. All loops stop cooperatively when
/// the running flag clears; each finishes its current iteration first.
pub struct TradingBot {
    gateway: Arc<dyn MarketGateway>,
    stream: Arc<dyn StreamClient>,
    executor: TradeExecutor,
    ledger: Arc<Mutex<LotLedger>>,
    positions: PositionCache,
    queue: InboundQueue,
    running: RunningFlag,
    config: TradingConfig,
}

impl TradingBot {
    pub fn new(
        gateway: Arc<dyn MarketGateway>,
        stream: Arc<dyn StreamClient>,
        queue: InboundQueue,
        config: TradingConfig,
    ) -> Self {
        let ledger = Arc::new(Mutex::new(LotLedger::new()));
        let positions = PositionCache::new();
        let executor = TradeExecutor::new(
            gateway.clone(),
            ledger.clone(),
            positions.clone(),
            config.order_qty,
        );

        Self {
            gateway,
            stream,
            executor,
            ledger,
            positions,
            queue,
            running: RunningFlag::new(),
            config,
        }
    }

    /// Shared shutdown flag, for signal handlers and supervisors.
    pub fn running(&self) -> RunningFlag {
        self.running.clone()
    }

    /// Current position cache handle.
    pub fn positions(&self) -> PositionCache {
        self.positions.clone()
    }

    /// Shared lot ledger handle.
    pub fn ledger(&self) -> Arc<Mutex<LotLedger>> {
        self.ledger.clone()
    }

    /// Rebuild the lot ledger from the broker's filled buy-order history.
    ///
    /// Replays fills oldest first, skipping duplicate prices per symbol and
    /// stopping at the per-symbol lot cap. Returns the number of lots seeded.
    pub async fn seed_ledger(&self) -> TradingResult<usize> {
        let orders = self.gateway.fetch_filled_orders().await?;
        let mut ledger = self.ledger.lock().unwrap();
        let mut seeded = 0;

        for order in orders {
            if order.side != OrderSide::Buy {
                continue;
            }
            let Some(buy_price) = order.filled_avg_price else {
                continue;
            };
            if ledger.count(&order.symbol) >= self.config.max_open_lots {
                continue;
            }
            if ledger.lots(&order.symbol).contains(&buy_price) {
                continue;
            }
            ledger.open(&order.symbol, buy_price);
            seeded += 1;
        }

        info!(seeded, "seeded lot ledger from filled order history");
        Ok(seeded)
    }

    /// Run all loops until shutdown, then report the final portfolio value.
    ///
    /// Each loop is spawned as an independent task: a failure ends only that
    /// task and is logged with its identity, while the siblings keep running
    /// until the running flag clears or they fail on their own.
    pub async fn run(self: Arc<Self>) {
        info!("🚀 starting trading loops");

        let handles = vec![
            (
                "live-data-refresher",
                tokio::spawn(supervise(
                    "live-data-refresher",
                    self.clone().refresh_live_data(),
                )),
            ),
            (
                "position-monitor",
                tokio::spawn(supervise("position-monitor", self.clone().monitor_positions())),
            ),
            (
                "queue-purger",
                tokio::spawn(supervise("queue-purger", self.clone().purge_queue())),
            ),
            (
                "health-monitor",
                tokio::spawn(supervise("health-monitor", self.clone().health_check())),
            ),
        ];

        for (name, handle) in handles {
            if let Err(join_error) = handle.await {
                error!(task = name, error = %join_error, "task panicked");
            }
        }

        info!("all trading loops stopped");
        match self.gateway.portfolio_value().await {
            Ok(value) => info!(portfolio_value = value, "final portfolio value"),
            Err(e) => warn!(error = %e, "could not fetch final portfolio value"),
        }
    }

    /// Position monitor: evaluate every held symbol and act on the decision.
    async fn monitor_positions(self: Arc<Self>) -> TradingResult<()> {
        let interval = Duration::from_secs(self.config.monitor_interval_secs);

        while self.running.is_running() {
            match self.gateway.fetch_positions().await {
                Ok(positions) if positions.is_empty() => {
                    info!("no positions to monitor");
                }
                Ok(positions) => {
                    self.positions.replace(positions.clone());
                    self.evaluate_positions(&positions).await;
                }
                Err(e) => error!(error = %e, "failed to fetch positions"),
            }

            sleep(interval).await;
        }

        Ok(())
    }

    async fn evaluate_positions(&self, positions: &HashMap<String, Position>) {
        for (symbol, position) in positions {
            debug!(
                %symbol,
                quantity = position.quantity,
                market_price = position.market_price,
                "monitoring position"
            );

            let decision = self.evaluate_symbol(symbol, position).await;
            if decision == TradeSignal::Hold {
                continue;
            }

            if let Err(e) = self.executor.execute(decision, symbol).await {
                error!(%symbol, ?decision, error = %e, "trade execution failed");
            }
        }
    }

    /// Decide for one symbol. Stop-loss on the newest lot comes first; the
    /// backtest gate is only evaluated when a buy is still possible, since it
    /// costs a history fetch.
    async fn evaluate_symbol(&self, symbol: &str, position: &Position) -> TradeSignal {
        let market_price = position.market_price;
        let (last_buy_price, open_lots) = {
            let ledger = self.ledger.lock().unwrap();
            (ledger.last_buy_price(symbol), ledger.count(symbol))
        };

        let stopped_out = last_buy_price
            .map(|entry| market_price < engine::stop_loss_price(entry, self.config.risk_threshold))
            .unwrap_or(false);

        let gate_passed = if stopped_out || open_lots >= self.config.max_open_lots {
            false
        } else {
            match self.backtest_gate(symbol).await {
                Ok(passed) => passed,
                Err(e) => {
                    // Data errors default the decision to Hold.
                    warn!(%symbol, error = %e, "backtest gate unavailable, holding");
                    false
                }
            }
        };

        engine::decide(market_price, last_buy_price, open_lots, gate_passed, &self.config)
    }

    async fn backtest_gate(&self, symbol: &str) -> TradingResult<bool> {
        let start = (chrono::Utc::now() - chrono::Duration::days(self.config.history_days))
            .date_naive();
        let bars = self.gateway.fetch_historical_bars(symbol, start).await?;
        engine::backtest_gate(&bars, &self.config)
    }

    /// Live data refresher: keep the position cache warm while the market is
    /// open. The open/closed state is re-checked every iteration.
    async fn refresh_live_data(self: Arc<Self>) -> TradingResult<()> {
        let interval = Duration::from_secs(self.config.refresh_interval_secs);
        let closed_backoff = Duration::from_secs(self.config.closed_market_backoff_secs);

        while self.running.is_running() {
            match self.gateway.is_market_open().await {
                Ok(false) => {
                    info!("market is closed, skipping live data refresh");
                    sleep(closed_backoff).await;
                    continue;
                }
                Ok(true) => match self.gateway.fetch_positions().await {
                    Ok(positions) => {
                        debug!(count = positions.len(), "refreshed position cache");
                        self.positions.replace(positions);
                    }
                    Err(e) => error!(error = %e, "failed to refresh positions"),
                },
                Err(e) => error!(error = %e, "failed to check market status"),
            }

            sleep(interval).await;
        }

        Ok(())
    }

    /// Queue purger: backpressure valve for the streaming producer. Payloads
    /// are dropped unprocessed; stream consumption lives elsewhere.
    async fn purge_queue(self: Arc<Self>) -> TradingResult<()> {
        let interval = Duration::from_secs(self.config.purge_interval_secs);

        while self.running.is_running() {
            let drained = self.queue.drain();
            if drained > 0 {
                debug!(drained, "purged inbound queue");
            }
            sleep(interval).await;
        }

        Ok(())
    }

    /// Health monitor: stream liveness and queue depth. Any failing check
    /// shuts the whole process down; there is no partial degradation.
    async fn health_check(self: Arc<Self>) -> TradingResult<()> {
        let interval = Duration::from_secs(self.config.health_interval_secs);

        while self.running.is_running() {
            match self.run_health_checks().await {
                Ok(()) => info!("health check passed"),
                Err(e) => {
                    error!(error = %e, "health check failed, shutting down");
                    self.running.shutdown();
                }
            }

            sleep(interval).await;
        }

        Ok(())
    }

    async fn run_health_checks(&self) -> TradingResult<()> {
        if !self.stream.is_connected() {
            warn!("stream disconnected, reconnecting");
            if !self.stream.connect_with_retries().await {
                return Err(TradingError::Stream(
                    "stream reconnect exhausted its retries".to_string(),
                ));
            }
        }

        let depth = self.queue.len();
        if depth >= self.queue.capacity() {
            warn!(depth, "inbound queue at capacity, purging out of cycle");
            self.queue.drain();
        }

        Ok(())
    }
}

/// Isolate one loop: log its outcome with its identity and let siblings run on.
async fn supervise<F>(name: &'static str, task: F)
where
    F: Future<Output = TradingResult<()>>,
{
    match task.await {
        Ok(()) => info!(task = name, "task stopped"),
        Err(e) => error!(task = name, error = %e, "task failed"),
    }
}
