// Trade execution, serialized under the process-wide trade lock

use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::core::ledger::LotLedger;
use crate::core::types::{MarketGateway, OrderSide, PositionCache, TradeSignal};
use crate::error::TradingResult;

/// Places orders and mutates the lot ledger.
///
/// A single async mutex serializes every execution end to end: position
/// refresh, order placement, and ledger mutation never interleave between two
/// invocations, even when the monitor produces decisions for several symbols
/// in one cycle. The gateway call always happens before the ledger mutation,
/// so a failed order leaves the ledger untouched.
pub struct TradeExecutor {
    gateway: Arc<dyn MarketGateway>,
    ledger: Arc<Mutex<LotLedger>>,
    positions: PositionCache,
    trade_lock: tokio::sync::Mutex<()>,
    order_qty: i64,
}

impl TradeExecutor {
    pub fn new(
        gateway: Arc<dyn MarketGateway>,
        ledger: Arc<Mutex<LotLedger>>,
        positions: PositionCache,
        order_qty: i64,
    ) -> Self {
        Self {
            gateway,
            ledger,
            positions,
            trade_lock: tokio::sync::Mutex::new(()),
            order_qty,
        }
    }

    /// Execute a buy or sell for one symbol. Hold is a no-op.
    pub async fn execute(&self, signal: TradeSignal, symbol: &str) -> TradingResult<()> {
        if signal == TradeSignal::Hold {
            return Ok(());
        }

        let _guard = self.trade_lock.lock().await;

        // Refresh the cache so the lot entry price comes from the newest
        // broker snapshot available before the order goes out.
        let positions = self.gateway.fetch_positions().await?;
        self.positions.replace(positions);

        info!(%symbol, ?signal, "processing trade signal");

        match signal {
            TradeSignal::Buy => {
                let confirmation = self
                    .gateway
                    .place_order(symbol, self.order_qty, OrderSide::Buy)
                    .await?;
                info!(%symbol, order_id = %confirmation.order_id, "buy order placed");

                // Cost basis comes from the cached position snapshot, not
                // the fill report.
                match self.positions.get(symbol) {
                    Some(position) => {
                        let mut ledger = self.ledger.lock().unwrap();
                        ledger.open(symbol, position.account_price);
                        info!(
                            %symbol,
                            buy_price = position.account_price,
                            open_lots = ledger.count(symbol),
                            "opened lot"
                        );
                    }
                    None => {
                        warn!(%symbol, "no cached position for bought symbol; lot not recorded");
                    }
                }
            }
            TradeSignal::Sell => {
                let confirmation = self
                    .gateway
                    .place_order(symbol, self.order_qty, OrderSide::Sell)
                    .await?;
                info!(%symbol, order_id = %confirmation.order_id, "sell order placed");

                let closed = self.ledger.lock().unwrap().close_last(symbol);
                match closed {
                    Some(buy_price) => info!(%symbol, buy_price, "closed lot"),
                    None => {
                        // The order already went to the broker; an untracked
                        // sell is an anomaly, not a failure.
                        warn!(%symbol, "sell executed with no open lot; ledger unchanged");
                    }
                }
            }
            TradeSignal::Hold => unreachable!(),
        }

        Ok(())
    }
}
