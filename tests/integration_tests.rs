// End-to-end tests for trade execution and the orchestrated loops

mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, timeout, Duration};

use common::{fast_config, gate_passing_bars, MockGateway, MockStream};
use equity_trading_bot::{
    FilledOrder, InboundQueue, LotLedger, OrderSide, PositionCache, TradeExecutor, TradeSignal,
    TradingBot, TradingError,
};

fn executor_with(gateway: Arc<MockGateway>) -> (TradeExecutor, Arc<Mutex<LotLedger>>) {
    let ledger = Arc::new(Mutex::new(LotLedger::new()));
    let executor = TradeExecutor::new(gateway, ledger.clone(), PositionCache::new(), 1);
    (executor, ledger)
}

#[test]
fn test_failed_buy_leaves_ledger_unchanged() {
    tokio_test::block_on(async {
        let gateway = Arc::new(MockGateway::default().with_position("AAPL", 1, 100.0, 100.0));
        gateway.fail_orders.store(true, Ordering::SeqCst);

        let (executor, ledger) = executor_with(gateway.clone());
        let result = executor.execute(TradeSignal::Buy, "AAPL").await;

        assert!(matches!(result, Err(TradingError::OrderFailed(_))));
        assert_eq!(ledger.lock().unwrap().count("AAPL"), 0);
        assert!(gateway.orders_placed().is_empty());
    });
}

#[test]
fn test_buy_records_lot_at_account_price() {
    tokio_test::block_on(async {
        // The broker snapshot price and the live trade price differ; the lot
        // deliberately records the snapshot price, not a fill price.
        let gateway = Arc::new(MockGateway::default().with_position("AAPL", 1, 101.5, 99.0));

        let (executor, ledger) = executor_with(gateway.clone());
        executor.execute(TradeSignal::Buy, "AAPL").await.unwrap();

        assert_eq!(gateway.orders_placed(), vec![("AAPL".to_string(), 1, OrderSide::Buy)]);
        assert_eq!(ledger.lock().unwrap().lots("AAPL"), &[101.5]);
    });
}

#[test]
fn test_sell_without_lot_still_places_order() {
    tokio_test::block_on(async {
        let gateway = Arc::new(MockGateway::default().with_position("AAPL", 1, 100.0, 100.0));

        let (executor, ledger) = executor_with(gateway.clone());
        executor.execute(TradeSignal::Sell, "AAPL").await.unwrap();

        assert_eq!(gateway.orders_placed(), vec![("AAPL".to_string(), 1, OrderSide::Sell)]);
        assert!(ledger.lock().unwrap().is_empty());
    });
}

#[test]
fn test_sell_consumes_newest_lot() {
    tokio_test::block_on(async {
        let gateway = Arc::new(MockGateway::default().with_position("AAPL", 2, 100.0, 100.0));

        let (executor, ledger) = executor_with(gateway.clone());
        {
            let mut ledger = ledger.lock().unwrap();
            ledger.open("AAPL", 100.0);
            ledger.open("AAPL", 105.0);
        }

        executor.execute(TradeSignal::Sell, "AAPL").await.unwrap();
        assert_eq!(ledger.lock().unwrap().lots("AAPL"), &[100.0]);
    });
}

#[test]
fn test_hold_is_a_no_op() {
    tokio_test::block_on(async {
        let gateway = Arc::new(MockGateway::default().with_position("AAPL", 1, 100.0, 100.0));

        let (executor, _ledger) = executor_with(gateway.clone());
        executor.execute(TradeSignal::Hold, "AAPL").await.unwrap();

        assert!(gateway.orders_placed().is_empty());
    });
}

#[tokio::test]
async fn test_monitor_sells_on_stop_loss() {
    // One lot bought at 100, market at 94, below the default 5% stop.
    let gateway = Arc::new(MockGateway::default().with_position("AAPL", 1, 94.0, 94.0));
    let stream = Arc::new(MockStream::connected());
    let queue = InboundQueue::new(16);

    let bot = Arc::new(TradingBot::new(
        gateway.clone(),
        stream,
        queue,
        fast_config(),
    ));
    bot.ledger().lock().unwrap().open("AAPL", 100.0);

    let handle = tokio::spawn(bot.clone().run());
    sleep(Duration::from_millis(500)).await;
    bot.running().shutdown();
    timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();

    assert!(gateway
        .orders_placed()
        .contains(&("AAPL".to_string(), 1, OrderSide::Sell)));
    assert_eq!(bot.ledger().lock().unwrap().count("AAPL"), 0);
}

#[tokio::test]
async fn test_monitor_buys_when_gate_passes() {
    let gateway = Arc::new(
        MockGateway::default()
            .with_position("AAPL", 1, 150.0, 150.0)
            .with_bars("AAPL", gate_passing_bars(60)),
    );
    let stream = Arc::new(MockStream::connected());
    let queue = InboundQueue::new(16);

    let bot = Arc::new(TradingBot::new(
        gateway.clone(),
        stream,
        queue,
        fast_config(),
    ));

    let handle = tokio::spawn(bot.clone().run());
    sleep(Duration::from_millis(500)).await;
    bot.running().shutdown();
    timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();

    assert!(gateway
        .orders_placed()
        .contains(&("AAPL".to_string(), 1, OrderSide::Buy)));
    // The lot records the cached account price for the symbol.
    assert_eq!(bot.ledger().lock().unwrap().last_buy_price("AAPL"), Some(150.0));
}

#[tokio::test]
async fn test_monitor_holds_without_history() {
    // No bars scripted: the gate is unavailable, so the decision defaults to
    // Hold and nothing is traded.
    let gateway = Arc::new(MockGateway::default().with_position("AAPL", 1, 150.0, 150.0));
    let stream = Arc::new(MockStream::connected());
    let queue = InboundQueue::new(16);

    let bot = Arc::new(TradingBot::new(
        gateway.clone(),
        stream,
        queue,
        fast_config(),
    ));

    let handle = tokio::spawn(bot.clone().run());
    sleep(Duration::from_millis(500)).await;
    bot.running().shutdown();
    timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();

    assert!(gateway.orders_placed().is_empty());
}

#[tokio::test]
async fn test_health_failure_shuts_down_every_loop() {
    let gateway = Arc::new(MockGateway::default());
    let stream = Arc::new(MockStream::dead());
    let queue = InboundQueue::new(16);

    let bot = Arc::new(TradingBot::new(
        gateway,
        stream.clone(),
        queue,
        fast_config(),
    ));

    let handle = tokio::spawn(bot.clone().run());
    // The first health check fails to reconnect and clears the running flag;
    // every loop then exits within one interval.
    let joined = timeout(Duration::from_secs(10), handle).await;
    assert!(joined.is_ok(), "loops did not stop after health failure");

    assert!(!bot.running().is_running());
    assert!(stream.connect_calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_purger_empties_queue() {
    let gateway = Arc::new(MockGateway::default());
    let stream = Arc::new(MockStream::connected());
    let queue = InboundQueue::new(16);
    for i in 0..5 {
        queue.push(format!("{{\"seq\": {}}}", i));
    }

    let bot = Arc::new(TradingBot::new(
        gateway,
        stream,
        queue.clone(),
        fast_config(),
    ));

    let handle = tokio::spawn(bot.clone().run());
    sleep(Duration::from_millis(500)).await;

    assert!(queue.is_empty());

    bot.running().shutdown();
    timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_seed_ledger_replays_filled_buys() {
    let fills = vec![
        FilledOrder {
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            filled_avg_price: Some(180.5),
            filled_qty: 1,
            filled_at: None,
        },
        FilledOrder {
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            filled_avg_price: Some(185.0),
            filled_qty: 1,
            filled_at: None,
        },
        // Duplicate price for the same symbol is skipped
        FilledOrder {
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            filled_avg_price: Some(180.5),
            filled_qty: 1,
            filled_at: None,
        },
        // Sells never seed lots
        FilledOrder {
            symbol: "AAPL".to_string(),
            side: OrderSide::Sell,
            filled_avg_price: Some(190.0),
            filled_qty: 1,
            filled_at: None,
        },
        // Fills without a price are skipped
        FilledOrder {
            symbol: "MSFT".to_string(),
            side: OrderSide::Buy,
            filled_avg_price: None,
            filled_qty: 1,
            filled_at: None,
        },
    ];
    let gateway = Arc::new(MockGateway::default().with_filled_orders(fills));
    let stream = Arc::new(MockStream::connected());

    let bot = Arc::new(TradingBot::new(
        gateway,
        stream,
        InboundQueue::new(16),
        fast_config(),
    ));

    let seeded = bot.seed_ledger().await.unwrap();
    assert_eq!(seeded, 2);

    let ledger = bot.ledger();
    let ledger = ledger.lock().unwrap();
    assert_eq!(ledger.lots("AAPL"), &[180.5, 185.0]);
    assert_eq!(ledger.count("MSFT"), 0);
}
