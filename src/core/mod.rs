// Core trading logic modules

pub mod engine;
pub mod executor;
pub mod ledger;
pub mod orchestrator;
pub mod types;

// Re-export commonly used types
pub use executor::TradeExecutor;
pub use ledger::LotLedger;
pub use orchestrator::TradingBot;
pub use types::{
    Bar, FilledOrder, InboundQueue, MarketGateway, OrderConfirmation, OrderSide, Position,
    PositionCache, RunningFlag, StreamClient, TradeSignal,
};
