// Equity Trading Bot Library
//
// An automated position-management orchestrator for an equities account:
// periodic position monitoring, a lagging-signal decision engine, a
// per-symbol lot ledger, and serialized trade execution.

pub mod clients;
pub mod config;
pub mod core;
pub mod error;

// Re-export core trading types
pub use crate::core::{
    Bar, FilledOrder, InboundQueue, LotLedger, MarketGateway, OrderConfirmation, OrderSide,
    Position, PositionCache, RunningFlag, StreamClient, TradeExecutor, TradeSignal, TradingBot,
};

// Re-export error types
pub use crate::error::{TradingError, TradingResult};

// Re-export configuration
pub use crate::config::{Config, ConfigError, GatewayConfig, LoggingConfig, TradingConfig};

// Re-export client types
pub use crate::clients::{AlpacaGateway, AlpacaStream};
