// Configuration management for the equity trading bot

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub api_key_id: String,
    pub api_secret_key: String,
    pub rest_base_url: String,
    pub data_base_url: String,
    pub stream_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub risk_threshold: f64,         // Stop-loss distance below a lot's entry price
    pub max_open_lots: usize,        // Concurrent open lots allowed per symbol
    pub order_qty: i64,              // Shares per order (placeholder sizing rule)
    pub atr_low: f64,                // Lower bound of the acceptable volatility band
    pub atr_high: f64,               // Upper bound of the acceptable volatility band
    pub atr_period: usize,           // Trailing window for the true-range average
    pub fast_ma_window: usize,
    pub slow_ma_window: usize,
    pub history_days: i64,           // Daily-bar lookback for the backtest gate
    pub monitor_interval_secs: u64,
    pub refresh_interval_secs: u64,
    pub purge_interval_secs: u64,
    pub health_interval_secs: u64,
    pub closed_market_backoff_secs: u64,
    pub queue_capacity: usize,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            risk_threshold: 0.05,
            max_open_lots: 10,
            order_qty: 1,
            atr_low: 2.0,
            atr_high: 7.0,
            atr_period: 14,
            fast_ma_window: 20,
            slow_ma_window: 50,
            history_days: 120,
            monitor_interval_secs: 60,
            refresh_interval_secs: 30,
            purge_interval_secs: 60,
            health_interval_secs: 300,
            closed_market_backoff_secs: 60,
            queue_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub log_filter: String,
    pub enable_decision_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            enable_decision_logging: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub trading: TradingConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                api_key_id: "YOUR_KEY_ID".to_string(),
                api_secret_key: "YOUR_SECRET_KEY".to_string(),
                rest_base_url: "https://paper-api.alpaca.markets".to_string(),
                data_base_url: "https://data.alpaca.markets".to_string(),
                stream_url: "wss://paper-api.alpaca.markets/stream".to_string(),
            },
            trading: TradingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, applying env-var credential overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            println!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Credentials may come from the environment instead of the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(key_id) = std::env::var("ALPACA_API_KEY_ID") {
            self.gateway.api_key_id = key_id;
        }
        if let Ok(secret) = std::env::var("ALPACA_API_SECRET_KEY") {
            self.gateway.api_secret_key = secret;
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.api_key_id.is_empty() {
            return Err(ConfigError::Validation("api_key_id must not be empty".to_string()));
        }

        if self.gateway.api_secret_key.is_empty() {
            return Err(ConfigError::Validation("api_secret_key must not be empty".to_string()));
        }

        if !(0.0..1.0).contains(&self.trading.risk_threshold) {
            return Err(ConfigError::Validation("risk_threshold must be in [0, 1)".to_string()));
        }

        if self.trading.max_open_lots == 0 {
            return Err(ConfigError::Validation("max_open_lots must be greater than 0".to_string()));
        }

        if self.trading.order_qty <= 0 {
            return Err(ConfigError::Validation("order_qty must be positive".to_string()));
        }

        if self.trading.atr_low > self.trading.atr_high {
            return Err(ConfigError::Validation("atr_low must not exceed atr_high".to_string()));
        }

        if self.trading.atr_period == 0 {
            return Err(ConfigError::Validation("atr_period must be greater than 0".to_string()));
        }

        if self.trading.fast_ma_window == 0 || self.trading.slow_ma_window == 0 {
            return Err(ConfigError::Validation("moving-average windows must be greater than 0".to_string()));
        }

        if self.trading.history_days <= 0 {
            return Err(ConfigError::Validation("history_days must be positive".to_string()));
        }

        if self.trading.monitor_interval_secs == 0
            || self.trading.refresh_interval_secs == 0
            || self.trading.purge_interval_secs == 0
            || self.trading.health_interval_secs == 0
        {
            return Err(ConfigError::Validation("loop intervals must be greater than 0".to_string()));
        }

        if self.trading.queue_capacity == 0 {
            return Err(ConfigError::Validation("queue_capacity must be greater than 0".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
