// Unified error handling for the equity trading bot

use thiserror::Error;

/// Main error type shared across the gateway, stream, and trading core.
#[derive(Debug, Error)]
pub enum TradingError {
    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    // Gateway (REST API) errors
    #[error("API connection error: {0}")]
    ApiConnection(String),

    #[error("API authentication failed: {0}")]
    ApiAuthentication(String),

    #[error("API rate limit exceeded: {0}")]
    ApiRateLimit(String),

    #[error("API response error: {0}")]
    ApiResponse(String),

    #[error("API timeout: {0}")]
    ApiTimeout(String),

    #[error("order failed: {0}")]
    OrderFailed(String),

    // Streaming connection errors
    #[error("stream error: {0}")]
    Stream(String),

    // Decision-engine data errors
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("ledger inconsistency: {0}")]
    LedgerInconsistency(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TradingError {
    /// Check if the operation that produced this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TradingError::ApiConnection(_)
                | TradingError::ApiRateLimit(_)
                | TradingError::ApiTimeout(_)
                | TradingError::Stream(_)
        )
    }

    /// Error category for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            TradingError::Config(_) => "config",

            TradingError::ApiConnection(_)
            | TradingError::ApiAuthentication(_)
            | TradingError::ApiRateLimit(_)
            | TradingError::ApiResponse(_)
            | TradingError::ApiTimeout(_) => "api",

            TradingError::OrderFailed(_) => "trading",

            TradingError::Stream(_) => "stream",

            TradingError::InsufficientData(_) | TradingError::LedgerInconsistency(_) => "data",

            TradingError::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for TradingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TradingError::ApiTimeout(err.to_string())
        } else if err.is_connect() {
            TradingError::ApiConnection(err.to_string())
        } else if err.is_status() {
            TradingError::ApiResponse(err.to_string())
        } else {
            TradingError::ApiConnection(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TradingError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TradingError::Stream(err.to_string())
    }
}

impl From<serde_json::Error> for TradingError {
    fn from(err: serde_json::Error) -> Self {
        TradingError::ApiResponse(format!("JSON parse error: {}", err))
    }
}

impl From<crate::config::ConfigError> for TradingError {
    fn from(err: crate::config::ConfigError) -> Self {
        TradingError::Config(err.to_string())
    }
}

/// Result type alias using TradingError
pub type TradingResult<T> = Result<T, TradingError>;
