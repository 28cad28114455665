// Alpaca REST gateway: positions, orders, account, clock, and market data

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::core::types::{Bar, FilledOrder, MarketGateway, OrderConfirmation, OrderSide, Position};
use crate::error::{TradingError, TradingResult};

/// Brokerage gateway backed by the Alpaca trading and market-data APIs.
///
/// All endpoints are relative to the configured base URLs so the paper and
/// live environments (and tests) only differ in configuration.
pub struct AlpacaGateway {
    http: reqwest::Client,
    rest_base_url: String,
    data_base_url: String,
    api_key_id: String,
    api_secret_key: String,
}

#[derive(Debug, Deserialize)]
struct PositionRow {
    symbol: String,
    qty: String,
    current_price: String,
}

#[derive(Debug, Deserialize)]
struct LatestTradeResponse {
    trade: TradePayload,
}

#[derive(Debug, Deserialize)]
struct TradePayload {
    p: f64,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    portfolio_value: String,
}

#[derive(Debug, Deserialize)]
struct ClockResponse {
    is_open: bool,
}

#[derive(Debug, Deserialize)]
struct BarPayload {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
    t: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    bars: Option<Vec<BarPayload>>,
}

#[derive(Debug, Deserialize)]
struct LatestBarResponse {
    bar: BarPayload,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ClosedOrderRow {
    symbol: String,
    side: String,
    status: String,
    filled_avg_price: Option<String>,
    filled_qty: Option<String>,
    filled_at: Option<DateTime<Utc>>,
}

impl From<BarPayload> for Bar {
    fn from(payload: BarPayload) -> Self {
        Bar {
            open: payload.o,
            high: payload.h,
            low: payload.l,
            close: payload.c,
            volume: payload.v,
            timestamp: payload.t,
        }
    }
}

impl AlpacaGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            rest_base_url: config.rest_base_url.trim_end_matches('/').to_string(),
            data_base_url: config.data_base_url.trim_end_matches('/').to_string(),
            api_key_id: config.api_key_id.clone(),
            api_secret_key: config.api_secret_key.clone(),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("APCA-API-KEY-ID", &self.api_key_id)
            .header("APCA-API-SECRET-KEY", &self.api_secret_key)
    }

    async fn check(response: reqwest::Response) -> TradingResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => TradingError::ApiAuthentication(format!("{}: {}", status, body)),
            429 => TradingError::ApiRateLimit(format!("{}: {}", status, body)),
            _ => TradingError::ApiResponse(format!("{}: {}", status, body)),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> TradingResult<T> {
        let response = self.authed(self.http.get(url)).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn latest_trade_price(&self, symbol: &str) -> TradingResult<f64> {
        let url = format!("{}/v2/stocks/{}/trades/latest", self.data_base_url, symbol);
        let response: LatestTradeResponse = self.get_json(&url).await?;
        Ok(response.trade.p)
    }
}

fn parse_decimal(value: &str, field: &str) -> TradingResult<f64> {
    value
        .parse::<f64>()
        .map_err(|_| TradingError::ApiResponse(format!("invalid decimal in {}: {:?}", field, value)))
}

#[async_trait::async_trait]
impl MarketGateway for AlpacaGateway {
    async fn fetch_positions(&self) -> TradingResult<HashMap<String, Position>> {
        let url = format!("{}/v2/positions", self.rest_base_url);
        let rows: Vec<PositionRow> = self.get_json(&url).await?;

        let mut positions = HashMap::new();
        for row in rows {
            let quantity = parse_decimal(&row.qty, "qty")? as i64;
            let account_price = parse_decimal(&row.current_price, "current_price")?;

            // Prefer the real-time trade price; fall back to the price the
            // broker attached to the position snapshot.
            let market_price = match self.latest_trade_price(&row.symbol).await {
                Ok(price) => price,
                Err(e) => {
                    warn!(symbol = %row.symbol, error = %e, "latest trade unavailable, using position price");
                    account_price
                }
            };

            positions.insert(
                row.symbol.clone(),
                Position {
                    symbol: row.symbol,
                    quantity,
                    account_price,
                    market_price,
                },
            );
        }

        debug!(count = positions.len(), "fetched positions");
        Ok(positions)
    }

    async fn fetch_historical_bars(&self, symbol: &str, start: NaiveDate) -> TradingResult<Vec<Bar>> {
        let end = (Utc::now() - chrono::Duration::days(1)).date_naive();
        let url = format!(
            "{}/v2/stocks/{}/bars?timeframe=1Day&start={}&end={}&adjustment=all&limit=10000",
            self.data_base_url, symbol, start, end
        );
        let response: BarsResponse = self.get_json(&url).await?;
        Ok(response
            .bars
            .unwrap_or_default()
            .into_iter()
            .map(Bar::from)
            .collect())
    }

    async fn fetch_latest_bar(&self, symbol: &str) -> TradingResult<Bar> {
        let url = format!("{}/v2/stocks/{}/bars/latest", self.data_base_url, symbol);
        let response: LatestBarResponse = self.get_json(&url).await?;
        Ok(response.bar.into())
    }

    async fn place_order(
        &self,
        symbol: &str,
        qty: i64,
        side: OrderSide,
    ) -> TradingResult<OrderConfirmation> {
        let url = format!("{}/v2/orders", self.rest_base_url);
        let body = json!({
            "symbol": symbol,
            "qty": qty.to_string(),
            "side": side.to_string(),
            "type": "market",
            "time_in_force": "gtc",
            "client_order_id": Uuid::new_v4().to_string(),
        });

        let response = self.authed(self.http.post(&url)).json(&body).send().await?;
        let response = Self::check(response).await.map_err(|e| match e {
            // A rejected submission is an order failure, not a generic API error.
            TradingError::ApiResponse(msg) => TradingError::OrderFailed(msg),
            other => other,
        })?;

        let order: OrderResponse = response.json().await?;
        debug!(%symbol, %side, order_id = %order.id, status = %order.status, "order submitted");
        Ok(OrderConfirmation {
            order_id: order.id,
            status: order.status,
        })
    }

    async fn portfolio_value(&self) -> TradingResult<f64> {
        let url = format!("{}/v2/account", self.rest_base_url);
        let account: AccountResponse = self.get_json(&url).await?;
        parse_decimal(&account.portfolio_value, "portfolio_value")
    }

    async fn is_market_open(&self) -> TradingResult<bool> {
        let url = format!("{}/v2/clock", self.rest_base_url);
        let clock: ClockResponse = self.get_json(&url).await?;
        Ok(clock.is_open)
    }

    async fn fetch_filled_orders(&self) -> TradingResult<Vec<FilledOrder>> {
        // Ascending so callers replay fills oldest first.
        let url = format!(
            "{}/v2/orders?status=closed&limit=500&direction=asc",
            self.rest_base_url
        );
        let rows: Vec<ClosedOrderRow> = self.get_json(&url).await?;

        let mut orders = Vec::new();
        for row in rows {
            if row.status != "filled" {
                continue;
            }
            let side = match row.side.as_str() {
                "buy" => OrderSide::Buy,
                "sell" => OrderSide::Sell,
                other => {
                    warn!(symbol = %row.symbol, side = other, "skipping order with unknown side");
                    continue;
                }
            };
            let filled_avg_price = row
                .filled_avg_price
                .as_deref()
                .and_then(|price| price.parse::<f64>().ok());
            let filled_qty = row
                .filled_qty
                .as_deref()
                .and_then(|qty| qty.parse::<f64>().ok())
                .map(|qty| qty as i64)
                .unwrap_or(0);

            orders.push(FilledOrder {
                symbol: row.symbol,
                side,
                filled_avg_price,
                filled_qty,
                filled_at: row.filled_at,
            });
        }

        Ok(orders)
    }
}
