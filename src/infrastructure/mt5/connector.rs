//! MT5 Connector client.
//!
//! Speaks the connector's JSON contract: POST {base_url}/api/v1/trades/open
//! with a 10 s hard timeout. 2xx parses the ticket; every 4xx/5xx body is
//! folded into a structured `ConnectorError::Broker` whose rendered message
//! travels verbatim into decision rows.

use crate::domain::errors::ConnectorError;
use crate::domain::ports::{BrokerConnector, BrokerOrder, BrokerTicket};
use crate::domain::trading::types::EntryType;
use crate::infrastructure::http_client_factory::HttpClientFactory;
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const OPEN_TRADE_TIMEOUT_SECS: u64 = 10;

pub struct Mt5Connector {
    client: ClientWithMiddleware,
    timeout: Duration,
}

impl Default for Mt5Connector {
    fn default() -> Self {
        Self::new()
    }
}

impl Mt5Connector {
    pub fn new() -> Self {
        Self {
            client: HttpClientFactory::broker_client(),
            timeout: Duration::from_secs(OPEN_TRADE_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenTradeRequest<'a> {
    symbol: &'a str,
    direction: String,
    entry_type: String,
    order_kind: String,
    entry_price: Decimal,
    lot_size: Decimal,
    stop_loss_price: Decimal,
    take_profit_price: Decimal,
    strategy_id: &'a str,
    metadata: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenTradeResponse {
    /// The connector returns tickets as either string or number
    mt5_ticket: serde_json::Value,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    opened_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BrokerErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[async_trait]
impl BrokerConnector for Mt5Connector {
    async fn open_trade(
        &self,
        base_url: &str,
        order: &BrokerOrder,
    ) -> Result<BrokerTicket, ConnectorError> {
        let url = format!("{}/api/v1/trades/open", base_url.trim_end_matches('/'));
        let order_kind = match order.entry_type {
            EntryType::Market => "market",
            EntryType::Limit => "limit",
            EntryType::Stop => "stop",
        };
        let payload = OpenTradeRequest {
            symbol: &order.symbol,
            direction: order.direction.to_string(),
            entry_type: order.entry_type.to_string(),
            order_kind: order_kind.to_string(),
            entry_price: order.entry_price,
            lot_size: order.lot_size,
            stop_loss_price: order.stop_loss_price,
            take_profit_price: order.take_profit_price,
            strategy_id: &order.strategy_id,
            metadata: &order.metadata,
        };

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout))?;

        let status = response.status();
        if status.is_success() {
            let body: OpenTradeResponse = response
                .json()
                .await
                .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
            let ticket = match &body.mt5_ticket {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(ConnectorError::InvalidResponse(format!(
                        "unexpected mt5_ticket: {}",
                        other
                    )));
                }
            };
            info!(
                "Trade opened via {}: {} {} {} lots, ticket {}",
                url, order.direction, order.symbol, order.lot_size, ticket
            );
            return Ok(BrokerTicket {
                ticket,
                status: body.status,
                opened_at: body.opened_at,
            });
        }

        // Non-2xx: prefer the broker's structured error body
        let code = status.as_u16();
        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<BrokerErrorBody>(&raw)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                } else {
                    raw.clone()
                }
            });
        warn!("Broker rejected trade ({}): {}", code, message);
        Err(ConnectorError::Broker {
            status: code,
            message,
        })
    }
}

fn classify_transport_error(
    error: reqwest_middleware::Error,
    timeout: Duration,
) -> ConnectorError {
    match &error {
        reqwest_middleware::Error::Reqwest(inner) if inner.is_timeout() => ConnectorError::Timeout {
            timeout_secs: timeout.as_secs(),
        },
        _ => ConnectorError::Transport(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parses_string_and_number_tickets() {
        let body: OpenTradeResponse =
            serde_json::from_str(r#"{"mt5_ticket": "881234", "status": "open"}"#).unwrap();
        assert_eq!(body.mt5_ticket.as_str(), Some("881234"));

        let body: OpenTradeResponse = serde_json::from_str(r#"{"mt5_ticket": 881234}"#).unwrap();
        assert!(body.mt5_ticket.is_number());
        assert!(body.opened_at.is_none());
    }

    #[test]
    fn test_error_body_prefers_error_field() {
        let body: BrokerErrorBody =
            serde_json::from_str(r#"{"error": "Invalid volume", "message": "other"}"#).unwrap();
        assert_eq!(body.error.or(body.message).as_deref(), Some("Invalid volume"));

        let body: BrokerErrorBody = serde_json::from_str(r#"{"message": "Bad symbol"}"#).unwrap();
        assert_eq!(body.error.or(body.message).as_deref(), Some("Bad symbol"));
    }

    #[test]
    fn test_request_serializes_contract_fields() {
        let metadata = serde_json::json!({"accountId": "acc1"});
        let order = BrokerOrder {
            symbol: "XAUUSD".to_string(),
            direction: crate::domain::trading::types::Direction::Buy,
            entry_type: EntryType::Limit,
            entry_price: Decimal::new(41015, 1),
            lot_size: Decimal::new(20, 2),
            stop_loss_price: Decimal::new(40970, 1),
            take_profit_price: Decimal::new(41150, 1),
            strategy_id: "smc-ict".to_string(),
            metadata: metadata.clone(),
        };
        let request = OpenTradeRequest {
            symbol: &order.symbol,
            direction: order.direction.to_string(),
            entry_type: order.entry_type.to_string(),
            order_kind: "limit".to_string(),
            entry_price: order.entry_price,
            lot_size: order.lot_size,
            stop_loss_price: order.stop_loss_price,
            take_profit_price: order.take_profit_price,
            strategy_id: &order.strategy_id,
            metadata: &order.metadata,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["direction"], "BUY");
        assert_eq!(value["entry_type"], "LIMIT");
        assert_eq!(value["order_kind"], "limit");
        assert_eq!(value["strategy_id"], "smc-ict");
        assert_eq!(value["metadata"]["accountId"], "acc1");
    }
}
