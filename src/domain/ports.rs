use crate::domain::errors::ConnectorError;
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::trading::types::{Direction, EntryType};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Read-only access to ordered candle sequences. Implementations must return
/// candles strictly ordered by start time; the pipeline treats the returned
/// slice as immutable input.
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// The most recent `limit` candles for (symbol, timeframe), oldest first
    async fn candles(&self, symbol: &str, timeframe: Timeframe, limit: usize)
    -> Result<Vec<Candle>>;
}

/// Order payload sent to a broker connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerOrder {
    pub symbol: String,
    pub direction: Direction,
    pub entry_type: EntryType,
    pub entry_price: Decimal,
    pub lot_size: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Decimal,
    pub strategy_id: String,
    pub metadata: serde_json::Value,
}

/// Successful broker response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerTicket {
    pub ticket: String,
    pub status: Option<String>,
    pub opened_at: Option<String>,
}

/// One broker connector endpoint. Accounts carry their own base URLs, so the
/// connector is shared and the target is passed per call.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn open_trade(
        &self,
        base_url: &str,
        order: &BrokerOrder,
    ) -> Result<BrokerTicket, ConnectorError>;
}
