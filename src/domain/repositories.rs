use crate::domain::trading::decision::TradeAction;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of `account_live_equity`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub account_id: String,
    pub broker_account: Option<String>,
    pub timestamp: i64,
    pub balance: Decimal,
    pub equity: Decimal,
    pub floating_pnl: Decimal,
    pub closed_pnl_today: Decimal,
    pub closed_pnl_week: Decimal,
    pub max_drawdown_abs: Decimal,
}

#[async_trait]
pub trait EquityRepository: Send + Sync {
    /// Latest snapshot per account, None when the account has no rows yet
    async fn latest(&self, account_id: &str) -> Result<Option<EquitySnapshot>>;

    async fn record(&self, snapshot: &EquitySnapshot) -> Result<()>;
}

/// One row of `account_trade_decisions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDecisionRecord {
    pub account_id: String,
    pub timestamp: i64,
    pub symbol: String,
    pub strategy: String,
    pub decision: TradeAction,
    pub risk_reason: Option<String>,
    pub filter_reason: Option<String>,
    pub kill_switch_reason: Option<String>,
    pub execution_result: serde_json::Value,
    pub pnl: Option<f64>,
}

#[async_trait]
pub trait TradeDecisionRepository: Send + Sync {
    async fn record(&self, row: &TradeDecisionRecord) -> Result<()>;

    /// Count of TRADE decisions for the account on the current UTC day
    async fn trades_today(&self, account_id: &str) -> Result<u32>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KillSwitchEventType {
    Activated,
    Deactivated,
}

impl fmt::Display for KillSwitchEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillSwitchEventType::Activated => write!(f, "activated"),
            KillSwitchEventType::Deactivated => write!(f, "deactivated"),
        }
    }
}

/// One row of the append-only `account_kill_switch_events` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillSwitchEvent {
    pub account_id: String,
    pub event_type: KillSwitchEventType,
    pub reason: String,
    pub created_at: i64,
}

#[async_trait]
pub trait KillSwitchEventRepository: Send + Sync {
    async fn append(&self, event: &KillSwitchEvent) -> Result<()>;

    /// Latest event per account, used to seed in-memory state on load
    async fn latest_per_account(&self) -> Result<Vec<KillSwitchEvent>>;
}
