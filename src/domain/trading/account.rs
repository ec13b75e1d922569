use crate::domain::market::session::TradingSession;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broker connector endpoint for one account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mt5Endpoint {
    pub base_url: String,
    pub login: i64,
}

/// Per-account risk limits. `max_concurrent_trades` caps simultaneously open
/// positions; `max_trades_per_day` caps entries per calendar day and falls
/// back to the concurrent cap when absent (the two limits are distinct and
/// both enforced).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskLimits {
    pub risk_percent: f64,
    pub max_daily_loss: Decimal,
    /// Carried for the accounts document; weekly drawdown is enforced by
    /// the kill switch, never by the per-trade risk gate
    pub max_weekly_loss: Decimal,
    pub max_concurrent_trades: u32,
    #[serde(default)]
    pub max_trades_per_day: Option<u32>,
    pub max_daily_risk: Decimal,
    pub max_exposure: Decimal,
}

impl RiskLimits {
    pub fn daily_trade_cap(&self) -> u32 {
        self.max_trades_per_day.unwrap_or(self.max_concurrent_trades)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillSwitchConfig {
    pub enabled: bool,
    // The accounts document spells these with upper-case DD
    #[serde(rename = "dailyDDLimit")]
    pub daily_dd_limit: Decimal,
    #[serde(rename = "weeklyDDLimit", default)]
    pub weekly_dd_limit: Decimal,
    #[serde(default)]
    pub max_consecutive_losses: Option<u32>,
    #[serde(default)]
    pub max_spread_pips: Option<f64>,
    #[serde(default)]
    pub max_exposure: Option<Decimal>,
}

/// Per-account overrides on top of the base execution filter configuration.
/// `min_spread_pips` is informational only and never widens `max_spread_pips`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFilterOverrides {
    #[serde(default)]
    pub max_trades_per_day: Option<u32>,
    #[serde(default)]
    pub cooldown_minutes: Option<i64>,
    #[serde(default)]
    pub session_windows: Option<Vec<TradingSession>>,
    #[serde(default)]
    pub max_spread_pips: Option<f64>,
    #[serde(default)]
    pub min_spread_pips: Option<f64>,
}

/// One broker account as loaded from the accounts document. Lives for the
/// process; mutable runtime companion is `AccountRuntimeState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: String,
    pub name: String,
    pub mt5: Mt5Endpoint,
    pub symbols: Vec<String>,
    pub risk: RiskLimits,
    pub kill_switch: KillSwitchConfig,
    #[serde(default)]
    pub execution_filter: Option<ExecutionFilterOverrides>,
    pub enabled: bool,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl AccountInfo {
    /// Case-insensitive symbol membership check
    pub fn trades_symbol(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    /// Multi-tenant accounts carry a tenant id in their metadata
    pub fn tenant_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("tenantId"))
            .and_then(|v| v.as_str())
    }
}

/// Mutable runtime companion of `AccountInfo`. Owned exclusively by the
/// account registry; mutations are last-writer-wins under the registry lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRuntimeState {
    pub paused: bool,
    pub pause_reason: Option<String>,
    pub last_error: Option<String>,
    pub last_error_time: Option<i64>,
    pub last_trade_time: Option<i64>,
    pub last_trade_symbol: Option<String>,
    pub is_connected: bool,
}

impl Default for AccountRuntimeState {
    fn default() -> Self {
        Self {
            paused: false,
            pause_reason: None,
            last_error: None,
            last_error_time: None,
            last_trade_time: None,
            last_trade_symbol: None,
            is_connected: true,
        }
    }
}

/// Current kill-switch state for one account. Mirrors the append-only
/// `account_kill_switch_events` table; the in-memory state is the latest row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountKillSwitchState {
    pub account_id: String,
    pub active: bool,
    pub reasons: Vec<String>,
    pub activated_at: Option<i64>,
}

impl AccountKillSwitchState {
    pub fn inactive(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            active: false,
            reasons: Vec::new(),
            activated_at: None,
        }
    }
}

/// Mode handed down by the external news/economic-calendar guardrail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardrailMode {
    Normal,
    Reduced,
    Blocked,
}

impl fmt::Display for GuardrailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardrailMode::Normal => write!(f, "normal"),
            GuardrailMode::Reduced => write!(f, "reduced"),
            GuardrailMode::Blocked => write!(f, "blocked"),
        }
    }
}

impl FromStr for GuardrailMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(GuardrailMode::Normal),
            "reduced" => Ok(GuardrailMode::Reduced),
            "blocked" => Ok(GuardrailMode::Blocked),
            _ => anyhow::bail!(
                "Invalid guardrail mode: {}. Must be 'normal', 'reduced', or 'blocked'",
                s
            ),
        }
    }
}
