use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Trade,
    Skip,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Trade => write!(f, "TRADE"),
            TradeAction::Skip => write!(f, "SKIP"),
        }
    }
}

/// Outcome of running one signal through one account's execution pipeline.
/// Produced exactly once per (account, signal); failures are values, the
/// engine never throws across the fan-out boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountExecutionResult {
    pub account_id: String,
    pub success: bool,
    pub decision: TradeAction,
    pub reasons: Vec<String>,
    pub ticket: Option<String>,
    pub lot_size: Option<Decimal>,
    pub error: Option<String>,
    pub risk_reason: Option<String>,
    pub filter_reason: Option<String>,
    pub kill_switch_reason: Option<String>,
}

impl AccountExecutionResult {
    pub fn traded(account_id: impl Into<String>, ticket: String, lot_size: Decimal) -> Self {
        Self {
            account_id: account_id.into(),
            success: true,
            decision: TradeAction::Trade,
            reasons: Vec::new(),
            ticket: Some(ticket),
            lot_size: Some(lot_size),
            error: None,
            risk_reason: None,
            filter_reason: None,
            kill_switch_reason: None,
        }
    }

    pub fn skipped(account_id: impl Into<String>, reasons: Vec<String>) -> Self {
        Self {
            account_id: account_id.into(),
            success: true,
            decision: TradeAction::Skip,
            reasons,
            ticket: None,
            lot_size: None,
            error: None,
            risk_reason: None,
            filter_reason: None,
            kill_switch_reason: None,
        }
    }

    pub fn failed(account_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            success: false,
            decision: TradeAction::Skip,
            reasons: Vec::new(),
            ticket: None,
            lot_size: None,
            error: Some(error.into()),
            risk_reason: None,
            filter_reason: None,
            kill_switch_reason: None,
        }
    }

    /// The most specific reason to show in an aggregate skip bucket
    pub fn skip_reason(&self) -> String {
        self.kill_switch_reason
            .clone()
            .or_else(|| self.risk_reason.clone())
            .or_else(|| self.filter_reason.clone())
            .or_else(|| {
                if self.reasons.is_empty() {
                    None
                } else {
                    Some(self.reasons.join("; "))
                }
            })
            .unwrap_or_else(|| "skipped".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedAccount {
    pub account_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedAccount {
    pub account_id: String,
    pub error: String,
}

/// Fan-out summary for one signal across all eligible accounts. Always
/// satisfies |traded| + |skipped| + |failed| = total_accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedExecutionResult {
    pub symbol: String,
    pub strategy: String,
    pub timestamp: i64,
    pub total_accounts: usize,
    pub traded_accounts: Vec<String>,
    pub skipped_accounts: Vec<SkippedAccount>,
    pub failed_accounts: Vec<FailedAccount>,
    pub results: Vec<AccountExecutionResult>,
}
