//! Per-account execution filter.
//!
//! Wraps the base filter configuration with the account's overrides:
//! trades-per-day cap, per-symbol cooldown and session windows. The
//! `min_spread_pips` override is deliberately never applied to the
//! spread ceiling.

use crate::domain::market::session::{TradingSession, active_sessions};
use crate::domain::trading::account::AccountInfo;
use crate::domain::trading::decision::TradeAction;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ExecutionFilterConfig {
    pub max_trades_per_day: u32,
    pub cooldown_minutes: i64,
    pub session_windows: Vec<TradingSession>,
    pub max_spread_pips: Option<f64>,
}

impl Default for ExecutionFilterConfig {
    fn default() -> Self {
        Self {
            max_trades_per_day: 5,
            cooldown_minutes: 30,
            session_windows: vec![
                TradingSession::Asian,
                TradingSession::London,
                TradingSession::NewYork,
            ],
            max_spread_pips: None,
        }
    }
}

/// Inputs for one filter evaluation
#[derive(Debug, Clone)]
pub struct FilterContext {
    pub symbol: String,
    pub now_ms: i64,
    pub trades_taken_today: u32,
    pub last_trade_time: Option<i64>,
    pub last_trade_symbol: Option<String>,
    pub current_spread_pips: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterDecision {
    pub action: TradeAction,
    pub reasons: Vec<String>,
}

pub struct AccountExecutionFilter {
    base: ExecutionFilterConfig,
}

impl AccountExecutionFilter {
    pub fn new(base: ExecutionFilterConfig) -> Self {
        Self { base }
    }

    /// Base configuration with the account's overrides applied.
    /// `min_spread_pips` is ignored here: it must not widen the ceiling.
    pub fn resolve(&self, account: &AccountInfo) -> ExecutionFilterConfig {
        let mut config = self.base.clone();
        if let Some(overrides) = &account.execution_filter {
            if let Some(max) = overrides.max_trades_per_day {
                config.max_trades_per_day = max;
            }
            if let Some(cooldown) = overrides.cooldown_minutes {
                config.cooldown_minutes = cooldown;
            }
            if let Some(windows) = &overrides.session_windows {
                config.session_windows = windows.clone();
            }
            if let Some(max_spread) = overrides.max_spread_pips {
                config.max_spread_pips = Some(max_spread);
            }
        }
        config
    }

    /// Evaluate all filter rules, collecting every failing reason.
    pub fn check(&self, account: &AccountInfo, context: &FilterContext) -> FilterDecision {
        let config = self.resolve(account);
        let mut reasons = Vec::new();

        if context.trades_taken_today >= config.max_trades_per_day {
            reasons.push(format!(
                "Max trades per day reached: {}/{}",
                context.trades_taken_today, config.max_trades_per_day
            ));
        }

        if let (Some(last_time), Some(last_symbol)) =
            (context.last_trade_time, context.last_trade_symbol.as_deref())
            && last_symbol.eq_ignore_ascii_case(&context.symbol)
        {
            let elapsed_minutes = (context.now_ms - last_time) / 60_000;
            if elapsed_minutes < config.cooldown_minutes {
                reasons.push(format!(
                    "Cooldown active on {}: {} min remaining",
                    context.symbol,
                    config.cooldown_minutes - elapsed_minutes
                ));
            }
        }

        let active = active_sessions(context.now_ms);
        if !active.iter().any(|s| config.session_windows.contains(s)) {
            reasons.push("Outside allowed session windows".to_string());
        }

        if let Some(max_spread) = config.max_spread_pips
            && context.current_spread_pips > max_spread
        {
            reasons.push(format!(
                "Spread above filter limit: {} > {} pips",
                context.current_spread_pips, max_spread
            ));
        }

        let action = if reasons.is_empty() {
            TradeAction::Trade
        } else {
            debug!(
                "Execution filter SKIP for {}: {}",
                account.id,
                reasons.join("; ")
            );
            TradeAction::Skip
        };
        FilterDecision { action, reasons }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::account::{
        ExecutionFilterOverrides, KillSwitchConfig, Mt5Endpoint, RiskLimits,
    };
    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use rust_decimal_macros::dec;

    fn account(overrides: Option<ExecutionFilterOverrides>) -> AccountInfo {
        AccountInfo {
            id: "acc1".to_string(),
            name: "Primary".to_string(),
            mt5: Mt5Endpoint {
                base_url: "http://localhost:8001".to_string(),
                login: 1,
            },
            symbols: vec!["XAUUSD".to_string()],
            risk: RiskLimits {
                risk_percent: 1.0,
                max_daily_loss: dec!(300),
                max_weekly_loss: dec!(900),
                max_concurrent_trades: 3,
                max_trades_per_day: None,
                max_daily_risk: dec!(500),
                max_exposure: dec!(1000),
            },
            kill_switch: KillSwitchConfig {
                enabled: false,
                daily_dd_limit: dec!(200),
                weekly_dd_limit: dec!(600),
                max_consecutive_losses: None,
                max_spread_pips: None,
                max_exposure: None,
            },
            execution_filter: overrides,
            enabled: true,
            metadata: None,
        }
    }

    /// Tuesday 10:00 New York (London session)
    fn london_hours_ms() -> i64 {
        New_York
            .with_ymd_and_hms(2025, 3, 4, 10, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    fn context() -> FilterContext {
        FilterContext {
            symbol: "XAUUSD".to_string(),
            now_ms: london_hours_ms(),
            trades_taken_today: 0,
            last_trade_time: None,
            last_trade_symbol: None,
            current_spread_pips: 1.0,
        }
    }

    #[test]
    fn test_clean_context_trades() {
        let filter = AccountExecutionFilter::new(ExecutionFilterConfig::default());
        let decision = filter.check(&account(None), &context());
        assert_eq!(decision.action, TradeAction::Trade);
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn test_daily_cap() {
        let filter = AccountExecutionFilter::new(ExecutionFilterConfig::default());
        let mut ctx = context();
        ctx.trades_taken_today = 5;
        let decision = filter.check(&account(None), &ctx);
        assert_eq!(decision.action, TradeAction::Skip);
        assert!(decision.reasons[0].contains("Max trades per day"));
    }

    #[test]
    fn test_cooldown_applies_per_symbol() {
        let filter = AccountExecutionFilter::new(ExecutionFilterConfig::default());
        let mut ctx = context();
        ctx.last_trade_time = Some(ctx.now_ms - 10 * 60_000); // 10 min ago
        ctx.last_trade_symbol = Some("XAUUSD".to_string());
        let decision = filter.check(&account(None), &ctx);
        assert_eq!(decision.action, TradeAction::Skip);
        assert!(decision.reasons[0].contains("Cooldown active"));

        // A trade on a different symbol does not trigger the cooldown
        ctx.last_trade_symbol = Some("US30".to_string());
        let decision = filter.check(&account(None), &ctx);
        assert_eq!(decision.action, TradeAction::Trade);
    }

    #[test]
    fn test_session_windows_restricted_by_override() {
        let overrides = ExecutionFilterOverrides {
            session_windows: Some(vec![TradingSession::Asian]),
            ..Default::default()
        };
        let filter = AccountExecutionFilter::new(ExecutionFilterConfig::default());
        // 10:00 NY is London, not Asian
        let decision = filter.check(&account(Some(overrides)), &context());
        assert_eq!(decision.action, TradeAction::Skip);
        assert!(decision.reasons[0].contains("Outside allowed session windows"));
    }

    #[test]
    fn test_min_spread_does_not_widen_ceiling() {
        let overrides = ExecutionFilterOverrides {
            min_spread_pips: Some(10.0),
            ..Default::default()
        };
        let mut base = ExecutionFilterConfig::default();
        base.max_spread_pips = Some(2.0);
        let filter = AccountExecutionFilter::new(base);

        let mut ctx = context();
        ctx.current_spread_pips = 5.0;
        // min_spread_pips=10 must not lift the 2-pip ceiling
        let decision = filter.check(&account(Some(overrides)), &ctx);
        assert_eq!(decision.action, TradeAction::Skip);
        assert!(decision.reasons[0].contains("Spread above filter limit"));
    }

    #[test]
    fn test_override_cooldown_and_cap() {
        let overrides = ExecutionFilterOverrides {
            max_trades_per_day: Some(2),
            cooldown_minutes: Some(5),
            ..Default::default()
        };
        let filter = AccountExecutionFilter::new(ExecutionFilterConfig::default());
        let resolved = filter.resolve(&account(Some(overrides)));
        assert_eq!(resolved.max_trades_per_day, 2);
        assert_eq!(resolved.cooldown_minutes, 5);
    }
}
