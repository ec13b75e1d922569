//! Per-account execution engine.
//!
//! Runs the strictly sequential pipeline for one (account, signal) pair:
//! eligibility and runtime state, kill switch, risk, execution filter, lot
//! sizing, market hours, broker call, bookkeeping. Every outcome is an
//! `AccountExecutionResult`; nothing escapes this module as a panic or an
//! error across the fan-out boundary.

use crate::application::accounts::execution_filter::{AccountExecutionFilter, FilterContext};
use crate::application::accounts::kill_switch::{KillSwitchContext, KillSwitchService};
use crate::application::accounts::registry::AccountRegistry;
use crate::application::accounts::risk::AccountRiskService;
use crate::config::ExecutionEnvConfig;
use crate::domain::market::session::market_open;
use crate::domain::ports::{BrokerConnector, BrokerOrder};
use crate::domain::trading::account::{AccountInfo, GuardrailMode};
use crate::domain::trading::decision::AccountExecutionResult;
use crate::domain::trading::symbol_spec::spec_for;
use crate::domain::trading::types::Signal;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Market snapshot shared by every account for one signal
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub current_price: Decimal,
    pub spread_pips: f64,
    pub current_exposure: Decimal,
    pub concurrent_trades: u32,
    pub consecutive_losses: u32,
    /// Equity used when no snapshot row exists for an account
    pub equity_fallback: Decimal,
    pub now_ms: i64,
}

pub struct AccountExecutionEngine {
    registry: Arc<AccountRegistry>,
    risk: Arc<AccountRiskService>,
    kill_switch: Arc<KillSwitchService>,
    filter: Arc<AccountExecutionFilter>,
    connector: Arc<dyn BrokerConnector>,
    env: ExecutionEnvConfig,
}

impl AccountExecutionEngine {
    pub fn new(
        registry: Arc<AccountRegistry>,
        risk: Arc<AccountRiskService>,
        kill_switch: Arc<KillSwitchService>,
        filter: Arc<AccountExecutionFilter>,
        connector: Arc<dyn BrokerConnector>,
        env: ExecutionEnvConfig,
    ) -> Self {
        Self {
            registry,
            risk,
            kill_switch,
            filter,
            connector,
            env,
        }
    }

    pub async fn execute_for_account(
        &self,
        account: &AccountInfo,
        signal: &Signal,
        context: &ExecutionContext,
        guardrail_mode: GuardrailMode,
        strategy: &str,
    ) -> AccountExecutionResult {
        // 1. Eligibility and runtime state
        if !account.trades_symbol(&signal.symbol) {
            return AccountExecutionResult::skipped(
                &account.id,
                vec!["Symbol not enabled for account".to_string()],
            );
        }
        match self.registry.runtime_state(&account.id).await {
            Some(state) if state.paused => {
                return AccountExecutionResult::skipped(&account.id, vec!["paused".to_string()]);
            }
            Some(state) if !state.is_connected => {
                return AccountExecutionResult::skipped(
                    &account.id,
                    vec!["disconnected".to_string()],
                );
            }
            Some(_) => {}
            None => {
                return AccountExecutionResult::skipped(
                    &account.id,
                    vec!["Account not registered".to_string()],
                );
            }
        }

        // 2. Kill switch; a block pauses the account before skipping
        let risk_context = self
            .risk
            .build_context(
                account,
                context.concurrent_trades,
                context.current_exposure,
                guardrail_mode,
                context.equity_fallback,
            )
            .await;
        let ks_context = KillSwitchContext {
            symbol: signal.symbol.clone(),
            today_realized_pnl: risk_context.today_realized_pnl,
            week_realized_pnl: risk_context.week_realized_pnl,
            consecutive_losses: context.consecutive_losses,
            current_spread_pips: context.spread_pips,
            current_exposure: context.current_exposure,
            timestamp_ms: context.now_ms,
        };
        let ks_verdict = self.kill_switch.evaluate(account, &ks_context).await;
        if ks_verdict.blocked {
            let joined = ks_verdict.reasons.join("; ");
            self.registry.pause_account(&account.id, &joined).await;
            let mut result =
                AccountExecutionResult::skipped(&account.id, ks_verdict.reasons.clone());
            result.kill_switch_reason = Some(joined);
            return result;
        }

        // 3. Risk limits
        let risk_verdict = self.risk.can_take_new_trade(account, &risk_context, None);
        if !risk_verdict.allowed {
            let reason = risk_verdict
                .reason
                .unwrap_or_else(|| "Risk check failed".to_string());
            let mut result = AccountExecutionResult::skipped(&account.id, vec![reason.clone()]);
            result.risk_reason = Some(reason);
            return result;
        }

        // 4. Execution filter
        let runtime = self.registry.runtime_state(&account.id).await;
        let filter_context = FilterContext {
            symbol: signal.symbol.clone(),
            now_ms: context.now_ms,
            trades_taken_today: risk_context.trades_taken_today,
            last_trade_time: runtime.as_ref().and_then(|r| r.last_trade_time),
            last_trade_symbol: runtime.as_ref().and_then(|r| r.last_trade_symbol.clone()),
            current_spread_pips: context.spread_pips,
        };
        let filter_decision = self.filter.check(account, &filter_context);
        if filter_decision.action == crate::domain::trading::decision::TradeAction::Skip {
            let joined = filter_decision.reasons.join("; ");
            let mut result =
                AccountExecutionResult::skipped(&account.id, filter_decision.reasons.clone());
            result.filter_reason = Some(joined);
            return result;
        }

        // 5. Lot sizing from the stop distance
        let spec = spec_for(&signal.symbol);
        let stop_pips = spec.to_pips((signal.entry - signal.stop_loss).abs());
        let lot_size = self.risk.calculate_lot_size(
            account,
            &risk_context,
            stop_pips,
            &signal.symbol,
            None,
            risk_verdict.adjusted_risk_percent,
        );

        // 6. Market hours
        if self.env.check_market_hours && !market_open(context.now_ms) {
            return AccountExecutionResult::skipped(
                &account.id,
                vec!["Market closed (weekend or Friday close)".to_string()],
            );
        }

        // 7. Broker call
        let order = BrokerOrder {
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            entry_type: signal.entry_type,
            entry_price: signal.entry,
            lot_size,
            stop_loss_price: signal.stop_loss,
            take_profit_price: signal.take_profit,
            strategy_id: strategy.to_string(),
            metadata: serde_json::json!({
                "accountId": account.id,
                "tenantId": account.tenant_id(),
                "clientOrderId": Uuid::new_v4().to_string(),
                "confluenceScore": signal.confluence_score,
            }),
        };

        match self
            .connector
            .open_trade(&account.mt5.base_url, &order)
            .await
        {
            Ok(ticket) => {
                self.registry
                    .record_trade(&account.id, &signal.symbol, context.now_ms)
                    .await;
                info!(
                    "Account {} opened {} {} ({} lots), ticket {}",
                    account.id, signal.direction, signal.symbol, lot_size, ticket.ticket
                );
                AccountExecutionResult::traded(&account.id, ticket.ticket, lot_size)
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Account {} broker call failed: {}", account.id, message);
                self.registry
                    .record_error(&account.id, &message, context.now_ms)
                    .await;
                AccountExecutionResult::failed(&account.id, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::accounts::execution_filter::ExecutionFilterConfig;
    use crate::domain::market::session::TradingSession;
    use crate::domain::market::structure::Trend;
    use crate::domain::market::zones::PdZone;
    use crate::domain::trading::account::{KillSwitchConfig, Mt5Endpoint, RiskLimits};
    use crate::domain::trading::decision::TradeAction;
    use crate::domain::trading::types::{Direction, EntryType};
    use crate::infrastructure::mock::MockBrokerConnector;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use rust_decimal_macros::dec;

    fn account(id: &str) -> AccountInfo {
        AccountInfo {
            id: id.to_string(),
            name: id.to_string(),
            mt5: Mt5Endpoint {
                base_url: format!("http://localhost:800{}", id.len()),
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
                enabled: true,
                daily_dd_limit: dec!(200),
                weekly_dd_limit: dec!(600),
                max_consecutive_losses: None,
                max_spread_pips: None,
                max_exposure: None,
            },
            execution_filter: None,
            enabled: true,
            metadata: None,
        }
    }

    fn signal() -> Signal {
        Signal {
            symbol: "XAUUSD".to_string(),
            direction: Direction::Buy,
            entry: dec!(4101.5),
            stop_loss: dec!(4097.0),
            take_profit: dec!(4115.0),
            entry_type: EntryType::Limit,
            htf_trend: Trend::Bullish,
            itf_flow: Trend::Bullish,
            ltf_bos: true,
            premium_discount: PdZone::Discount,
            ob_levels: vec![],
            fvg_levels: vec![],
            smt: false,
            volume_imbalance: false,
            session: vec![TradingSession::London],
            confluence_reasons: vec![],
            confluence_score: 72.0,
            timestamp: 0,
            meta: serde_json::Value::Null,
        }
    }

    /// Tuesday 10:00 New York: market open, London session
    fn weekday_ms() -> i64 {
        New_York
            .with_ymd_and_hms(2025, 3, 4, 10, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    fn context() -> ExecutionContext {
        ExecutionContext {
            current_price: dec!(4101.8),
            spread_pips: 1.5,
            current_exposure: Decimal::ZERO,
            concurrent_trades: 0,
            consecutive_losses: 0,
            equity_fallback: dec!(10000),
            now_ms: weekday_ms(),
        }
    }

    struct Fixture {
        engine: AccountExecutionEngine,
        registry: Arc<AccountRegistry>,
        connector: Arc<MockBrokerConnector>,
    }

    fn fixture(accounts: Vec<AccountInfo>) -> Fixture {
        let registry = Arc::new(AccountRegistry::from_accounts(accounts));
        let connector = MockBrokerConnector::new();
        let engine = AccountExecutionEngine::new(
            registry.clone(),
            Arc::new(AccountRiskService::new(None, None)),
            Arc::new(KillSwitchService::new(None, ExecutionEnvConfig::default())),
            Arc::new(AccountExecutionFilter::new(ExecutionFilterConfig::default())),
            connector.clone(),
            ExecutionEnvConfig::default(),
        );
        Fixture {
            engine,
            registry,
            connector,
        }
    }

    #[tokio::test]
    async fn test_happy_path_trades() {
        let f = fixture(vec![account("a1")]);
        f.connector.push_success("881234").await;

        let result = f
            .engine
            .execute_for_account(
                &f.registry.account("a1").unwrap(),
                &signal(),
                &context(),
                GuardrailMode::Normal,
                "smc-ict",
            )
            .await;

        assert!(result.success);
        assert_eq!(result.decision, TradeAction::Trade);
        assert_eq!(result.ticket.as_deref(), Some("881234"));
        // Entry 4101.5, SL 4097.0 -> 45 pips; 1% of 10k over 45*0.1*100
        assert_eq!(result.lot_size, Some(dec!(0.22)));

        let state = f.registry.runtime_state("a1").await.unwrap();
        assert_eq!(state.last_trade_symbol.as_deref(), Some("XAUUSD"));
    }

    #[tokio::test]
    async fn test_paused_account_skips_without_broker_call() {
        let f = fixture(vec![account("a1")]);
        f.registry.pause_account("a1", "manual").await;

        let result = f
            .engine
            .execute_for_account(
                &f.registry.account("a1").unwrap(),
                &signal(),
                &context(),
                GuardrailMode::Normal,
                "smc-ict",
            )
            .await;

        assert_eq!(result.decision, TradeAction::Skip);
        assert_eq!(result.reasons, vec!["paused".to_string()]);
        assert_eq!(f.connector.call_count(), 0);
    }

    #[tokio::test]
    async fn test_broker_4xx_maps_to_failed_result() {
        let f = fixture(vec![account("a1")]);
        f.connector.push_broker_error(400, "Invalid volume").await;

        let result = f
            .engine
            .execute_for_account(
                &f.registry.account("a1").unwrap(),
                &signal(),
                &context(),
                GuardrailMode::Normal,
                "smc-ict",
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.decision, TradeAction::Skip);
        assert_eq!(
            result.error.as_deref(),
            Some("MT5 Connector returned status 400: Invalid volume")
        );
        let state = f.registry.runtime_state("a1").await.unwrap();
        assert!(state.last_error.unwrap().contains("status 400"));
    }

    #[tokio::test]
    async fn test_market_hours_gate() {
        let f = fixture(vec![account("a1")]);
        let mut ctx = context();
        // Saturday noon New York
        ctx.now_ms = New_York
            .with_ymd_and_hms(2025, 3, 8, 12, 0, 0)
            .unwrap()
            .timestamp_millis();

        let result = f
            .engine
            .execute_for_account(
                &f.registry.account("a1").unwrap(),
                &signal(),
                &ctx,
                GuardrailMode::Normal,
                "smc-ict",
            )
            .await;

        assert_eq!(result.decision, TradeAction::Skip);
        assert!(result.reasons[0].contains("Market closed"));
        assert_eq!(f.connector.call_count(), 0);
    }

    #[tokio::test]
    async fn test_guardrail_blocked_sets_risk_reason() {
        let f = fixture(vec![account("a1")]);
        let result = f
            .engine
            .execute_for_account(
                &f.registry.account("a1").unwrap(),
                &signal(),
                &context(),
                GuardrailMode::Blocked,
                "smc-ict",
            )
            .await;

        assert_eq!(result.decision, TradeAction::Skip);
        assert_eq!(
            result.risk_reason.as_deref(),
            Some("News guardrail blocked trading")
        );
        assert_eq!(f.connector.call_count(), 0);
    }
}
