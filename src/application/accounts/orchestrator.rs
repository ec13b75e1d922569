//! Distributed execution orchestrator.
//!
//! One signal fans out to every eligible account as an independent task.
//! Tasks never cancel each other; a panic in one becomes a failed result
//! for that account only. Broker concurrency is bounded by a semaphore.
//! Every per-account result is persisted as a decision row; persistence
//! failure is logged and never fatal. The orchestrator always returns an
//! aggregate and never throws to its caller.

use crate::application::accounts::engine::{AccountExecutionEngine, ExecutionContext};
use crate::application::accounts::registry::AccountRegistry;
use crate::domain::repositories::{TradeDecisionRecord, TradeDecisionRepository};
use crate::domain::trading::account::GuardrailMode;
use crate::domain::trading::decision::{
    AccountExecutionResult, AggregatedExecutionResult, FailedAccount, SkippedAccount, TradeAction,
};
use crate::domain::trading::types::Signal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Upper bound on concurrent broker calls per signal
const MAX_CONCURRENCY: usize = 32;

pub struct ExecutionOrchestrator {
    registry: Arc<AccountRegistry>,
    engine: Arc<AccountExecutionEngine>,
    decisions: Option<Arc<dyn TradeDecisionRepository>>,
}

impl ExecutionOrchestrator {
    pub fn new(
        registry: Arc<AccountRegistry>,
        engine: Arc<AccountExecutionEngine>,
        decisions: Option<Arc<dyn TradeDecisionRepository>>,
    ) -> Self {
        Self {
            registry,
            engine,
            decisions,
        }
    }

    pub async fn execute(
        &self,
        signal: &Signal,
        context: &ExecutionContext,
        guardrail_mode: GuardrailMode,
        strategy: &str,
    ) -> AggregatedExecutionResult {
        let eligible = self.registry.accounts_for_symbol(&signal.symbol);
        info!(
            "Executing {} {} across {} accounts",
            signal.direction,
            signal.symbol,
            eligible.len()
        );

        let semaphore = Arc::new(Semaphore::new(eligible.len().clamp(1, MAX_CONCURRENCY)));
        let signal = Arc::new(signal.clone());
        let strategy = strategy.to_string();

        let mut tasks: JoinSet<AccountExecutionResult> = JoinSet::new();
        let mut task_accounts: HashMap<tokio::task::Id, String> = HashMap::new();

        for account in &eligible {
            let engine = self.engine.clone();
            let account = account.clone();
            let account_id = account.id.clone();
            let signal = signal.clone();
            let context = context.clone();
            let strategy = strategy.clone();
            let semaphore = semaphore.clone();
            let handle = tasks.spawn(async move {
                // Closed semaphore cannot happen; treat it as a skip anyway
                let _permit = semaphore.acquire().await;
                engine
                    .execute_for_account(&account, &signal, &context, guardrail_mode, &strategy)
                    .await
            });
            task_accounts.insert(handle.id(), account_id);
        }

        let mut results: Vec<AccountExecutionResult> = Vec::with_capacity(eligible.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, result)) => results.push(result),
                Err(join_error) => {
                    // A panicked task fails its own account; peers proceed
                    let account_id = task_accounts
                        .get(&join_error.id())
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string());
                    error!(
                        "Execution task for {} aborted: {}",
                        account_id, join_error
                    );
                    results.push(AccountExecutionResult::failed(
                        account_id,
                        format!("execution task aborted: {}", join_error),
                    ));
                }
            }
        }
        // Deterministic aggregation order regardless of completion order
        results.sort_by(|a, b| a.account_id.cmp(&b.account_id));

        for result in &results {
            self.persist_decision(signal.as_ref(), context, &strategy, result)
                .await;
        }

        let mut traded_accounts = Vec::new();
        let mut skipped_accounts = Vec::new();
        let mut failed_accounts = Vec::new();
        for result in &results {
            if result.decision == TradeAction::Trade && result.success {
                traded_accounts.push(result.account_id.clone());
            } else if let Some(error) = &result.error {
                failed_accounts.push(FailedAccount {
                    account_id: result.account_id.clone(),
                    error: error.clone(),
                });
            } else {
                skipped_accounts.push(SkippedAccount {
                    account_id: result.account_id.clone(),
                    reason: result.skip_reason(),
                });
            }
        }

        info!(
            "Fan-out complete for {}: {} traded, {} skipped, {} failed",
            signal.symbol,
            traded_accounts.len(),
            skipped_accounts.len(),
            failed_accounts.len()
        );

        AggregatedExecutionResult {
            symbol: signal.symbol.clone(),
            strategy,
            timestamp: context.now_ms,
            total_accounts: eligible.len(),
            traded_accounts,
            skipped_accounts,
            failed_accounts,
            results,
        }
    }

    async fn persist_decision(
        &self,
        signal: &Signal,
        context: &ExecutionContext,
        strategy: &str,
        result: &AccountExecutionResult,
    ) {
        let Some(repo) = &self.decisions else {
            return;
        };
        let row = TradeDecisionRecord {
            account_id: result.account_id.clone(),
            timestamp: context.now_ms,
            symbol: signal.symbol.clone(),
            strategy: strategy.to_string(),
            decision: result.decision,
            risk_reason: result.risk_reason.clone(),
            filter_reason: result.filter_reason.clone(),
            kill_switch_reason: result.kill_switch_reason.clone(),
            execution_result: serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
            pnl: None,
        };
        if let Err(e) = repo.record(&row).await {
            error!(
                "Failed to persist decision for {}: {}",
                result.account_id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::accounts::execution_filter::{
        AccountExecutionFilter, ExecutionFilterConfig,
    };
    use crate::application::accounts::kill_switch::KillSwitchService;
    use crate::application::accounts::risk::AccountRiskService;
    use crate::config::ExecutionEnvConfig;
    use crate::domain::market::session::TradingSession;
    use crate::domain::market::structure::Trend;
    use crate::domain::market::zones::PdZone;
    use crate::domain::trading::account::{
        AccountInfo, KillSwitchConfig, Mt5Endpoint, RiskLimits,
    };
    use crate::domain::trading::types::{Direction, EntryType};
    use crate::infrastructure::mock::MockBrokerConnector;
    use crate::infrastructure::repositories::in_memory::InMemoryTradeDecisionRepository;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn account(id: &str) -> AccountInfo {
        AccountInfo {
            id: id.to_string(),
            name: id.to_string(),
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

    fn context() -> ExecutionContext {
        ExecutionContext {
            current_price: dec!(4101.8),
            spread_pips: 1.5,
            current_exposure: Decimal::ZERO,
            concurrent_trades: 0,
            consecutive_losses: 0,
            equity_fallback: dec!(10000),
            now_ms: New_York
                .with_ymd_and_hms(2025, 3, 4, 10, 0, 0)
                .unwrap()
                .timestamp_millis(),
        }
    }

    struct Fixture {
        orchestrator: ExecutionOrchestrator,
        registry: Arc<AccountRegistry>,
        connector: Arc<MockBrokerConnector>,
        decisions: Arc<InMemoryTradeDecisionRepository>,
    }

    fn fixture(accounts: Vec<AccountInfo>) -> Fixture {
        let registry = Arc::new(AccountRegistry::from_accounts(accounts));
        let connector = MockBrokerConnector::new();
        let decisions = Arc::new(InMemoryTradeDecisionRepository::new());
        let engine = Arc::new(AccountExecutionEngine::new(
            registry.clone(),
            Arc::new(AccountRiskService::new(None, None)),
            Arc::new(KillSwitchService::new(None, ExecutionEnvConfig::default())),
            Arc::new(AccountExecutionFilter::new(ExecutionFilterConfig::default())),
            connector.clone(),
            ExecutionEnvConfig::default(),
        ));
        let orchestrator =
            ExecutionOrchestrator::new(registry.clone(), engine, Some(decisions.clone()));
        Fixture {
            orchestrator,
            registry,
            connector,
            decisions,
        }
    }

    #[tokio::test]
    async fn test_aggregation_completeness() {
        let f = fixture(vec![account("a1"), account("a2"), account("a3")]);
        f.registry.pause_account("a2", "manual").await;
        f.connector.push_success("t1").await;
        f.connector.push_success("t2").await;

        let aggregated = f
            .orchestrator
            .execute(&signal(), &context(), GuardrailMode::Normal, "smc-ict")
            .await;

        assert_eq!(aggregated.total_accounts, 3);
        assert_eq!(
            aggregated.traded_accounts.len()
                + aggregated.skipped_accounts.len()
                + aggregated.failed_accounts.len(),
            3
        );
        assert_eq!(aggregated.results.len(), 3);
        // One decision row per account per signal
        assert_eq!(f.decisions.all().await.len(), 3);
    }

    #[tokio::test]
    async fn test_no_eligible_accounts_yields_empty_aggregate() {
        let f = fixture(vec![]);
        let aggregated = f
            .orchestrator
            .execute(&signal(), &context(), GuardrailMode::Normal, "smc-ict")
            .await;
        assert_eq!(aggregated.total_accounts, 0);
        assert!(aggregated.results.is_empty());
        assert_eq!(f.connector.call_count(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_not_fatal() {
        struct FailingRepo;
        #[async_trait]
        impl TradeDecisionRepository for FailingRepo {
            async fn record(&self, _row: &TradeDecisionRecord) -> Result<()> {
                anyhow::bail!("database unreachable")
            }
            async fn trades_today(&self, _account_id: &str) -> Result<u32> {
                anyhow::bail!("database unreachable")
            }
        }

        let registry = Arc::new(AccountRegistry::from_accounts(vec![account("a1")]));
        let connector = MockBrokerConnector::new();
        connector.push_success("t1").await;
        let engine = Arc::new(AccountExecutionEngine::new(
            registry.clone(),
            Arc::new(AccountRiskService::new(None, Some(Arc::new(FailingRepo)))),
            Arc::new(KillSwitchService::new(None, ExecutionEnvConfig::default())),
            Arc::new(AccountExecutionFilter::new(ExecutionFilterConfig::default())),
            connector.clone(),
            ExecutionEnvConfig::default(),
        ));
        let orchestrator =
            ExecutionOrchestrator::new(registry, engine, Some(Arc::new(FailingRepo)));

        let aggregated = orchestrator
            .execute(&signal(), &context(), GuardrailMode::Normal, "smc-ict")
            .await;

        // The account still traded even though every insert failed
        assert_eq!(aggregated.traded_accounts, vec!["a1".to_string()]);
        assert!(aggregated.failed_accounts.is_empty());
    }

    #[tokio::test]
    async fn test_results_sorted_by_account_id() {
        let f = fixture(vec![account("c3"), account("a1"), account("b2")]);
        let aggregated = f
            .orchestrator
            .execute(&signal(), &context(), GuardrailMode::Normal, "smc-ict")
            .await;
        let ids: Vec<&str> = aggregated
            .results
            .iter()
            .map(|r| r.account_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a1", "b2", "c3"]);
    }
}
