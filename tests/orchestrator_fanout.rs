//! Distributed execution scenarios: kill-switch lifecycle, broker error
//! classification, and partial fan-out aggregation.

use chrono::TimeZone;
use chrono_tz::America::New_York;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tradefleet::application::accounts::engine::{AccountExecutionEngine, ExecutionContext};
use tradefleet::application::accounts::execution_filter::{
    AccountExecutionFilter, ExecutionFilterConfig,
};
use tradefleet::application::accounts::kill_switch::KillSwitchService;
use tradefleet::application::accounts::orchestrator::ExecutionOrchestrator;
use tradefleet::application::accounts::registry::AccountRegistry;
use tradefleet::application::accounts::risk::AccountRiskService;
use tradefleet::config::ExecutionEnvConfig;
use tradefleet::domain::market::session::TradingSession;
use tradefleet::domain::market::structure::Trend;
use tradefleet::domain::market::zones::PdZone;
use tradefleet::domain::repositories::{EquityRepository, EquitySnapshot, KillSwitchEventType};
use tradefleet::domain::trading::account::{
    AccountInfo, GuardrailMode, KillSwitchConfig, Mt5Endpoint, RiskLimits,
};
use tradefleet::domain::trading::decision::TradeAction;
use tradefleet::domain::trading::types::{Direction, EntryType, Signal};
use tradefleet::infrastructure::mock::MockBrokerConnector;
use tradefleet::infrastructure::repositories::in_memory::{
    InMemoryEquityRepository, InMemoryKillSwitchEventRepository, InMemoryTradeDecisionRepository,
};

fn account(id: &str, daily_dd_limit: Decimal) -> AccountInfo {
    AccountInfo {
        id: id.to_string(),
        name: format!("Account {}", id),
        mt5: Mt5Endpoint {
            base_url: format!("http://broker-{}:8080", id),
            login: 100 + id.len() as i64,
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
            daily_dd_limit,
            weekly_dd_limit: dec!(2000),
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
        stop_loss: dec!(4096.5), // 5.0 distance = 50 pips on gold
        take_profit: dec!(4116.5),
        entry_type: EntryType::Limit,
        htf_trend: Trend::Bullish,
        itf_flow: Trend::Bullish,
        ltf_bos: true,
        premium_discount: PdZone::Discount,
        ob_levels: vec![(dec!(4096.3), dec!(4110.0))],
        fvg_levels: vec![(dec!(4101.3), dec!(4104.8))],
        smt: false,
        volume_imbalance: true,
        session: vec![TradingSession::London],
        confluence_reasons: vec!["HTF bias: bullish".to_string()],
        confluence_score: 78.0,
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

struct Harness {
    registry: Arc<AccountRegistry>,
    kill_switch: Arc<KillSwitchService>,
    connector: Arc<MockBrokerConnector>,
    decisions: Arc<InMemoryTradeDecisionRepository>,
    ks_events: Arc<InMemoryKillSwitchEventRepository>,
    equity: Arc<InMemoryEquityRepository>,
    orchestrator: ExecutionOrchestrator,
}

fn harness(accounts: Vec<AccountInfo>) -> Harness {
    let registry = Arc::new(AccountRegistry::from_accounts(accounts));
    let connector = MockBrokerConnector::new();
    let decisions = Arc::new(InMemoryTradeDecisionRepository::new());
    let ks_events = Arc::new(InMemoryKillSwitchEventRepository::new());
    let equity = Arc::new(InMemoryEquityRepository::new());
    let kill_switch = Arc::new(KillSwitchService::new(
        Some(ks_events.clone()),
        ExecutionEnvConfig::default(),
    ));
    let risk = Arc::new(AccountRiskService::new(
        Some(equity.clone()),
        Some(decisions.clone()),
    ));
    let engine = Arc::new(AccountExecutionEngine::new(
        registry.clone(),
        risk,
        kill_switch.clone(),
        Arc::new(AccountExecutionFilter::new(ExecutionFilterConfig::default())),
        connector.clone(),
        ExecutionEnvConfig::default(),
    ));
    let orchestrator =
        ExecutionOrchestrator::new(registry.clone(), engine, Some(decisions.clone()));
    Harness {
        registry,
        kill_switch,
        connector,
        decisions,
        ks_events,
        equity,
        orchestrator,
    }
}

fn equity_snapshot(account_id: &str, closed_pnl_today: Decimal) -> EquitySnapshot {
    EquitySnapshot {
        account_id: account_id.to_string(),
        broker_account: None,
        timestamp: weekday_ms() - 60_000,
        balance: dec!(10000),
        equity: dec!(10000),
        floating_pnl: Decimal::ZERO,
        closed_pnl_today,
        closed_pnl_week: closed_pnl_today,
        max_drawdown_abs: Decimal::ZERO,
    }
}

#[tokio::test]
async fn kill_switch_activates_pauses_and_short_circuits() {
    // dailyDDLimit 200 against a realized -210 day
    let h = harness(vec![account("a1", dec!(200))]);
    h.equity
        .record(&equity_snapshot("a1", dec!(-210)))
        .await
        .unwrap();

    let first = h
        .orchestrator
        .execute(&signal(), &context(), GuardrailMode::Normal, "smc-ict")
        .await;

    // Blocked with a kill switch reason, no broker call
    assert_eq!(first.traded_accounts.len(), 0);
    assert_eq!(first.skipped_accounts.len(), 1);
    let result = &first.results[0];
    assert_eq!(result.decision, TradeAction::Skip);
    assert!(
        result
            .kill_switch_reason
            .as_deref()
            .unwrap()
            .contains("Daily drawdown limit hit")
    );
    assert_eq!(h.connector.call_count(), 0);

    // One activated event row, registry paused
    let events = h.ks_events.all().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, KillSwitchEventType::Activated);
    assert!(h.registry.runtime_state("a1").await.unwrap().paused);
    assert!(h.kill_switch.state("a1").await.unwrap().active);

    // Re-execution short-circuits on the paused runtime state; the broker
    // is still never reached and no further event rows appear
    let second = h
        .orchestrator
        .execute(&signal(), &context(), GuardrailMode::Normal, "smc-ict")
        .await;
    assert_eq!(second.skipped_accounts.len(), 1);
    assert_eq!(second.skipped_accounts[0].reason, "paused");
    assert_eq!(h.connector.call_count(), 0);
    assert_eq!(h.ks_events.all().await.len(), 1);
}

#[tokio::test]
async fn broker_4xx_is_classified_as_failed_skip() {
    let h = harness(vec![account("a1", dec!(10000))]);
    h.connector.push_broker_error(400, "Invalid volume").await;

    let aggregated = h
        .orchestrator
        .execute(&signal(), &context(), GuardrailMode::Normal, "smc-ict")
        .await;

    assert!(aggregated.traded_accounts.is_empty());
    assert_eq!(aggregated.failed_accounts.len(), 1);
    assert_eq!(
        aggregated.failed_accounts[0].error,
        "MT5 Connector returned status 400: Invalid volume"
    );
    let result = &aggregated.results[0];
    assert!(!result.success);
    assert_eq!(result.decision, TradeAction::Skip);
    assert!(result.ticket.is_none());
    assert!(
        h.registry
            .runtime_state("a1")
            .await
            .unwrap()
            .last_error
            .unwrap()
            .contains("status 400")
    );
}

#[tokio::test]
async fn partial_fanout_aggregates_and_persists_all_decisions() {
    // a1 paused, a2 risk-blocked on daily loss, a3 healthy
    let mut blocked = account("a2", dec!(10000));
    blocked.kill_switch.enabled = false;
    let h = harness(vec![
        account("a1", dec!(10000)),
        blocked,
        account("a3", dec!(10000)),
    ]);
    h.registry.pause_account("a1", "paused").await;
    h.equity
        .record(&equity_snapshot("a2", dec!(-400)))
        .await
        .unwrap();
    h.connector.push_success("778001").await;

    let aggregated = h
        .orchestrator
        .execute(&signal(), &context(), GuardrailMode::Normal, "smc-ict")
        .await;

    assert_eq!(aggregated.total_accounts, 3);
    assert_eq!(aggregated.traded_accounts, vec!["a3".to_string()]);
    assert!(aggregated.failed_accounts.is_empty());
    assert_eq!(aggregated.skipped_accounts.len(), 2);

    let a1 = aggregated
        .skipped_accounts
        .iter()
        .find(|s| s.account_id == "a1")
        .unwrap();
    assert_eq!(a1.reason, "paused");
    let a2 = aggregated
        .skipped_accounts
        .iter()
        .find(|s| s.account_id == "a2")
        .unwrap();
    assert!(a2.reason.starts_with("Daily loss limit reached"));

    // S6 shape: equity 10,000 at 1% over 50 pips of gold = 0.20 lots
    let a3 = aggregated
        .results
        .iter()
        .find(|r| r.account_id == "a3")
        .unwrap();
    assert_eq!(a3.lot_size, Some(dec!(0.20)));
    assert_eq!(a3.ticket.as_deref(), Some("778001"));

    // One decision row per account
    let rows = h.decisions.all().await;
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().any(|r| r.account_id == "a2"
        && r.risk_reason
            .as_deref()
            .unwrap()
            .starts_with("Daily loss limit reached")));
    assert!(
        rows.iter()
            .any(|r| r.account_id == "a3" && r.decision == TradeAction::Trade)
    );
}

#[tokio::test]
async fn broker_order_carries_contract_fields() {
    let h = harness(vec![account("a1", dec!(10000))]);
    h.connector.push_success("12345").await;

    h.orchestrator
        .execute(&signal(), &context(), GuardrailMode::Normal, "smc-ict")
        .await;

    let orders = h.connector.orders().await;
    assert_eq!(orders.len(), 1);
    let (base_url, order) = &orders[0];
    assert_eq!(base_url, "http://broker-a1:8080");
    assert_eq!(order.symbol, "XAUUSD");
    assert_eq!(order.direction, Direction::Buy);
    assert_eq!(order.entry_type, EntryType::Limit);
    assert_eq!(order.entry_price, dec!(4101.5));
    assert_eq!(order.stop_loss_price, dec!(4096.5));
    assert_eq!(order.strategy_id, "smc-ict");
    assert_eq!(order.metadata["accountId"], "a1");
}

#[tokio::test]
async fn guardrail_reduced_halves_position_size() {
    let h = harness(vec![account("a1", dec!(10000))]);
    h.connector.push_success("5555").await;

    let aggregated = h
        .orchestrator
        .execute(&signal(), &context(), GuardrailMode::Reduced, "smc-ict")
        .await;

    let result = &aggregated.results[0];
    assert_eq!(result.decision, TradeAction::Trade);
    // Half of the normal 0.20
    assert_eq!(result.lot_size, Some(dec!(0.10)));
}
