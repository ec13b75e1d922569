//! PostgreSQL repository implementations.
//!
//! All statements are parameterised; timestamps are stored as UTC
//! `TIMESTAMP` and converted from the engine's epoch-millis representation
//! at this boundary only.

use crate::domain::repositories::{
    EquityRepository, EquitySnapshot, KillSwitchEvent, KillSwitchEventRepository,
    KillSwitchEventType, TradeDecisionRecord, TradeDecisionRepository,
};
use crate::domain::trading::decision::TradeAction;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use sqlx::postgres::PgPool;
use sqlx::Row;

fn to_naive(timestamp_ms: i64) -> NaiveDateTime {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp_millis(0).unwrap())
        .naive_utc()
}

fn to_millis(naive: NaiveDateTime) -> i64 {
    naive.and_utc().timestamp_millis()
}

fn decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

pub struct PgEquityRepository {
    pool: PgPool,
}

impl PgEquityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EquityRepository for PgEquityRepository {
    async fn latest(&self, account_id: &str) -> Result<Option<EquitySnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT account_id, broker_account, timestamp, balance, equity,
                   floating_pnl, closed_pnl_today, closed_pnl_week, max_drawdown_abs
            FROM account_live_equity
            WHERE account_id = $1
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query latest equity")?;

        Ok(row.map(|row| EquitySnapshot {
            account_id: row.get("account_id"),
            broker_account: row.get("broker_account"),
            timestamp: to_millis(row.get("timestamp")),
            balance: decimal(row.get("balance")),
            equity: decimal(row.get("equity")),
            floating_pnl: decimal(row.get("floating_pnl")),
            closed_pnl_today: decimal(row.get("closed_pnl_today")),
            closed_pnl_week: decimal(row.get("closed_pnl_week")),
            max_drawdown_abs: decimal(row.get("max_drawdown_abs")),
        }))
    }

    async fn record(&self, snapshot: &EquitySnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO account_live_equity
                (account_id, broker_account, timestamp, balance, equity,
                 floating_pnl, closed_pnl_today, closed_pnl_week, max_drawdown_abs)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&snapshot.account_id)
        .bind(&snapshot.broker_account)
        .bind(to_naive(snapshot.timestamp))
        .bind(snapshot.balance.to_f64().unwrap_or(0.0))
        .bind(snapshot.equity.to_f64().unwrap_or(0.0))
        .bind(snapshot.floating_pnl.to_f64().unwrap_or(0.0))
        .bind(snapshot.closed_pnl_today.to_f64().unwrap_or(0.0))
        .bind(snapshot.closed_pnl_week.to_f64().unwrap_or(0.0))
        .bind(snapshot.max_drawdown_abs.to_f64().unwrap_or(0.0))
        .execute(&self.pool)
        .await
        .context("Failed to insert equity snapshot")?;
        Ok(())
    }
}

pub struct PgTradeDecisionRepository {
    pool: PgPool,
}

impl PgTradeDecisionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeDecisionRepository for PgTradeDecisionRepository {
    async fn record(&self, row: &TradeDecisionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO account_trade_decisions
                (account_id, timestamp, symbol, strategy, decision,
                 risk_reason, filter_reason, kill_switch_reason, execution_result, pnl)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&row.account_id)
        .bind(to_naive(row.timestamp))
        .bind(&row.symbol)
        .bind(&row.strategy)
        .bind(row.decision.to_string())
        .bind(&row.risk_reason)
        .bind(&row.filter_reason)
        .bind(&row.kill_switch_reason)
        .bind(&row.execution_result)
        .bind(row.pnl)
        .execute(&self.pool)
        .await
        .context("Failed to insert trade decision")?;
        Ok(())
    }

    async fn trades_today(&self, account_id: &str) -> Result<u32> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS trades
            FROM account_trade_decisions
            WHERE account_id = $1
              AND decision = $2
              AND timestamp >= DATE_TRUNC('day', NOW() AT TIME ZONE 'utc')
            "#,
        )
        .bind(account_id)
        .bind(TradeAction::Trade.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to count today's trades")?;
        let trades: i64 = row.get("trades");
        Ok(trades.max(0) as u32)
    }
}

pub struct PgKillSwitchEventRepository {
    pool: PgPool,
}

impl PgKillSwitchEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KillSwitchEventRepository for PgKillSwitchEventRepository {
    async fn append(&self, event: &KillSwitchEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO account_kill_switch_events (account_id, event_type, reason, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&event.account_id)
        .bind(event.event_type.to_string())
        .bind(&event.reason)
        .bind(to_naive(event.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to append kill switch event")?;
        Ok(())
    }

    async fn latest_per_account(&self) -> Result<Vec<KillSwitchEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (account_id) account_id, event_type, reason, created_at
            FROM account_kill_switch_events
            ORDER BY account_id, created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load kill switch events")?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let event_type: String = row.get("event_type");
                KillSwitchEvent {
                    account_id: row.get("account_id"),
                    event_type: if event_type == "activated" {
                        KillSwitchEventType::Activated
                    } else {
                        KillSwitchEventType::Deactivated
                    },
                    reason: row.get::<Option<String>, _>("reason").unwrap_or_default(),
                    created_at: to_millis(row.get("created_at")),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_round_trip() {
        let ms = 1_700_000_123_456i64;
        assert_eq!(to_millis(to_naive(ms)), ms);
    }

    #[test]
    fn test_decimal_conversion_is_total() {
        assert_eq!(decimal(f64::NAN), Decimal::ZERO);
        assert_eq!(decimal(125.5), Decimal::from_f64(125.5).unwrap());
    }
}
