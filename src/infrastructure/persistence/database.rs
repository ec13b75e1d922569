//! PostgreSQL pool and schema initialization.
//!
//! Initialization is idempotent (`CREATE TABLE IF NOT EXISTS` /
//! `CREATE INDEX IF NOT EXISTS`) and re-runnable; the Postgres duplicate
//! index error `42P17` is swallowed. Connection failure is reported to the
//! caller, who degrades the engine to in-memory repositories; persistence
//! must never be the reason the process dies.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS account_live_equity (
        id BIGSERIAL PRIMARY KEY,
        account_id TEXT NOT NULL,
        broker_account TEXT,
        timestamp TIMESTAMP NOT NULL,
        balance DOUBLE PRECISION NOT NULL,
        equity DOUBLE PRECISION NOT NULL,
        floating_pnl DOUBLE PRECISION NOT NULL DEFAULT 0,
        closed_pnl_today DOUBLE PRECISION NOT NULL DEFAULT 0,
        closed_pnl_week DOUBLE PRECISION NOT NULL DEFAULT 0,
        max_drawdown_abs DOUBLE PRECISION NOT NULL DEFAULT 0
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_live_equity_account_time
    ON account_live_equity (account_id, timestamp DESC);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS account_trade_decisions (
        id BIGSERIAL PRIMARY KEY,
        account_id TEXT NOT NULL,
        timestamp TIMESTAMP NOT NULL,
        symbol TEXT NOT NULL,
        strategy TEXT NOT NULL,
        decision TEXT NOT NULL CHECK (decision IN ('TRADE', 'SKIP')),
        risk_reason TEXT,
        filter_reason TEXT,
        kill_switch_reason TEXT,
        execution_result JSONB,
        pnl DOUBLE PRECISION
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_trade_decisions_account_time
    ON account_trade_decisions (account_id, timestamp DESC);
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_trade_decisions_account_symbol
    ON account_trade_decisions (account_id, symbol);
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_trade_decisions_account_day
    ON account_trade_decisions (account_id, (DATE(timestamp)));
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS account_kill_switch_events (
        id BIGSERIAL PRIMARY KEY,
        account_id TEXT NOT NULL,
        event_type TEXT NOT NULL CHECK (event_type IN ('activated', 'deactivated')),
        reason TEXT,
        created_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_kill_switch_events_account
    ON account_kill_switch_events (account_id);
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_kill_switch_events_created
    ON account_kill_switch_events (created_at DESC);
    "#,
];

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!("Connected to database");

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Create the engine's tables and indexes. Safe to run any number of
    /// times against the same database.
    pub async fn init(&self) -> Result<()> {
        for statement in SCHEMA_STATEMENTS {
            if let Err(e) = sqlx::query(statement).execute(&self.pool).await {
                if is_duplicate_index(&e) {
                    debug!("Schema statement raced an existing index (42P17), ignoring");
                    continue;
                }
                return Err(anyhow::Error::new(e).context("Failed to initialize schema"));
            }
        }
        info!("Database schema initialized");
        Ok(())
    }
}

fn is_duplicate_index(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("42P17")
    )
}
