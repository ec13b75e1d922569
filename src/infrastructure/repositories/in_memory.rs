//! In-memory repository implementations.
//!
//! Thread-safe implementations of the repository traits, used by the test
//! suite and as the degradation path when the database is unreachable.
//! Data is lost on restart; the Postgres implementations in
//! `infrastructure::persistence` are the durable variants.

use crate::domain::repositories::{
    EquityRepository, EquitySnapshot, KillSwitchEvent, KillSwitchEventRepository,
    TradeDecisionRecord, TradeDecisionRepository,
};
use crate::domain::trading::decision::TradeAction;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryEquityRepository {
    snapshots: RwLock<HashMap<String, Vec<EquitySnapshot>>>,
}

impl InMemoryEquityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EquityRepository for InMemoryEquityRepository {
    async fn latest(&self, account_id: &str) -> Result<Option<EquitySnapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(account_id)
            .and_then(|rows| rows.iter().max_by_key(|r| r.timestamp))
            .cloned())
    }

    async fn record(&self, snapshot: &EquitySnapshot) -> Result<()> {
        self.snapshots
            .write()
            .await
            .entry(snapshot.account_id.clone())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTradeDecisionRepository {
    rows: RwLock<Vec<TradeDecisionRecord>>,
}

impl InMemoryTradeDecisionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<TradeDecisionRecord> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl TradeDecisionRepository for InMemoryTradeDecisionRepository {
    async fn record(&self, row: &TradeDecisionRecord) -> Result<()> {
        self.rows.write().await.push(row.clone());
        Ok(())
    }

    async fn trades_today(&self, account_id: &str) -> Result<u32> {
        let today = Utc::now().date_naive();
        let rows = self.rows.read().await;
        let count = rows
            .iter()
            .filter(|r| {
                r.account_id == account_id
                    && r.decision == TradeAction::Trade
                    && Utc
                        .timestamp_millis_opt(r.timestamp)
                        .single()
                        .map(|t| t.date_naive() == today)
                        .unwrap_or(false)
            })
            .count();
        Ok(count as u32)
    }
}

#[derive(Default)]
pub struct InMemoryKillSwitchEventRepository {
    events: RwLock<Vec<KillSwitchEvent>>,
}

impl InMemoryKillSwitchEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<KillSwitchEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl KillSwitchEventRepository for InMemoryKillSwitchEventRepository {
    async fn append(&self, event: &KillSwitchEvent) -> Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn latest_per_account(&self) -> Result<Vec<KillSwitchEvent>> {
        let events = self.events.read().await;
        let mut latest: HashMap<String, KillSwitchEvent> = HashMap::new();
        for event in events.iter() {
            let entry = latest
                .entry(event.account_id.clone())
                .or_insert_with(|| event.clone());
            if event.created_at >= entry.created_at {
                *entry = event.clone();
            }
        }
        let mut rows: Vec<KillSwitchEvent> = latest.into_values().collect();
        rows.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        Ok(rows)
    }
}
