//! Account registry.
//!
//! Owns the static account configs and the mutable per-account runtime
//! state. All runtime mutations go through the registry's single lock and
//! are last-writer-wins; reads hand out snapshots.

use crate::domain::trading::account::{AccountInfo, AccountRuntimeState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct AccountRegistry {
    accounts: Vec<Arc<AccountInfo>>,
    runtime: Mutex<HashMap<String, AccountRuntimeState>>,
}

impl AccountRegistry {
    /// Build the registry from loaded configs. Disabled accounts are kept
    /// out entirely; they receive no runtime state and never execute.
    pub fn from_accounts(accounts: Vec<AccountInfo>) -> Self {
        let enabled: Vec<Arc<AccountInfo>> = accounts
            .into_iter()
            .filter(|a| a.enabled)
            .map(Arc::new)
            .collect();
        let runtime = enabled
            .iter()
            .map(|a| (a.id.clone(), AccountRuntimeState::default()))
            .collect();
        info!("Account registry initialized with {} accounts", enabled.len());
        Self {
            accounts: enabled,
            runtime: Mutex::new(runtime),
        }
    }

    pub fn account(&self, id: &str) -> Option<Arc<AccountInfo>> {
        self.accounts.iter().find(|a| a.id == id).cloned()
    }

    pub fn accounts(&self) -> &[Arc<AccountInfo>] {
        &self.accounts
    }

    /// Enabled accounts trading `symbol`, case-insensitive
    pub fn accounts_for_symbol(&self, symbol: &str) -> Vec<Arc<AccountInfo>> {
        self.accounts
            .iter()
            .filter(|a| a.trades_symbol(symbol))
            .cloned()
            .collect()
    }

    /// Snapshot of one account's runtime state
    pub async fn runtime_state(&self, id: &str) -> Option<AccountRuntimeState> {
        self.runtime.lock().await.get(id).cloned()
    }

    pub async fn pause_account(&self, id: &str, reason: &str) {
        let mut runtime = self.runtime.lock().await;
        if let Some(state) = runtime.get_mut(id) {
            state.paused = true;
            state.pause_reason = Some(reason.to_string());
            warn!("Account {} paused: {}", id, reason);
        }
    }

    pub async fn resume_account(&self, id: &str) {
        let mut runtime = self.runtime.lock().await;
        if let Some(state) = runtime.get_mut(id) {
            state.paused = false;
            state.pause_reason = None;
            info!("Account {} resumed", id);
        }
    }

    pub async fn record_trade(&self, id: &str, symbol: &str, timestamp_ms: i64) {
        let mut runtime = self.runtime.lock().await;
        if let Some(state) = runtime.get_mut(id) {
            state.last_trade_time = Some(timestamp_ms);
            state.last_trade_symbol = Some(symbol.to_string());
        }
    }

    pub async fn record_error(&self, id: &str, error: &str, timestamp_ms: i64) {
        let mut runtime = self.runtime.lock().await;
        if let Some(state) = runtime.get_mut(id) {
            state.last_error = Some(error.to_string());
            state.last_error_time = Some(timestamp_ms);
        }
    }

    pub async fn update_connection_status(&self, id: &str, connected: bool) {
        let mut runtime = self.runtime.lock().await;
        if let Some(state) = runtime.get_mut(id) {
            state.is_connected = connected;
        }
    }
}
