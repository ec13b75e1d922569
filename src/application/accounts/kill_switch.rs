//! Per-account kill switch.
//!
//! Unlike the risk service, evaluation collects every firing reason. State
//! transitions append rows to the append-only event log and mutate the
//! in-memory state, both owned exclusively by this service; the initial
//! state is seeded from the latest event row per account.

use crate::config::ExecutionEnvConfig;
use crate::domain::repositories::{KillSwitchEvent, KillSwitchEventRepository, KillSwitchEventType};
use crate::domain::trading::account::{AccountInfo, AccountKillSwitchState};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Market and account state feeding one evaluation
#[derive(Debug, Clone)]
pub struct KillSwitchContext {
    pub symbol: String,
    pub today_realized_pnl: Decimal,
    pub week_realized_pnl: Decimal,
    pub consecutive_losses: u32,
    pub current_spread_pips: f64,
    pub current_exposure: Decimal,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KillSwitchVerdict {
    pub blocked: bool,
    pub reasons: Vec<String>,
}

pub struct KillSwitchService {
    events: Option<Arc<dyn KillSwitchEventRepository>>,
    env: ExecutionEnvConfig,
    states: Mutex<HashMap<String, AccountKillSwitchState>>,
}

impl KillSwitchService {
    pub fn new(events: Option<Arc<dyn KillSwitchEventRepository>>, env: ExecutionEnvConfig) -> Self {
        Self {
            events,
            env,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Seed in-memory state from the latest event row per account.
    pub async fn load(&self) {
        let Some(repo) = &self.events else {
            return;
        };
        match repo.latest_per_account().await {
            Ok(events) => {
                let mut states = self.states.lock().await;
                for event in events {
                    let active = event.event_type == KillSwitchEventType::Activated;
                    states.insert(
                        event.account_id.clone(),
                        AccountKillSwitchState {
                            account_id: event.account_id.clone(),
                            active,
                            reasons: if active {
                                vec![event.reason.clone()]
                            } else {
                                Vec::new()
                            },
                            activated_at: active.then_some(event.created_at),
                        },
                    );
                }
                info!("Kill switch state seeded for {} accounts", states.len());
            }
            Err(e) => error!("Failed to seed kill switch state: {}", e),
        }
    }

    /// Pure check: collect every firing reason, no state change.
    pub fn check(&self, account: &AccountInfo, context: &KillSwitchContext) -> KillSwitchVerdict {
        let config = &account.kill_switch;
        if !config.enabled {
            return KillSwitchVerdict {
                blocked: false,
                reasons: Vec::new(),
            };
        }

        let mut reasons = Vec::new();

        if config.daily_dd_limit > Decimal::ZERO
            && context.today_realized_pnl.abs() >= config.daily_dd_limit
        {
            reasons.push(format!(
                "Daily drawdown limit hit: {} (limit {})",
                context.today_realized_pnl, config.daily_dd_limit
            ));
        }
        if config.weekly_dd_limit > Decimal::ZERO
            && context.week_realized_pnl.abs() >= config.weekly_dd_limit
        {
            reasons.push(format!(
                "Weekly drawdown limit hit: {} (limit {})",
                context.week_realized_pnl, config.weekly_dd_limit
            ));
        }
        if let Some(max_losses) = config.max_consecutive_losses
            && context.consecutive_losses >= max_losses
        {
            reasons.push(format!(
                "Consecutive loss limit reached: {} (limit {})",
                context.consecutive_losses, max_losses
            ));
        }
        // Per-symbol env override beats the account config, which beats the
        // env default; the comparison is strictly greater-than
        if let Some(max_spread) = self
            .env
            .resolve_max_spread(&context.symbol, config.max_spread_pips)
            && context.current_spread_pips > max_spread
        {
            reasons.push(format!(
                "Spread too wide: {} pips > {} pips",
                context.current_spread_pips, max_spread
            ));
        }
        if let Some(max_exposure) = config.max_exposure
            && context.current_exposure >= max_exposure
        {
            reasons.push(format!(
                "Exposure limit reached: {} >= {}",
                context.current_exposure, max_exposure
            ));
        }

        KillSwitchVerdict {
            blocked: !reasons.is_empty(),
            reasons,
        }
    }

    /// Evaluate and apply state transitions: inactive -> active appends an
    /// `activated` event, active -> inactive appends `deactivated`.
    /// Persistence failures are logged and never block the verdict.
    pub async fn evaluate(
        &self,
        account: &AccountInfo,
        context: &KillSwitchContext,
    ) -> KillSwitchVerdict {
        let verdict = self.check(account, context);

        let mut states = self.states.lock().await;
        let state = states
            .entry(account.id.clone())
            .or_insert_with(|| AccountKillSwitchState::inactive(account.id.clone()));

        if verdict.blocked && !state.active {
            state.active = true;
            state.reasons = verdict.reasons.clone();
            state.activated_at = Some(context.timestamp_ms);
            warn!(
                "Kill switch ACTIVATED for {}: {}",
                account.id,
                verdict.reasons.join("; ")
            );
            self.append_event(
                &account.id,
                KillSwitchEventType::Activated,
                &verdict.reasons.join("; "),
                context.timestamp_ms,
            )
            .await;
        } else if verdict.blocked {
            // Still active: refresh reasons, no new event row
            state.reasons = verdict.reasons.clone();
        } else if state.active {
            state.active = false;
            state.reasons.clear();
            state.activated_at = None;
            info!("Kill switch deactivated for {}", account.id);
            self.append_event(
                &account.id,
                KillSwitchEventType::Deactivated,
                "all conditions cleared",
                context.timestamp_ms,
            )
            .await;
        }

        verdict
    }

    pub async fn state(&self, account_id: &str) -> Option<AccountKillSwitchState> {
        self.states.lock().await.get(account_id).cloned()
    }

    async fn append_event(
        &self,
        account_id: &str,
        event_type: KillSwitchEventType,
        reason: &str,
        timestamp_ms: i64,
    ) {
        let Some(repo) = &self.events else {
            return;
        };
        let event = KillSwitchEvent {
            account_id: account_id.to_string(),
            event_type,
            reason: reason.to_string(),
            created_at: timestamp_ms,
        };
        if let Err(e) = repo.append(&event).await {
            error!("Failed to persist kill switch event for {}: {}", account_id, e);
        }
    }
}
