//! Per-account risk checks and lot sizing.
//!
//! `can_take_new_trade` applies the limits in a fixed order and returns the
//! first failure verbatim; the guardrail's reduced mode halves the effective
//! risk percent instead of blocking. Equity, realized PnL and today's trade
//! count come from the repositories on demand.

use crate::domain::repositories::{EquityRepository, TradeDecisionRepository};
use crate::domain::trading::account::{AccountInfo, GuardrailMode};
use crate::domain::trading::symbol_spec::spec_for;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-account risk inputs for one evaluation
#[derive(Debug, Clone)]
pub struct RiskContext {
    pub equity: Decimal,
    pub today_realized_pnl: Decimal,
    pub week_realized_pnl: Decimal,
    pub trades_taken_today: u32,
    pub concurrent_trades: u32,
    pub current_exposure: Decimal,
    pub guardrail_mode: GuardrailMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
    pub adjusted_risk_percent: Option<f64>,
}

impl RiskVerdict {
    fn allowed(adjusted_risk_percent: Option<f64>) -> Self {
        Self {
            allowed: true,
            reason: None,
            adjusted_risk_percent,
        }
    }

    fn blocked(reason: String) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            adjusted_risk_percent: None,
        }
    }
}

pub struct AccountRiskService {
    equity_repo: Option<Arc<dyn EquityRepository>>,
    decisions_repo: Option<Arc<dyn TradeDecisionRepository>>,
}

impl AccountRiskService {
    pub fn new(
        equity_repo: Option<Arc<dyn EquityRepository>>,
        decisions_repo: Option<Arc<dyn TradeDecisionRepository>>,
    ) -> Self {
        Self {
            equity_repo,
            decisions_repo,
        }
    }

    /// Assemble the risk context for an account, querying storage for
    /// equity, realized PnL and today's trade count. Missing storage
    /// degrades to the provided fallbacks.
    pub async fn build_context(
        &self,
        account: &AccountInfo,
        concurrent_trades: u32,
        current_exposure: Decimal,
        guardrail_mode: GuardrailMode,
        fallback_equity: Decimal,
    ) -> RiskContext {
        let mut context = RiskContext {
            equity: fallback_equity,
            today_realized_pnl: Decimal::ZERO,
            week_realized_pnl: Decimal::ZERO,
            trades_taken_today: 0,
            concurrent_trades,
            current_exposure,
            guardrail_mode,
        };

        if let Some(repo) = &self.equity_repo {
            match repo.latest(&account.id).await {
                Ok(Some(snapshot)) => {
                    context.equity = snapshot.equity;
                    context.today_realized_pnl = snapshot.closed_pnl_today;
                    context.week_realized_pnl = snapshot.closed_pnl_week;
                }
                Ok(None) => {}
                Err(e) => warn!("Equity query failed for {}: {}", account.id, e),
            }
        }
        if let Some(repo) = &self.decisions_repo {
            match repo.trades_today(&account.id).await {
                Ok(count) => context.trades_taken_today = count,
                Err(e) => warn!("Trade count query failed for {}: {}", account.id, e),
            }
        }

        context
    }

    /// First failing limit wins; the reason string is returned verbatim in
    /// results and decision rows.
    pub fn can_take_new_trade(
        &self,
        account: &AccountInfo,
        context: &RiskContext,
        profile_risk_override: Option<f64>,
    ) -> RiskVerdict {
        let limits = &account.risk;

        if context.today_realized_pnl <= -limits.max_daily_loss {
            return RiskVerdict::blocked(format!(
                "Daily loss limit reached: {} <= -{}",
                context.today_realized_pnl, limits.max_daily_loss
            ));
        }
        if context.trades_taken_today >= limits.daily_trade_cap() {
            return RiskVerdict::blocked(format!(
                "Daily trade count limit reached: {} >= {}",
                context.trades_taken_today,
                limits.daily_trade_cap()
            ));
        }
        if context.concurrent_trades >= limits.max_concurrent_trades {
            return RiskVerdict::blocked(format!(
                "Concurrent trade limit reached: {} >= {}",
                context.concurrent_trades, limits.max_concurrent_trades
            ));
        }
        if context.current_exposure >= limits.max_daily_risk {
            return RiskVerdict::blocked(format!(
                "Daily risk exposure limit reached: {} >= {}",
                context.current_exposure, limits.max_daily_risk
            ));
        }
        if context.current_exposure >= limits.max_exposure {
            return RiskVerdict::blocked(format!(
                "Exposure limit reached: {} >= {}",
                context.current_exposure, limits.max_exposure
            ));
        }
        match context.guardrail_mode {
            GuardrailMode::Blocked => {
                RiskVerdict::blocked("News guardrail blocked trading".to_string())
            }
            GuardrailMode::Reduced => {
                let base = profile_risk_override.unwrap_or(limits.risk_percent);
                RiskVerdict::allowed(Some(base * 0.5))
            }
            GuardrailMode::Normal => RiskVerdict::allowed(None),
        }
    }

    /// Position size from monetary risk and stop distance. Indices divide by
    /// point value per lot; FX and metals by pips x pip value x contract.
    /// Rounded to 2 decimals and clamped up to the broker minimum.
    pub fn calculate_lot_size(
        &self,
        account: &AccountInfo,
        context: &RiskContext,
        stop_loss_pips: Decimal,
        symbol: &str,
        profile_risk_override: Option<f64>,
        adjusted_risk_percent: Option<f64>,
    ) -> Decimal {
        let spec = spec_for(symbol);
        if stop_loss_pips <= Decimal::ZERO || context.equity <= Decimal::ZERO {
            warn!(
                "Cannot size {} for {}: pips={}, equity={}",
                symbol, account.id, stop_loss_pips, context.equity
            );
            return spec.min_lot;
        }

        let risk_percent = adjusted_risk_percent
            .or(profile_risk_override)
            .unwrap_or(account.risk.risk_percent);
        let risk_amount =
            context.equity * Decimal::from_f64(risk_percent / 100.0).unwrap_or(Decimal::ZERO);

        let raw = if spec.is_index() {
            let denominator = stop_loss_pips * spec.point_value_per_lot;
            risk_amount.checked_div(denominator).unwrap_or(Decimal::ZERO)
        } else {
            let denominator = stop_loss_pips * spec.pip_value * spec.contract_size;
            risk_amount.checked_div(denominator).unwrap_or(Decimal::ZERO)
        };

        let lot = raw.round_dp(2).max(spec.min_lot);
        info!(
            "Sized {} for {}: risk ${} over {} pips -> {} lots",
            symbol, account.id, risk_amount.round_dp(2), stop_loss_pips, lot
        );
        lot
    }
}
