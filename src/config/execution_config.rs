use std::collections::HashMap;
use std::env;

use super::env_flag;

/// Environment-bound knobs of the account execution side.
#[derive(Debug, Clone)]
pub struct ExecutionEnvConfig {
    /// Gate broker calls on FX market hours (weekends, Friday close)
    pub check_market_hours: bool,
    /// Default kill-switch spread ceiling when the account sets none
    pub default_max_spread_pips: Option<f64>,
    /// Per-symbol spread ceilings, format "XAUUSD:3,US30:10"
    pub max_spread_pips_per_symbol: HashMap<String, f64>,
}

impl Default for ExecutionEnvConfig {
    fn default() -> Self {
        Self {
            check_market_hours: true,
            default_max_spread_pips: None,
            max_spread_pips_per_symbol: HashMap::new(),
        }
    }
}

impl ExecutionEnvConfig {
    pub fn from_env() -> Self {
        let default_max_spread_pips = env::var("PER_ACCOUNT_MAX_SPREAD_PIPS")
            .ok()
            .and_then(|raw| raw.trim().parse::<f64>().ok());

        let max_spread_pips_per_symbol = env::var("PER_ACCOUNT_MAX_SPREAD_PIPS_PER_SYMBOL")
            .map(|raw| parse_symbol_map(&raw))
            .unwrap_or_default();

        Self {
            check_market_hours: env_flag("CHECK_MARKET_HOURS", true),
            default_max_spread_pips,
            max_spread_pips_per_symbol,
        }
    }

    /// Spread ceiling for a symbol: per-symbol override, then the account's
    /// own limit, then the env default.
    pub fn resolve_max_spread(&self, symbol: &str, account_limit: Option<f64>) -> Option<f64> {
        self.max_spread_pips_per_symbol
            .get(&symbol.to_uppercase())
            .copied()
            .or(account_limit)
            .or(self.default_max_spread_pips)
    }
}

fn parse_symbol_map(raw: &str) -> HashMap<String, f64> {
    raw.split(',')
        .filter_map(|pair| {
            let (symbol, value) = pair.split_once(':')?;
            let parsed = value.trim().parse::<f64>().ok()?;
            Some((symbol.trim().to_uppercase(), parsed))
        })
        .collect()
}
