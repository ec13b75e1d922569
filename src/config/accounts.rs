use crate::domain::errors::ConfigError;
use crate::domain::trading::account::AccountInfo;
use std::path::Path;
use tracing::{info, warn};

/// Default location of the accounts document
pub const DEFAULT_ACCOUNTS_PATH: &str = "configs/accounts.json";

/// Load the accounts document. A missing file is the legacy single-account
/// mode and yields an empty list; a malformed file is an error.
pub fn load_accounts(path: impl AsRef<Path>) -> Result<Vec<AccountInfo>, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        warn!(
            "Accounts config not found at {}; running with no accounts",
            path.display()
        );
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidAccounts {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let accounts: Vec<AccountInfo> =
        serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidAccounts {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    info!(
        "Loaded {} accounts ({} enabled) from {}",
        accounts.len(),
        accounts.iter().filter(|a| a.enabled).count(),
        path.display()
    );
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_empty_list() {
        let accounts = load_accounts("/nonexistent/accounts.json").unwrap();
        assert!(accounts.is_empty());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = std::env::temp_dir().join("tradefleet-test-accounts");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_accounts(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid accounts config"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_well_formed_document_parses() {
        let dir = std::env::temp_dir().join("tradefleet-test-accounts");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("good.json");
        std::fs::write(
            &path,
            r#"[{
                "id": "acc1",
                "name": "Primary",
                "mt5": { "baseUrl": "http://localhost:8001", "login": 1 },
                "symbols": ["XAUUSD"],
                "risk": {
                    "riskPercent": 1.0,
                    "maxDailyLoss": 300,
                    "maxWeeklyLoss": 900,
                    "maxConcurrentTrades": 3,
                    "maxDailyRisk": 500,
                    "maxExposure": 1000
                },
                "killSwitch": { "enabled": true, "dailyDDLimit": 200, "weeklyDDLimit": 600 },
                "enabled": true
            }]"#,
        )
        .unwrap();
        let accounts = load_accounts(&path).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, "acc1");
        let _ = std::fs::remove_file(&path);
    }
}
