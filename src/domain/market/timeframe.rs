use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timeframes the engine analyses. H4 carries bias, M15 carries setups,
/// M1 carries entries; M5 and H1 exist for aggregation and context queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes
    pub fn to_minutes(&self) -> usize {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
        }
    }

    /// Returns the duration in seconds
    pub fn to_seconds(&self) -> i64 {
        (self.to_minutes() * 60) as i64
    }

    /// Returns the duration in milliseconds
    pub fn to_millis(&self) -> i64 {
        self.to_seconds() * 1000
    }

    /// Returns all supported timeframes in ascending order
    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::H1,
            Timeframe::H4,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
        }
    }

    /// Returns the start timestamp (ms) of the period containing `timestamp_ms`
    pub fn period_start(&self, timestamp_ms: i64) -> i64 {
        let period_ms = self.to_millis();
        timestamp_ms - (timestamp_ms % period_ms)
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "m1" | "1m" | "1min" => Ok(Timeframe::M1),
            "m5" | "5m" | "5min" => Ok(Timeframe::M5),
            "m15" | "15m" | "15min" => Ok(Timeframe::M15),
            "h1" | "1h" | "1hour" => Ok(Timeframe::H1),
            "h4" | "4h" | "4hour" => Ok(Timeframe::H4),
            _ => Err(anyhow!(
                "Invalid timeframe: '{}'. Valid options: M1, M5, M15, H1, H4",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
