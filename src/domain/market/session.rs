//! Trading session windows and market-hours gating.
//!
//! All resolution happens in America/New_York. DST shifts New York sessions
//! by an hour relative to UTC twice a year, so the windows are computed
//! through a proper IANA zone rather than fixed UTC offsets.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingSession {
    Asian,
    London,
    NewYork,
}

impl TradingSession {
    /// Session window as [start, end) hours in New York local time.
    /// London and New York deliberately overlap 13:00-16:00.
    pub fn ny_hours(&self) -> (u32, u32) {
        match self {
            TradingSession::Asian => (0, 8),
            TradingSession::London => (8, 16),
            TradingSession::NewYork => (13, 21),
        }
    }

    pub fn all() -> [TradingSession; 3] {
        [
            TradingSession::Asian,
            TradingSession::London,
            TradingSession::NewYork,
        ]
    }
}

impl fmt::Display for TradingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingSession::Asian => write!(f, "asian"),
            TradingSession::London => write!(f, "london"),
            TradingSession::NewYork => write!(f, "newyork"),
        }
    }
}

impl FromStr for TradingSession {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "asian" | "asia" | "tokyo" => Ok(TradingSession::Asian),
            "london" | "lo" => Ok(TradingSession::London),
            "newyork" | "new_york" | "ny" => Ok(TradingSession::NewYork),
            _ => Err(anyhow!(
                "Invalid session: '{}'. Valid options: asian, london, newyork",
                s
            )),
        }
    }
}

/// Converts an epoch-millis timestamp into New York local time
pub fn ny_time(timestamp_ms: i64) -> DateTime<Tz> {
    let utc = Utc
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap());
    utc.with_timezone(&New_York)
}

/// Sessions active at the given instant. The London/New York overlap means
/// the result can hold two entries.
pub fn active_sessions(timestamp_ms: i64) -> Vec<TradingSession> {
    let hour = ny_time(timestamp_ms).hour();
    TradingSession::all()
        .into_iter()
        .filter(|s| {
            let (start, end) = s.ny_hours();
            hour >= start && hour < end
        })
        .collect()
}

/// FX market-hours check in New York time: closed from Friday 17:00 through
/// Sunday 17:00, and all of Saturday.
pub fn market_open(timestamp_ms: i64) -> bool {
    let local = ny_time(timestamp_ms);
    match local.weekday() {
        Weekday::Sat => false,
        Weekday::Fri => local.hour() < 17,
        Weekday::Sun => local.hour() >= 17,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ny_timestamp(y: i32, m: u32, d: u32, hour: u32) -> i64 {
        let naive = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        New_York
            .from_local_datetime(&naive)
            .single()
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn test_session_windows() {
        // Tuesday 2025-03-04, 10:00 NY -> London only
        let ts = ny_timestamp(2025, 3, 4, 10);
        assert_eq!(active_sessions(ts), vec![TradingSession::London]);

        // 14:00 NY -> London/New York overlap
        let ts = ny_timestamp(2025, 3, 4, 14);
        assert_eq!(
            active_sessions(ts),
            vec![TradingSession::London, TradingSession::NewYork]
        );

        // 03:00 NY -> Asian
        let ts = ny_timestamp(2025, 3, 4, 3);
        assert_eq!(active_sessions(ts), vec![TradingSession::Asian]);

        // 22:00 NY -> nothing
        let ts = ny_timestamp(2025, 3, 4, 22);
        assert!(active_sessions(ts).is_empty());
    }

    #[test]
    fn test_sessions_stable_across_dst() {
        // The same NY wall-clock hour resolves to the same session on both
        // sides of the March 2025 DST transition (Mar 9).
        let before = ny_timestamp(2025, 3, 7, 10);
        let after = ny_timestamp(2025, 3, 11, 10);
        assert_eq!(active_sessions(before), active_sessions(after));
    }

    #[test]
    fn test_market_hours() {
        // Saturday always closed
        assert!(!market_open(ny_timestamp(2025, 3, 8, 12)));
        // Friday 16:59 open, 17:00 closed
        assert!(market_open(ny_timestamp(2025, 3, 7, 16)));
        assert!(!market_open(ny_timestamp(2025, 3, 7, 17)));
        // Sunday reopens at 17:00
        assert!(!market_open(ny_timestamp(2025, 3, 9, 12)));
        assert!(market_open(ny_timestamp(2025, 3, 9, 18)));
        // Midweek open
        assert!(market_open(ny_timestamp(2025, 3, 5, 9)));
    }

    #[test]
    fn test_session_parsing() {
        assert_eq!(
            TradingSession::from_str("London").unwrap(),
            TradingSession::London
        );
        assert_eq!(
            TradingSession::from_str("ny").unwrap(),
            TradingSession::NewYork
        );
        assert!(TradingSession::from_str("sydney").is_err());
    }
}
