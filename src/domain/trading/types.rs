use crate::domain::market::session::TradingSession;
use crate::domain::market::structure::{StructureDirection, Trend};
use crate::domain::market::zones::PdZone;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }

    /// The structure direction that carries this trade
    pub fn structure(self) -> StructureDirection {
        match self {
            Direction::Buy => StructureDirection::Bullish,
            Direction::Sell => StructureDirection::Bearish,
        }
    }

    pub fn from_trend(trend: Trend) -> Option<Direction> {
        match trend {
            Trend::Bullish => Some(Direction::Buy),
            Trend::Bearish => Some(Direction::Sell),
            Trend::Unknown => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    Market,
    Limit,
    Stop,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Market => write!(f, "MARKET"),
            EntryType::Limit => write!(f, "LIMIT"),
            EntryType::Stop => write!(f, "STOP"),
        }
    }
}

/// The pipeline's output: a proposed trade plus the confluence evidence that
/// produced it. Given identical candle input and configuration the pipeline
/// emits byte-identical signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: Direction,
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub entry_type: EntryType,
    pub htf_trend: Trend,
    pub itf_flow: Trend,
    pub ltf_bos: bool,
    pub premium_discount: PdZone,
    /// (low, high) pairs of the order blocks backing the setup
    pub ob_levels: Vec<(Decimal, Decimal)>,
    /// (low, high) pairs of the fair value gaps backing the setup
    pub fvg_levels: Vec<(Decimal, Decimal)>,
    pub smt: bool,
    pub volume_imbalance: bool,
    pub session: Vec<TradingSession>,
    pub confluence_reasons: Vec<String>,
    /// Clamped to [0, 100]
    pub confluence_score: f64,
    pub timestamp: i64,
    pub meta: serde_json::Value,
}

impl Signal {
    pub fn risk(&self) -> Decimal {
        (self.entry - self.stop_loss).abs()
    }

    pub fn reward(&self) -> Decimal {
        (self.take_profit - self.entry).abs()
    }
}

/// Structured rejection from the signal pipeline. Input-insufficiency is a
/// value, not an error: the pipeline never throws for "no setup".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: String,
    pub debug_reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalOutcome {
    Signal(Box<Signal>),
    Rejected(Rejection),
}

impl SignalOutcome {
    pub fn rejected(reason: impl Into<String>, debug_reasons: Vec<String>) -> Self {
        SignalOutcome::Rejected(Rejection {
            reason: reason.into(),
            debug_reasons,
        })
    }

    pub fn signal(&self) -> Option<&Signal> {
        match self {
            SignalOutcome::Signal(s) => Some(s),
            SignalOutcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            SignalOutcome::Signal(_) => None,
            SignalOutcome::Rejected(r) => Some(r),
        }
    }
}
