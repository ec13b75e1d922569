use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a swing point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingType {
    High,
    Low,
}

impl SwingType {
    pub fn opposite(self) -> SwingType {
        match self {
            SwingType::High => SwingType::Low,
            SwingType::Low => SwingType::High,
        }
    }
}

/// A confirmed local extremum. Swings reference their source candle by
/// integer index so that events stay valid when the candle window is
/// re-sliced and recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub swing_type: SwingType,
    pub price: Decimal,
    pub timestamp: i64,
}

/// Direction of a structure event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureDirection {
    Bullish,
    Bearish,
}

impl StructureDirection {
    pub fn opposite(self) -> StructureDirection {
        match self {
            StructureDirection::Bullish => StructureDirection::Bearish,
            StructureDirection::Bearish => StructureDirection::Bullish,
        }
    }

    pub fn as_trend(self) -> Trend {
        match self {
            StructureDirection::Bullish => Trend::Bullish,
            StructureDirection::Bearish => Trend::Bearish,
        }
    }
}

impl fmt::Display for StructureDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureDirection::Bullish => write!(f, "bullish"),
            StructureDirection::Bearish => write!(f, "bearish"),
        }
    }
}

/// Market bias held by the structure state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Unknown,
    Bullish,
    Bearish,
}

impl Trend {
    pub fn is_directional(self) -> bool {
        self != Trend::Unknown
    }

    pub fn opposite(self) -> Trend {
        match self {
            Trend::Unknown => Trend::Unknown,
            Trend::Bullish => Trend::Bearish,
            Trend::Bearish => Trend::Bullish,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Unknown => write!(f, "neutral"),
            Trend::Bullish => write!(f, "bullish"),
            Trend::Bearish => write!(f, "bearish"),
        }
    }
}

/// Break of Structure: a candle closing (strict mode) or wicking beyond a
/// prior swing within the configured lookback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BosEvent {
    pub index: usize,
    pub direction: StructureDirection,
    pub broken_swing_index: usize,
    pub broken_swing_type: SwingType,
    pub level: Decimal,
    pub strict_close: bool,
}

/// Change of Character: a BOS against the held bias that also breaks the
/// bias's anchor swing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChochEvent {
    pub index: usize,
    pub from_trend: Trend,
    pub to_trend: Trend,
    pub broken_swing_index: usize,
    pub broken_swing_type: SwingType,
    pub level: Decimal,
    pub bos_index: usize,
}

/// Market Structure Break: a CHoCH whose broken swing was a structural
/// pivot bounding a prior multi-swing range. Outranks CHoCH and BOS when
/// coincident.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MsbEvent {
    pub choch: ChochEvent,
}
