use super::structure::StructureDirection;
use super::timeframe::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of price relative to the midpoint (fib 0.5) of a swing range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdZone {
    Premium,
    Discount,
    Neutral,
}

impl fmt::Display for PdZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdZone::Premium => write!(f, "premium"),
            PdZone::Discount => write!(f, "discount"),
            PdZone::Neutral => write!(f, "neutral"),
        }
    }
}

/// Swing range context behind a premium/discount classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdContext {
    pub zone: PdZone,
    pub swing_high: Decimal,
    pub swing_low: Decimal,
    pub fib50: Decimal,
}

/// Last opposing candle before a directional impulse. Bullish blocks are
/// demand zones, bearish blocks supply zones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub direction: StructureDirection,
    pub high: Decimal,
    pub low: Decimal,
    pub timestamp: i64,
    pub timeframe: Timeframe,
    /// True once a later close pierced the opposite edge of the block
    pub mitigated: bool,
    pub wick_to_body_ratio: f64,
    pub volume_imbalance: bool,
    pub candle_index: usize,
}

impl OrderBlock {
    pub fn midpoint(&self) -> Decimal {
        (self.high + self.low) / Decimal::TWO
    }

    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.low && price <= self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FvgKind {
    Continuation,
    Reversal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FvgGrade {
    Wide,
    Narrow,
    Nested,
}

/// Three-candle imbalance: the wicks of the first and third candle do not
/// overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub direction: StructureDirection,
    pub kind: FvgKind,
    pub grade: FvgGrade,
    pub high: Decimal,
    pub low: Decimal,
    pub timestamp: i64,
    pub timeframe: Timeframe,
    pub premium_discount: PdZone,
    /// True once a later close traded through the far edge of the gap
    pub filled: bool,
    pub candle_indices: [usize; 3],
}

impl FairValueGap {
    pub fn gap_size(&self) -> Decimal {
        self.high - self.low
    }

    pub fn midpoint(&self) -> Decimal {
        (self.high + self.low) / Decimal::TWO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepKind {
    /// Sweep of equal highs
    Eqh,
    /// Sweep of equal lows
    Eql,
    /// Plain single-level sweep
    Sweep,
}

/// Wick violation of a swing level whose candle closed back inside the
/// pre-sweep range. Typical of stop hunts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySweep {
    pub kind: SweepKind,
    /// Side of the swept level: bearish = liquidity above (swing highs),
    /// bullish = liquidity below (swing lows)
    pub direction: StructureDirection,
    pub level: Decimal,
    pub timestamp: i64,
    pub confirmed: bool,
    pub timeframe: Timeframe,
    pub candle_index: usize,
}

/// Outcome of a displacement qualification check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplacementCheck {
    pub is_valid: bool,
    /// Signed confluence contribution, clamped to [-15, +15]
    pub score: f64,
    pub reasons: Vec<String>,
}
