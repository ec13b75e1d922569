//! Fair value gap detection.
//!
//! A bullish gap exists at triplet (i-1, i, i+1) when the first candle's
//! high sits below the third candle's low; bearish symmetric. The minimum
//! meaningful gap is symbol-aware (XAUUSD 0.5, US30 5.0, FX one pip).

use crate::domain::market::candle::Candle;
use crate::domain::market::structure::{StructureDirection, Trend};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::zones::{FairValueGap, FvgGrade, FvgKind, PdContext, PdZone};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct FvgConfig {
    pub min_gap_size: Decimal,
    /// Prevailing trend used to split continuation from reversal gaps
    pub prevailing: Trend,
}

/// Detect fair value gaps over the window, oldest first.
pub fn detect_fvgs(
    candles: &[Candle],
    timeframe: Timeframe,
    config: &FvgConfig,
    pd: Option<&PdContext>,
) -> Vec<FairValueGap> {
    let mut gaps = Vec::new();
    if candles.len() < 3 {
        return gaps;
    }

    for i in 1..candles.len() - 1 {
        let first = &candles[i - 1];
        let third = &candles[i + 1];

        if first.high < third.low {
            let gap = third.low - first.high;
            if gap >= config.min_gap_size {
                gaps.push(build_gap(
                    candles,
                    i,
                    StructureDirection::Bullish,
                    first.high,
                    third.low,
                    gap,
                    timeframe,
                    config,
                    pd,
                ));
            }
        }

        if first.low > third.high {
            let gap = first.low - third.high;
            if gap >= config.min_gap_size {
                gaps.push(build_gap(
                    candles,
                    i,
                    StructureDirection::Bearish,
                    third.high,
                    first.low,
                    gap,
                    timeframe,
                    config,
                    pd,
                ));
            }
        }
    }

    gaps
}

#[allow(clippy::too_many_arguments)]
fn build_gap(
    candles: &[Candle],
    middle: usize,
    direction: StructureDirection,
    low: Decimal,
    high: Decimal,
    gap: Decimal,
    timeframe: Timeframe,
    config: &FvgConfig,
    pd: Option<&PdContext>,
) -> FairValueGap {
    let grade = if gap > config.min_gap_size * Decimal::from(3) {
        FvgGrade::Wide
    } else if gap > config.min_gap_size * Decimal::new(15, 1) {
        FvgGrade::Narrow
    } else {
        FvgGrade::Nested
    };

    let kind = if config.prevailing == direction.as_trend() || config.prevailing == Trend::Unknown {
        FvgKind::Continuation
    } else {
        FvgKind::Reversal
    };

    let midpoint = (low + high) / Decimal::TWO;
    let premium_discount = match pd {
        Some(ctx) if midpoint > ctx.fib50 => PdZone::Premium,
        Some(ctx) if midpoint < ctx.fib50 => PdZone::Discount,
        Some(_) => PdZone::Neutral,
        None => PdZone::Neutral,
    };

    // Filled once a later close trades through the far edge of the gap
    let filled = candles[middle + 2..].iter().any(|c| match direction {
        StructureDirection::Bullish => c.close < low,
        StructureDirection::Bearish => c.close > high,
    });

    FairValueGap {
        direction,
        kind,
        grade,
        high,
        low,
        timestamp: candles[middle].start_time,
        timeframe,
        premium_discount,
        filled,
        candle_indices: [middle - 1, middle, middle + 1],
    }
}
