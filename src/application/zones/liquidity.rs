//! Liquidity sweep detection.
//!
//! A sweep is a wick violation of a prior swing level by at least half the
//! local ATR whose candle closes back inside the pre-sweep range. Levels
//! carrying two or more equal extremes within tolerance are tagged EQH/EQL.

use crate::domain::market::candle::Candle;
use crate::domain::market::structure::{StructureDirection, SwingPoint, SwingType};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::zones::{LiquiditySweep, SweepKind};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use super::displacement::average_true_range;

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub atr_period: usize,
    /// Minimum wick violation as a multiple of local ATR
    pub min_violation_atr: f64,
    /// Equal-high/low tolerance as a multiple of local ATR
    pub eq_tolerance_atr: f64,
    /// Maximum candle distance between the swing and the sweeping candle
    pub swing_lookback: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            min_violation_atr: 0.5,
            eq_tolerance_atr: 0.25,
            swing_lookback: 50,
        }
    }
}

/// Detect confirmed sweeps over the window, sorted by candle index.
pub fn detect_sweeps(
    candles: &[Candle],
    swings: &[SwingPoint],
    timeframe: Timeframe,
    config: &SweepConfig,
) -> Vec<LiquiditySweep> {
    let mut sweeps = Vec::new();
    if candles.len() < config.atr_period + 1 {
        return sweeps;
    }

    for (i, candle) in candles.iter().enumerate().skip(config.atr_period) {
        let Some(atr) = average_true_range(&candles[..=i], config.atr_period) else {
            continue;
        };
        if atr <= Decimal::ZERO {
            continue;
        }
        let min_violation =
            atr * Decimal::from_f64(config.min_violation_atr).unwrap_or(Decimal::ZERO);
        let tolerance = atr * Decimal::from_f64(config.eq_tolerance_atr).unwrap_or(Decimal::ZERO);

        // Most recent qualifying swing per side wins for this candle
        let mut best: Option<(&SwingPoint, StructureDirection)> = None;
        for swing in swings {
            if swing.index >= i || i - swing.index > config.swing_lookback {
                continue;
            }
            let qualified = match swing.swing_type {
                // Liquidity above: wick through the high, close back under it
                SwingType::High => {
                    candle.high - swing.price >= min_violation && candle.close < swing.price
                }
                // Liquidity below: wick through the low, close back over it
                SwingType::Low => {
                    swing.price - candle.low >= min_violation && candle.close > swing.price
                }
            };
            if !qualified {
                continue;
            }
            let direction = match swing.swing_type {
                SwingType::High => StructureDirection::Bearish,
                SwingType::Low => StructureDirection::Bullish,
            };
            match best {
                Some((prev, _)) if swing.index <= prev.index => {}
                _ => best = Some((swing, direction)),
            }
        }

        let Some((swing, direction)) = best else {
            continue;
        };

        let equal_levels = swings
            .iter()
            .filter(|s| {
                s.swing_type == swing.swing_type
                    && s.index < i
                    && (s.price - swing.price).abs() <= tolerance
            })
            .count();

        let kind = if equal_levels >= 2 {
            match swing.swing_type {
                SwingType::High => SweepKind::Eqh,
                SwingType::Low => SweepKind::Eql,
            }
        } else {
            SweepKind::Sweep
        };

        sweeps.push(LiquiditySweep {
            kind,
            direction,
            level: swing.price,
            timestamp: candle.start_time,
            confirmed: true,
            timeframe,
            candle_index: i,
        });
    }

    sweeps
}
