//! Order block detection.
//!
//! A bullish block is a bullish candle with a meaningful lower wick whose
//! close broke above the previous candle's high; bearish symmetric. Blocks
//! are recomputed per evaluation and never persisted.

use crate::domain::market::candle::Candle;
use crate::domain::market::structure::StructureDirection;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::zones::OrderBlock;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

#[derive(Debug, Clone)]
pub struct OrderBlockConfig {
    /// Minimum wick/body ratio on the rejection side
    pub min_wick_to_body_ratio: f64,
    /// Candles averaged for the volume-imbalance baseline
    pub volume_lookback: usize,
    /// Volume multiple over the baseline that flags an imbalance
    pub volume_imbalance_multiple: f64,
    /// Cap on blocks returned, newest first
    pub max_blocks: usize,
}

impl Default for OrderBlockConfig {
    fn default() -> Self {
        Self {
            min_wick_to_body_ratio: 0.3,
            volume_lookback: 10,
            volume_imbalance_multiple: 1.5,
            max_blocks: 10,
        }
    }
}

/// Detect order blocks over the window, newest first.
pub fn detect_order_blocks(
    candles: &[Candle],
    timeframe: Timeframe,
    config: &OrderBlockConfig,
) -> Vec<OrderBlock> {
    let mut blocks = Vec::new();
    if candles.len() < 2 {
        return blocks;
    }

    for i in (1..candles.len()).rev() {
        if blocks.len() >= config.max_blocks {
            break;
        }
        let candle = &candles[i];
        let prev = &candles[i - 1];
        let body = candle.body();
        if body <= Decimal::ZERO {
            continue;
        }
        let body_f = body.to_f64().unwrap_or(0.0);

        let direction = if candle.is_bullish() {
            let wick_ratio = candle.lower_wick().to_f64().unwrap_or(0.0) / body_f;
            if wick_ratio >= config.min_wick_to_body_ratio && candle.close > prev.high {
                Some((StructureDirection::Bullish, wick_ratio))
            } else {
                None
            }
        } else {
            let wick_ratio = candle.upper_wick().to_f64().unwrap_or(0.0) / body_f;
            if wick_ratio >= config.min_wick_to_body_ratio && candle.close < prev.low {
                Some((StructureDirection::Bearish, wick_ratio))
            } else {
                None
            }
        };

        let Some((direction, wick_ratio)) = direction else {
            continue;
        };

        blocks.push(OrderBlock {
            direction,
            high: candle.high,
            low: candle.low,
            timestamp: candle.start_time,
            timeframe,
            mitigated: is_mitigated(candles, i, direction),
            wick_to_body_ratio: wick_ratio,
            volume_imbalance: has_volume_imbalance(candles, i, config),
            candle_index: i,
        });
    }

    blocks
}

/// A block is mitigated once a later close pierces its opposite edge
fn is_mitigated(candles: &[Candle], index: usize, direction: StructureDirection) -> bool {
    let block = &candles[index];
    candles[index + 1..].iter().any(|c| match direction {
        StructureDirection::Bullish => c.close < block.low,
        StructureDirection::Bearish => c.close > block.high,
    })
}

fn has_volume_imbalance(candles: &[Candle], index: usize, config: &OrderBlockConfig) -> bool {
    if index == 0 || config.volume_lookback == 0 {
        return false;
    }
    let start = index.saturating_sub(config.volume_lookback);
    let window = &candles[start..index];
    if window.is_empty() {
        return false;
    }
    let total: Decimal = window.iter().map(|c| c.volume).sum();
    let mean = total / Decimal::from(window.len());
    let multiple =
        Decimal::from_f64_retain(config.volume_imbalance_multiple).unwrap_or(Decimal::ONE);
    candles[index].volume > mean * multiple
}
