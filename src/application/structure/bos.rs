//! Break-of-Structure detection.
//!
//! For each candle the scan considers prior swings within
//! `swing_index_lookback` bars. At most one BOS is recorded per candle; when
//! several swings qualify the most recent one (largest swing index) wins.

use crate::domain::market::candle::Candle;
use crate::domain::market::structure::{BosEvent, StructureDirection, SwingPoint, SwingType};

#[derive(Debug, Clone)]
pub struct BosConfig {
    /// Maximum candle distance between a swing and its breaking candle
    pub swing_index_lookback: usize,
    /// Require the close to break the level; false accepts the wick
    pub strict_close: bool,
}

impl Default for BosConfig {
    fn default() -> Self {
        Self {
            swing_index_lookback: 50,
            strict_close: true,
        }
    }
}

/// Detect BOS events, sorted by candle index. Each swing produces at most
/// one event: once its level has been closed (or wicked) through, later
/// candles trading beyond it are continuation, not new breaks.
pub fn detect_bos(candles: &[Candle], swings: &[SwingPoint], config: &BosConfig) -> Vec<BosEvent> {
    let mut events = Vec::new();
    let mut broken = vec![false; swings.len()];

    for (i, candle) in candles.iter().enumerate() {
        let mut best: Option<(usize, StructureDirection, &SwingPoint)> = None;

        for (slot, swing) in swings.iter().enumerate() {
            if broken[slot] || swing.index >= i || i - swing.index > config.swing_index_lookback {
                continue;
            }

            let breaks = match swing.swing_type {
                SwingType::High => {
                    let reference = if config.strict_close {
                        candle.close
                    } else {
                        candle.high
                    };
                    reference > swing.price
                }
                SwingType::Low => {
                    let reference = if config.strict_close {
                        candle.close
                    } else {
                        candle.low
                    };
                    reference < swing.price
                }
            };
            if !breaks {
                continue;
            }
            broken[slot] = true;

            let direction = match swing.swing_type {
                SwingType::High => StructureDirection::Bullish,
                SwingType::Low => StructureDirection::Bearish,
            };

            // One BOS per candle: keep the most recently printed swing
            match best {
                Some((best_index, _, _)) if swing.index <= best_index => {}
                _ => best = Some((swing.index, direction, swing)),
            }
        }

        if let Some((_, direction, swing)) = best {
            events.push(BosEvent {
                index: i,
                direction,
                broken_swing_index: swing.index,
                broken_swing_type: swing.swing_type,
                level: swing.price,
                strict_close: config.strict_close,
            });
        }
    }

    events
}
