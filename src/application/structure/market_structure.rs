//! Market structure state machine.
//!
//! Consumes BOS events in index order and classifies them against the held
//! bias. A BOS against the bias that also breaks the bias's anchor swing is
//! a CHoCH; a CHoCH whose broken swing is a structural pivot bounding a
//! multi-swing range is relabelled MSB. The machine only ever reads candles
//! at or before the event it is processing.
//!
//! Events are recomputed per evaluation and never cached across calls;
//! re-running over an identical window yields identical events in identical
//! order.

use crate::domain::market::candle::Candle;
use crate::domain::market::structure::{
    BosEvent, ChochEvent, MsbEvent, StructureDirection, SwingPoint, SwingType, Trend,
};

use super::bos::{BosConfig, detect_bos};
use super::swings::{SwingConfig, detect_swings, is_structural_pivot};

#[derive(Debug, Clone, Default)]
pub struct StructureConfig {
    pub swing: SwingConfig,
    pub bos: BosConfig,
}

/// Full structure read over one candle window
#[derive(Debug, Clone, PartialEq)]
pub struct StructureAnalysis {
    pub swings: Vec<SwingPoint>,
    pub bos_events: Vec<BosEvent>,
    /// CHoCH events that were not promoted to MSB
    pub choch_events: Vec<ChochEvent>,
    pub msb_events: Vec<MsbEvent>,
    /// Bias held by the machine after the last BOS; `Unknown` reads as
    /// sideways
    pub trend: Trend,
    pub last_confirmed_high: Option<SwingPoint>,
    pub last_confirmed_low: Option<SwingPoint>,
}

impl StructureAnalysis {
    /// Latest CHoCH or MSB, MSB preferred when coincident
    pub fn last_reversal(&self) -> Option<ChochEvent> {
        let last_choch = self.choch_events.last().copied();
        let last_msb = self.msb_events.last().map(|m| m.choch);
        match (last_choch, last_msb) {
            (Some(c), Some(m)) => Some(if m.index >= c.index { m } else { c }),
            (Some(c), None) => Some(c),
            (None, Some(m)) => Some(m),
            (None, None) => None,
        }
    }

    pub fn bullish_bos_count(&self) -> usize {
        self.bos_events
            .iter()
            .filter(|e| e.direction == StructureDirection::Bullish)
            .count()
    }

    pub fn bearish_bos_count(&self) -> usize {
        self.bos_events
            .iter()
            .filter(|e| e.direction == StructureDirection::Bearish)
            .count()
    }
}

/// Run swing detection, BOS detection and the CHoCH state machine over one
/// window.
pub fn analyze_structure(candles: &[Candle], config: &StructureConfig) -> StructureAnalysis {
    let swings = detect_swings(candles, &config.swing);
    let bos_events = detect_bos(candles, &swings, &config.bos);

    let mut bias = Trend::Unknown;
    let mut anchor: Option<SwingPoint> = None;
    let mut last_confirmed_high: Option<SwingPoint> = None;
    let mut last_confirmed_low: Option<SwingPoint> = None;
    let mut choch_events: Vec<ChochEvent> = Vec::new();
    let mut msb_events: Vec<MsbEvent> = Vec::new();

    for bos in &bos_events {
        // Swing confirmations advance as BOS events pass
        for swing in swings.iter().filter(|s| s.index < bos.index) {
            match swing.swing_type {
                SwingType::High => last_confirmed_high = Some(*swing),
                SwingType::Low => last_confirmed_low = Some(*swing),
            }
        }

        let bos_trend = bos.direction.as_trend();
        if bias == Trend::Unknown {
            bias = bos_trend;
            anchor = opposite_side_swing(bos.direction, last_confirmed_high, last_confirmed_low);
            continue;
        }

        if bias == bos_trend {
            // Continuation: confirmations updated above, anchor unchanged
            continue;
        }

        // Counter-trend BOS: flips bias only if it also breaks the anchor
        let Some(anchor_swing) = anchor else {
            // Nothing to defend; adopt the new direction without a CHoCH
            bias = bos_trend;
            anchor = opposite_side_swing(bos.direction, last_confirmed_high, last_confirmed_low);
            continue;
        };

        if !breaks_anchor(&candles[bos.index], bos, &anchor_swing) {
            continue;
        }

        let choch = ChochEvent {
            index: bos.index,
            from_trend: bias,
            to_trend: bos_trend,
            broken_swing_index: anchor_swing.index,
            broken_swing_type: anchor_swing.swing_type,
            level: anchor_swing.price,
            bos_index: bos.index,
        };

        bias = bos_trend;
        // The new anchor sits on the side the old bias was confirming
        anchor = opposite_side_swing(bos.direction, last_confirmed_high, last_confirmed_low);

        if is_major_break(candles, &swings, &choch) {
            msb_events.push(MsbEvent { choch });
        } else {
            choch_events.push(choch);
        }
    }

    StructureAnalysis {
        swings,
        bos_events,
        choch_events,
        msb_events,
        trend: bias,
        last_confirmed_high,
        last_confirmed_low,
    }
}

/// Anchor for a bias adopted from a BOS in `direction`: the most recent
/// confirmed swing on the opposite side of the break.
fn opposite_side_swing(
    direction: StructureDirection,
    last_high: Option<SwingPoint>,
    last_low: Option<SwingPoint>,
) -> Option<SwingPoint> {
    match direction {
        StructureDirection::Bullish => last_low,
        StructureDirection::Bearish => last_high,
    }
}

fn breaks_anchor(candle: &Candle, bos: &BosEvent, anchor: &SwingPoint) -> bool {
    match anchor.swing_type {
        SwingType::Low => {
            let reference = if bos.strict_close {
                candle.close
            } else {
                candle.low
            };
            reference < anchor.price
        }
        SwingType::High => {
            let reference = if bos.strict_close {
                candle.close
            } else {
                candle.high
            };
            reference > anchor.price
        }
    }
}

/// A CHoCH is an MSB when the broken swing is a structural pivot and at
/// least two opposing swings printed inside the range it bounded, i.e. the
/// break took out a higher-order level.
fn is_major_break(candles: &[Candle], swings: &[SwingPoint], choch: &ChochEvent) -> bool {
    if !is_structural_pivot(candles, choch.broken_swing_index, choch.broken_swing_type) {
        return false;
    }
    let opposing = choch.broken_swing_type.opposite();
    let bounded = swings
        .iter()
        .filter(|s| {
            s.swing_type == opposing
                && s.index > choch.broken_swing_index
                && s.index < choch.index
        })
        .count();
    bounded >= 2
}
