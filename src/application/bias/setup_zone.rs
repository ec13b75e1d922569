//! M15 setup-zone construction.
//!
//! A setup against the HTF bias direction needs, in order: a CHoCH (or MSB)
//! turning the M15 flow against the bias, a displacement candle after it
//! whose leg forms the retracement, an FVG born during that leg, and a prior
//! unmitigated order block in the trade direction. FVG and OB intersect into
//! the zone; a disjoint pair resolves to the FVG.

use crate::application::structure::{StructureConfig, analyze_structure};
use crate::application::zones::fvg::{FvgConfig, detect_fvgs};
use crate::application::zones::order_blocks::{OrderBlockConfig, detect_order_blocks};
use crate::domain::market::candle::Candle;
use crate::domain::market::structure::ChochEvent;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::zones::{FairValueGap, OrderBlock};
use crate::domain::trading::symbol_spec::SymbolSpec;
use crate::domain::trading::types::Direction;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
pub struct SetupZoneConfig {
    /// Relaxed mode lets a plain counter-trend BOS stand in for the CHoCH
    pub relaxed: bool,
    /// Displacement body must exceed this multiple of the previous body
    pub displacement_body_multiple: Decimal,
    pub order_blocks: OrderBlockConfig,
    /// Price tolerance around the zone, as a fraction of zone size
    pub zone_tolerance: Decimal,
}

impl Default for SetupZoneConfig {
    fn default() -> Self {
        Self {
            relaxed: false,
            displacement_body_multiple: dec!(1.5),
            order_blocks: OrderBlockConfig::default(),
            zone_tolerance: dec!(0.10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetupZone {
    pub direction: Direction,
    pub high: Decimal,
    pub low: Decimal,
    pub choch_index: usize,
    pub displacement_index: Option<usize>,
    pub fvg: Option<FairValueGap>,
    pub order_block: Option<OrderBlock>,
    /// Debug-mode zones synthesised around price carry no structure
    pub synthetic: bool,
}

impl SetupZone {
    pub fn size(&self) -> Decimal {
        self.high - self.low
    }

    pub fn midpoint(&self) -> Decimal {
        (self.high + self.low) / Decimal::TWO
    }

    /// Price inside the zone widened by `tolerance` x zone size on each side
    pub fn contains_with_tolerance(&self, price: Decimal, tolerance: Decimal) -> bool {
        let pad = self.size() * tolerance;
        price >= self.low - pad && price <= self.high + pad
    }

    /// Zone synthesised around the current price, used by the
    /// minimal-entry debug mode only.
    pub fn synthetic_around(direction: Direction, price: Decimal, half_width: Decimal) -> Self {
        SetupZone {
            direction,
            high: price + half_width,
            low: price - half_width,
            choch_index: 0,
            displacement_index: None,
            fvg: None,
            order_block: None,
            synthetic: true,
        }
    }
}

/// Build the M15 setup zone for a directional bias. Errors carry the
/// rejection reason verbatim.
pub fn compute_setup_zone(
    m15: &[Candle],
    direction: Direction,
    spec: &SymbolSpec,
    config: &SetupZoneConfig,
    structure_config: &StructureConfig,
) -> Result<SetupZone, String> {
    let analysis = analyze_structure(m15, structure_config);

    // 1. The M15 must have turned against the bias: a CHoCH or MSB whose
    //    resulting flow points opposite to the trade direction.
    let counter = direction.opposite().structure().as_trend();
    let choch = last_counter_reversal(&analysis.choch_events, &analysis.msb_events, counter);

    let choch_index = match choch {
        Some(event) => event.index,
        None if config.relaxed => analysis
            .bos_events
            .iter()
            .rev()
            .find(|b| b.direction == direction.opposite().structure())
            .map(|b| b.index)
            .ok_or_else(|| "No M15 CHoCH or counter-trend BOS for setup".to_string())?,
        None => return Err("No M15 CHoCH for setup".to_string()),
    };

    // 2. Displacement candle after the CHoCH, pointing opposite the setup:
    //    the retracement leg that carves out the zone.
    let displacement_index = (choch_index.max(1)..m15.len()).find(|&i| {
        let candle = &m15[i];
        let prev_body = m15[i - 1].body();
        let directional = match direction {
            Direction::Buy => candle.is_bearish(),
            Direction::Sell => candle.is_bullish(),
        };
        directional && prev_body > Decimal::ZERO && candle.body() > prev_body * config.displacement_body_multiple
    });
    let Some(displacement_index) = displacement_index else {
        return Err("No displacement candle after M15 CHoCH".to_string());
    };

    // 3. An FVG born during the displacement leg, symbol-size filtered.
    let fvg_config = FvgConfig {
        min_gap_size: spec.min_gap_size,
        prevailing: counter,
    };
    let fvgs = detect_fvgs(m15, Timeframe::M15, &fvg_config, None);
    let leg_direction = direction.opposite().structure();
    let fvg = fvgs
        .iter()
        .rev()
        .find(|f| {
            f.direction == leg_direction && !f.filled && f.candle_indices[1] >= choch_index
        })
        .cloned();

    // 4. A prior unmitigated order block in the trade direction, printed
    //    before the CHoCH.
    let blocks = detect_order_blocks(m15, Timeframe::M15, &config.order_blocks);
    let order_block = blocks
        .iter()
        .find(|b| {
            b.direction == direction.structure() && !b.mitigated && b.candle_index < choch_index
        })
        .cloned();

    let (low, high) = match (&fvg, &order_block) {
        (Some(f), Some(o)) => {
            let low = f.low.max(o.low);
            let high = f.high.min(o.high);
            if low < high {
                (low, high)
            } else {
                // Disjoint zones resolve to the FVG
                (f.low, f.high)
            }
        }
        (Some(f), None) => (f.low, f.high),
        (None, Some(o)) => (o.low, o.high),
        (None, None) => return Err("No FVG or order block to anchor setup zone".to_string()),
    };

    let zone = SetupZone {
        direction,
        high,
        low,
        choch_index,
        displacement_index: Some(displacement_index),
        fvg,
        order_block,
        synthetic: false,
    };

    let last_close = m15.last().map(|c| c.close).unwrap_or(Decimal::ZERO);
    if !zone.contains_with_tolerance(last_close, config.zone_tolerance) {
        return Err(format!(
            "Price {} outside M15 setup zone [{} - {}]",
            last_close, zone.low, zone.high
        ));
    }

    Ok(zone)
}

fn last_counter_reversal(
    choch_events: &[ChochEvent],
    msb_events: &[crate::domain::market::structure::MsbEvent],
    counter: crate::domain::market::structure::Trend,
) -> Option<ChochEvent> {
    let choch = choch_events.iter().rev().find(|c| c.to_trend == counter);
    let msb = msb_events.iter().rev().map(|m| &m.choch).find(|c| c.to_trend == counter);
    match (choch, msb) {
        (Some(c), Some(m)) => Some(if m.index >= c.index { *m } else { *c }),
        (Some(c), None) => Some(*c),
        (None, Some(m)) => Some(*m),
        (None, None) => None,
    }
}
