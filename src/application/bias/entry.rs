//! M1 entry refinement.
//!
//! Inside a valid M15 zone the M1 must confirm with a local CHoCH (or a
//! same-direction BOS), and the entry anchors to a refined M1 order block
//! edge, falling back to the FVG midpoint and finally the zone midpoint.
//! The stop always hangs off an M15 structural swing with a symbol-aware
//! buffer; the target is risk times the configured RR, optionally snapped
//! to structure.

use crate::application::structure::{
    StructureConfig, SwingConfig, analyze_structure, detect_swings,
};
use crate::application::zones::order_blocks::{OrderBlockConfig, detect_order_blocks};
use crate::domain::market::candle::Candle;
use crate::domain::market::structure::SwingType;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::zones::OrderBlock;
use crate::domain::trading::symbol_spec::SymbolSpec;
use crate::domain::trading::types::{Direction, EntryType};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal_macros::dec;

use super::setup_zone::SetupZone;

#[derive(Debug, Clone)]
pub struct EntryConfig {
    /// Reward multiple of risk, bound to TP_R_MULT
    pub configured_rr: f64,
    /// Demand an M1 BOS even when a CHoCH already confirmed
    pub require_ltf_bos: bool,
    /// Overrides the symbol stop-loss buffer when set (SL_POI_BUFFER)
    pub sl_buffer_override: Option<Decimal>,
    /// Snap the target to the nearest structural swing when it keeps RR in
    /// the preferred band
    pub snap_tp_to_structure: bool,
    /// Minimum retracement depth into the zone, percent; 0 disables
    pub min_retracement_pct: f64,
    /// Entries within this percent of price go out as market orders
    pub market_entry_tolerance_pct: f64,
    pub order_blocks: OrderBlockConfig,
    /// Price tolerance around the zone, as a fraction of zone size
    pub zone_tolerance: Decimal,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            configured_rr: 3.0,
            require_ltf_bos: false,
            sl_buffer_override: None,
            snap_tp_to_structure: true,
            min_retracement_pct: 50.0,
            market_entry_tolerance_pct: 0.05,
            order_blocks: OrderBlockConfig::default(),
            zone_tolerance: dec!(0.10),
        }
    }
}

/// RR band a snapped target must land in
const SNAP_RR_MIN: f64 = 2.0;
const SNAP_RR_MAX: f64 = 3.0;
/// The final reward can never undercut this fraction of the configured RR
const RR_FLOOR_FRACTION: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct EntryDecision {
    pub entry: Decimal,
    pub entry_type: EntryType,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub m1_choch: bool,
    pub ltf_bos: bool,
    pub refined_ob: Option<OrderBlock>,
    pub entry_refined: bool,
    pub reasons: Vec<String>,
}

/// Compute the M1 execution for a validated setup zone. Errors carry the
/// rejection reason verbatim.
pub fn compute_entry(
    m1: &[Candle],
    m15: &[Candle],
    zone: &SetupZone,
    direction: Direction,
    spec: &SymbolSpec,
    config: &EntryConfig,
    structure_config: &StructureConfig,
) -> Result<EntryDecision, String> {
    let Some(current) = m1.last().map(|c| c.close) else {
        return Err("No M1 candles".to_string());
    };

    // (a) Price must sit inside the zone, padded by the tolerance
    if !zone.contains_with_tolerance(current, config.zone_tolerance) {
        return Err(format!(
            "Price {} not inside M15 zone [{} - {}]",
            current, zone.low, zone.high
        ));
    }

    // (b) Local confirmation: CHoCH into the trade direction, or BOS
    let analysis = analyze_structure(m1, structure_config);
    let wanted = direction.structure().as_trend();
    let m1_choch = analysis
        .choch_events
        .iter()
        .any(|c| c.to_trend == wanted)
        || analysis.msb_events.iter().any(|m| m.choch.to_trend == wanted);
    let ltf_bos = analysis
        .bos_events
        .iter()
        .any(|b| b.direction == direction.structure());

    if !m1_choch && !ltf_bos {
        return Err("No M1 CHoCH or BOS confirmation".to_string());
    }
    if config.require_ltf_bos && !ltf_bos {
        return Err("M1 BOS required but not found".to_string());
    }

    let mut reasons = Vec::new();
    if m1_choch {
        reasons.push("M1 CHoCH confirmed".to_string());
    } else {
        reasons.push("M1 BOS confirmed".to_string());
    }

    // (c) Entry anchor: refined M1 order block edge, FVG midpoint, zone
    // midpoint, in that order
    let blocks = detect_order_blocks(m1, Timeframe::M1, &config.order_blocks);
    let refined_ob = blocks
        .iter()
        .find(|b| b.direction == direction.structure() && !b.mitigated)
        .cloned();

    let (entry, entry_refined) = match &refined_ob {
        Some(ob) => {
            let edge = match direction {
                Direction::Buy => ob.low,
                Direction::Sell => ob.high,
            };
            reasons.push(format!("Refined M1 OB entry at {}", edge));
            (edge, true)
        }
        None => match &zone.fvg {
            Some(fvg) => {
                reasons.push(format!("FVG midpoint entry at {}", fvg.midpoint()));
                (fvg.midpoint(), false)
            }
            None => {
                reasons.push(format!("Zone midpoint entry at {}", zone.midpoint()));
                (zone.midpoint(), false)
            }
        },
    };

    // Deep-retracement filter: buys want the lower part of the zone, sells
    // the upper part
    if config.min_retracement_pct > 0.0 && !zone.synthetic && zone.size() > Decimal::ZERO {
        let depth = match direction {
            Direction::Buy => (zone.high - entry) / zone.size(),
            Direction::Sell => (entry - zone.low) / zone.size(),
        };
        let depth_pct = depth.to_f64().unwrap_or(0.0) * 100.0;
        if depth_pct < config.min_retracement_pct {
            return Err(format!(
                "Entry retracement too shallow: {:.0}% < {:.0}%",
                depth_pct, config.min_retracement_pct
            ));
        }
    }

    let entry_type = classify_entry(entry, current, direction, config.market_entry_tolerance_pct);

    // Stop loss off M15 structure
    let buffer = config.sl_buffer_override.unwrap_or(spec.sl_buffer);
    // Stops anchor to structural pivots regardless of the swing mode used
    // elsewhere in the pipeline
    let m15_swings = detect_swings(m15, &SwingConfig::default());
    let stop_loss = match direction {
        Direction::Buy => {
            let anchor = m15_swings
                .iter()
                .filter(|s| s.swing_type == SwingType::Low && s.price < entry)
                .map(|s| s.price)
                .max()
                .unwrap_or(zone.low);
            anchor.min(entry) - buffer
        }
        Direction::Sell => {
            let anchor = m15_swings
                .iter()
                .filter(|s| s.swing_type == SwingType::High && s.price > entry)
                .map(|s| s.price)
                .min()
                .unwrap_or(zone.high);
            anchor.max(entry) + buffer
        }
    };

    let risk = (entry - stop_loss).abs();
    if risk <= Decimal::ZERO {
        return Err("Stop loss collapsed onto entry".to_string());
    }

    // Take profit: configured RR, optionally snapped to structure
    let rr = Decimal::from_f64(config.configured_rr).unwrap_or(dec!(3.0));
    let mut take_profit = match direction {
        Direction::Buy => entry + risk * rr,
        Direction::Sell => entry - risk * rr,
    };

    if config.snap_tp_to_structure {
        let candidate = match direction {
            Direction::Buy => m15_swings
                .iter()
                .filter(|s| s.swing_type == SwingType::High && s.price > entry)
                .map(|s| s.price)
                .min(),
            Direction::Sell => m15_swings
                .iter()
                .filter(|s| s.swing_type == SwingType::Low && s.price < entry)
                .map(|s| s.price)
                .max(),
        };
        if let Some(level) = candidate {
            let snap_rr = ((level - entry).abs() / risk).to_f64().unwrap_or(0.0);
            let floor = RR_FLOOR_FRACTION * config.configured_rr;
            if (SNAP_RR_MIN..=SNAP_RR_MAX).contains(&snap_rr) && snap_rr >= floor {
                take_profit = level;
                reasons.push(format!("Take profit snapped to structure at {}", level));
            }
        }
    }

    Ok(EntryDecision {
        entry,
        entry_type,
        stop_loss,
        take_profit,
        m1_choch,
        ltf_bos,
        refined_ob,
        entry_refined,
        reasons,
    })
}

fn classify_entry(
    entry: Decimal,
    current: Decimal,
    direction: Direction,
    tolerance_pct: f64,
) -> EntryType {
    if current <= Decimal::ZERO {
        return EntryType::Limit;
    }
    let distance_pct = ((entry - current).abs() / current).to_f64().unwrap_or(0.0) * 100.0;
    if distance_pct <= tolerance_pct {
        return EntryType::Market;
    }
    // Beyond price in the trade direction is a stop entry; the broker
    // distinguishes the two from entry vs market bid/ask.
    match direction {
        Direction::Buy if entry > current => EntryType::Stop,
        Direction::Sell if entry < current => EntryType::Stop,
        _ => EntryType::Limit,
    }
}
