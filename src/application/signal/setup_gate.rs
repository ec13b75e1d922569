//! The hard pre-scoring gate of the strict ICT pipeline.
//!
//! Every check here rejects the setup outright; none of them contribute to
//! the confluence score. The relaxed pipeline skips this gate and lets the
//! same evidence score softly instead.

use crate::application::structure::{StructureConfig, analyze_structure, detect_swings};
use crate::application::zones::displacement::{average_true_range, true_range};
use crate::application::zones::liquidity::{SweepConfig, detect_sweeps};
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::zones::{FairValueGap, LiquiditySweep, PdZone};
use crate::domain::trading::types::Direction;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::application::bias::setup_zone::SetupZone;

#[derive(Debug, Clone)]
pub struct SetupGateConfig {
    /// Displacement passes on either leg of: TR multiple or body percent
    pub min_displacement_tr_multiple: f64,
    pub min_displacement_body_pct: f64,
    /// Break distance of the setup reversal, in ATR
    pub min_bos_strength_atr: f64,
    /// Gap of the FVG chosen inside the order block, in ATR
    pub min_fvg_gap_atr: f64,
    /// Candles back from the window end a sweep stays valid
    pub sweep_recency: usize,
    pub sweep: SweepConfig,
    pub atr_period: usize,
}

impl Default for SetupGateConfig {
    fn default() -> Self {
        Self {
            min_displacement_tr_multiple: 1.2,
            min_displacement_body_pct: 55.0,
            min_bos_strength_atr: 0.3,
            min_fvg_gap_atr: 0.3,
            sweep_recency: 30,
            sweep: SweepConfig::default(),
            atr_period: 14,
        }
    }
}

/// Evidence collected by a passing gate, reused for scoring and reasons
#[derive(Debug, Clone, PartialEq)]
pub struct SetupGateReport {
    pub sweep: LiquiditySweep,
    pub displacement_tr_multiple: f64,
    pub displacement_body_pct: f64,
    pub bos_strength_atr: f64,
    pub narrow_fvg: Option<FairValueGap>,
}

/// Run the hard gate. Errors carry the rejection reason verbatim.
pub fn evaluate_setup_gate(
    m15: &[Candle],
    zone: &SetupZone,
    direction: Direction,
    pd_zone: PdZone,
    config: &SetupGateConfig,
    structure_config: &StructureConfig,
) -> Result<SetupGateReport, String> {
    let Some(atr) = average_true_range(m15, config.atr_period) else {
        return Err("Not enough M15 candles for ATR".to_string());
    };
    let atr_f = atr.to_f64().unwrap_or(0.0);
    if atr_f <= 0.0 {
        return Err("Flat M15 window, ATR is zero".to_string());
    }

    // 1. A confirmed liquidity sweep on the side the trade feeds from:
    //    buys want sell-side liquidity taken (a swing low swept).
    let swings = detect_swings(m15, &structure_config.swing);
    let sweeps = detect_sweeps(m15, &swings, Timeframe::M15, &config.sweep);
    let recency_floor = m15.len().saturating_sub(config.sweep_recency);
    let sweep = sweeps
        .iter()
        .rev()
        .find(|s| s.direction == direction.structure() && s.candle_index >= recency_floor)
        .cloned()
        .ok_or_else(|| "No valid liquidity sweep".to_string())?;

    // 2. Displacement qualification on the setup's displacement candle
    let Some(displacement_index) = zone.displacement_index else {
        return Err("No displacement candle for setup".to_string());
    };
    let candle = &m15[displacement_index];
    let prev = displacement_index.checked_sub(1).map(|i| &m15[i]);
    let tr_multiple = true_range(candle, prev).to_f64().unwrap_or(0.0) / atr_f;
    let body_pct = candle.body_pct();
    if tr_multiple < config.min_displacement_tr_multiple
        && body_pct < config.min_displacement_body_pct
    {
        return Err(format!(
            "Displacement too weak: {:.2}x ATR, body {:.0}%",
            tr_multiple, body_pct
        ));
    }

    // 3. Premium/discount enforcement, no override
    match direction {
        Direction::Buy if pd_zone != PdZone::Discount => {
            return Err("Buy setup not in discount zone".to_string());
        }
        Direction::Sell if pd_zone != PdZone::Premium => {
            return Err("Sell setup not in premium zone".to_string());
        }
        _ => {}
    }

    // 4. Break strength of the setup reversal
    let analysis = analyze_structure(m15, structure_config);
    let counter = direction.opposite().structure().as_trend();
    let reversal = analysis
        .last_reversal()
        .filter(|r| r.to_trend == counter)
        .ok_or_else(|| "No M15 reversal to measure break strength".to_string())?;
    let break_candle = &m15[reversal.index];
    let reference = if structure_config.bos.strict_close {
        break_candle.close
    } else {
        match counter {
            crate::domain::market::structure::Trend::Bullish => break_candle.high,
            _ => break_candle.low,
        }
    };
    let bos_strength_atr = ((reference - reversal.level).abs() / atr).to_f64().unwrap_or(0.0);
    if bos_strength_atr < config.min_bos_strength_atr {
        return Err(format!(
            "BOS break too shallow: {:.2} ATR < {:.2} ATR",
            bos_strength_atr, config.min_bos_strength_atr
        ));
    }

    // 5. Narrow FVG selection: the gap must sit inside the chosen order
    //    block and be meaningful against ATR
    let min_gap = atr * Decimal::from_f64_retain(config.min_fvg_gap_atr).unwrap_or(Decimal::ZERO);
    let narrow_fvg = match (&zone.fvg, &zone.order_block) {
        (Some(fvg), Some(ob)) => {
            let overlaps = fvg.low < ob.high && fvg.high > ob.low;
            if overlaps && fvg.gap_size() >= min_gap {
                Some(fvg.clone())
            } else {
                None
            }
        }
        (Some(fvg), None) => {
            if fvg.gap_size() >= min_gap {
                Some(fvg.clone())
            } else {
                None
            }
        }
        _ => None,
    };
    if narrow_fvg.is_none() {
        return Err("No FVG inside the order block with sufficient gap".to_string());
    }

    Ok(SetupGateReport {
        sweep,
        displacement_tr_multiple: tr_multiple,
        displacement_body_pct: body_pct,
        bos_strength_atr,
        narrow_fvg,
    })
}
