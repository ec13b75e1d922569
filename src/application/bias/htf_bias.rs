//! H4 bias derivation.
//!
//! The structure state machine carries the formal trend. When it holds no
//! direction the bias falls back to BOS counting, then to the position of
//! the last close against the window midpoint; a bias recovered through a
//! fallback never makes the formal trend directional.

use crate::application::structure::{StructureConfig, analyze_structure};
use crate::domain::market::candle::Candle;
use crate::domain::market::structure::Trend;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiasMethod {
    Choch,
    Bos,
    Displacement,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HtfBias {
    pub trend: Trend,
    pub method: BiasMethod,
    /// Trend carried by the structure machine alone; `Unknown` reads as
    /// sideways regardless of any fallback bias
    pub formal_trend: Trend,
    pub swing_high: Option<Decimal>,
    pub swing_low: Option<Decimal>,
    pub last_close: Decimal,
}

/// Margin a fallback close must clear beyond the midpoint, as a fraction of
/// the window range
const MIDPOINT_MARGIN: f64 = 0.1;

pub fn compute_htf_bias(candles: &[Candle], config: &StructureConfig) -> HtfBias {
    let last_close = candles.last().map(|c| c.close).unwrap_or(Decimal::ZERO);
    let swing_high = candles.iter().map(|c| c.high).max();
    let swing_low = candles.iter().map(|c| c.low).min();

    let analysis = analyze_structure(candles, config);

    if analysis.trend.is_directional() {
        let method = if analysis.choch_events.is_empty() && analysis.msb_events.is_empty() {
            BiasMethod::Bos
        } else {
            BiasMethod::Choch
        };
        return HtfBias {
            trend: analysis.trend,
            method,
            formal_trend: analysis.trend,
            swing_high,
            swing_low,
            last_close,
        };
    }

    let bullish = analysis.bullish_bos_count() as i64;
    let bearish = analysis.bearish_bos_count() as i64;
    if bullish - bearish >= 2 {
        return fallback(Trend::Bullish, BiasMethod::Bos, swing_high, swing_low, last_close);
    }
    if bearish - bullish >= 2 {
        return fallback(Trend::Bearish, BiasMethod::Bos, swing_high, swing_low, last_close);
    }

    if let (Some(high), Some(low)) = (swing_high, swing_low) {
        let range = high - low;
        if range > Decimal::ZERO {
            let margin = range * Decimal::from_f64_retain(MIDPOINT_MARGIN).unwrap_or(Decimal::ZERO);
            let midpoint = (high + low) / Decimal::TWO;
            if last_close > midpoint + margin {
                return fallback(
                    Trend::Bullish,
                    BiasMethod::Displacement,
                    swing_high,
                    swing_low,
                    last_close,
                );
            }
            if last_close < midpoint - margin {
                return fallback(
                    Trend::Bearish,
                    BiasMethod::Displacement,
                    swing_high,
                    swing_low,
                    last_close,
                );
            }
        }
    }

    HtfBias {
        trend: Trend::Unknown,
        method: BiasMethod::None,
        formal_trend: Trend::Unknown,
        swing_high,
        swing_low,
        last_close,
    }
}

fn fallback(
    trend: Trend,
    method: BiasMethod,
    swing_high: Option<Decimal>,
    swing_low: Option<Decimal>,
    last_close: Decimal,
) -> HtfBias {
    HtfBias {
        trend,
        method,
        formal_trend: Trend::Unknown,
        swing_high,
        swing_low,
        last_close,
    }
}
