//! M15 flow and the intermediate-timeframe quality gates.
//!
//! Flow is the structure machine's bias on M15. Trend strength is a Kaufman
//! efficiency ratio over the closing tail; the volatility ratio compares
//! short ATR against long ATR. Both are expressed in percent.

use crate::application::structure::{StructureConfig, analyze_structure};
use crate::application::zones::displacement::average_true_range;
use crate::domain::market::candle::Candle;
use crate::domain::market::structure::Trend;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// M15 flow for the alignment gate. Dominant BOS direction wins so that the
/// setup's own retracement CHoCH does not flip the flow reading; the machine
/// state only decides ties.
pub fn compute_itf_flow(candles: &[Candle], config: &StructureConfig) -> Trend {
    let analysis = analyze_structure(candles, config);
    let bullish = analysis.bullish_bos_count();
    let bearish = analysis.bearish_bos_count();
    if bullish > bearish {
        Trend::Bullish
    } else if bearish > bullish {
        Trend::Bearish
    } else {
        analysis.trend
    }
}

/// Strength of the most recent impulse, in percent: the best Kaufman
/// efficiency (net close movement over total close movement) across
/// trailing spans of 5..=lookback candles. A retracement setup keeps a
/// strong reading from its last leg; pure churn stays low.
pub fn trend_strength_pct(candles: &[Candle], lookback: usize) -> f64 {
    const MIN_SPAN: usize = 5;
    if candles.len() < lookback + 1 || lookback < MIN_SPAN {
        return 0.0;
    }
    let closes: Vec<Decimal> = candles[candles.len() - lookback - 1..]
        .iter()
        .map(|c| c.close)
        .collect();

    let mut best = 0.0f64;
    for span in MIN_SPAN..=lookback {
        let tail = &closes[closes.len() - 1 - span..];
        let net = (tail[tail.len() - 1] - tail[0]).abs();
        let total: Decimal = tail.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        if total > Decimal::ZERO {
            best = best.max((net / total).to_f64().unwrap_or(0.0) * 100.0);
        }
    }
    best
}

/// Short ATR over long ATR, in percent. Values under 100 mean volatility is
/// contracting.
pub fn volatility_ratio_pct(candles: &[Candle], fast: usize, slow: usize) -> f64 {
    let (Some(fast_atr), Some(slow_atr)) = (
        average_true_range(candles, fast),
        average_true_range(candles, slow),
    ) else {
        return 0.0;
    };
    if slow_atr <= Decimal::ZERO {
        return 0.0;
    }
    (fast_atr / slow_atr).to_f64().unwrap_or(0.0) * 100.0
}
