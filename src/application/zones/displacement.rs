//! True-range helpers and the displacement qualification check.
//!
//! A displacement candle marks directional conviction: a dominant body and a
//! true range well above the recent average, pointing with the trade. The
//! check runs in two modes. In hard mode a failed check rejects the setup;
//! in soft mode the signed score feeds the confluence sum.

use crate::domain::market::candle::Candle;
use crate::domain::market::zones::DisplacementCheck;
use crate::domain::trading::types::Direction;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

#[derive(Debug, Clone)]
pub struct DisplacementConfig {
    pub atr_lookback_period: usize,
    /// Body as % of the candle range
    pub strong_body_min_pct: f64,
    /// True range as a multiple of ATR
    pub strong_atr_min_multiple: f64,
    /// Candles scanned back from the window end for a candidate
    pub scan_depth: usize,
    /// Hard mode rejects the setup on failure instead of scoring it down
    pub hard: bool,
}

impl Default for DisplacementConfig {
    fn default() -> Self {
        Self {
            atr_lookback_period: 14,
            strong_body_min_pct: 55.0,
            strong_atr_min_multiple: 1.2,
            scan_depth: 5,
            hard: false,
        }
    }
}

/// True range of `candle` given the previous candle's close
pub fn true_range(candle: &Candle, prev: Option<&Candle>) -> Decimal {
    let range = candle.high - candle.low;
    match prev {
        Some(p) => {
            let high_gap = (candle.high - p.close).abs();
            let low_gap = (candle.low - p.close).abs();
            range.max(high_gap).max(low_gap)
        }
        None => range,
    }
}

/// Simple average of the true range over the trailing `period` candles.
/// None when the window is too short.
pub fn average_true_range(candles: &[Candle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }
    let start = candles.len() - period;
    let mut sum = Decimal::ZERO;
    for i in start..candles.len() {
        sum += true_range(&candles[i], Some(&candles[i - 1]));
    }
    Some(sum / Decimal::from(period))
}

fn candle_matches(candle: &Candle, direction: Direction) -> bool {
    match direction {
        Direction::Buy => candle.is_bullish(),
        Direction::Sell => candle.is_bearish(),
    }
}

/// Qualify displacement for a candidate trade direction over the tail of the
/// window. Score is clamped to [-15, +15].
pub fn check_displacement(
    candles: &[Candle],
    direction: Direction,
    config: &DisplacementConfig,
) -> DisplacementCheck {
    let Some(atr) = average_true_range(candles, config.atr_lookback_period) else {
        return DisplacementCheck {
            is_valid: false,
            score: -5.0,
            reasons: vec!["Not enough candles for ATR".to_string()],
        };
    };
    let atr_f = atr.to_f64().unwrap_or(0.0);
    if atr_f <= 0.0 {
        return DisplacementCheck {
            is_valid: false,
            score: -5.0,
            reasons: vec!["Flat window, ATR is zero".to_string()],
        };
    }

    let scan_start = candles.len().saturating_sub(config.scan_depth).max(1);

    // Best aligned candidate and strongest opposing candle in the scan tail
    let mut best: Option<(f64, f64)> = None; // (tr_multiple, body_pct)
    let mut opposing_strong = false;
    for i in scan_start..candles.len() {
        let tr = true_range(&candles[i], Some(&candles[i - 1]))
            .to_f64()
            .unwrap_or(0.0);
        let tr_multiple = tr / atr_f;
        let body_pct = candles[i].body_pct();

        if candle_matches(&candles[i], direction) {
            let replace = match best {
                Some((prev_tr, prev_body)) => tr_multiple + body_pct / 100.0 > prev_tr + prev_body / 100.0,
                None => true,
            };
            if replace {
                best = Some((tr_multiple, body_pct));
            }
        } else if tr_multiple >= config.strong_atr_min_multiple
            && body_pct >= config.strong_body_min_pct
        {
            opposing_strong = true;
        }
    }

    match best {
        Some((tr_multiple, body_pct))
            if tr_multiple >= config.strong_atr_min_multiple
                && body_pct >= config.strong_body_min_pct =>
        {
            DisplacementCheck {
                is_valid: true,
                score: 15.0,
                reasons: vec![
                    format!(
                        "Displacement body {:.0}% >= {:.0}%",
                        body_pct, config.strong_body_min_pct
                    ),
                    format!(
                        "True range {:.2}x ATR >= {:.2}x",
                        tr_multiple, config.strong_atr_min_multiple
                    ),
                ],
            }
        }
        Some((tr_multiple, body_pct))
            if tr_multiple >= config.strong_atr_min_multiple
                || body_pct >= config.strong_body_min_pct =>
        {
            DisplacementCheck {
                is_valid: true,
                score: 8.0,
                reasons: vec![format!(
                    "Partial displacement: body {:.0}%, true range {:.2}x ATR",
                    body_pct, tr_multiple
                )],
            }
        }
        _ if opposing_strong => DisplacementCheck {
            is_valid: false,
            score: -15.0,
            reasons: vec!["Strong displacement against trade direction".to_string()],
        },
        _ => DisplacementCheck {
            is_valid: false,
            score: -5.0,
            reasons: vec!["No displacement candle in window".to_string()],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal_macros::dec;

    fn candle(i: usize, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            symbol: "XAUUSD".to_string(),
            timeframe: Timeframe::M15,
            start_time: i as i64 * 900_000,
            end_time: (i as i64 + 1) * 900_000,
            open: Decimal::from_f64(open).unwrap(),
            high: Decimal::from_f64(high).unwrap(),
            low: Decimal::from_f64(low).unwrap(),
            close: Decimal::from_f64(close).unwrap(),
            volume: Decimal::from(1000),
        }
    }

    fn quiet_window(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| candle(i, 100.0, 100.6, 99.6, 100.2))
            .collect()
    }

    #[test]
    fn test_true_range_includes_gaps() {
        let prev = candle(0, 100.0, 101.0, 99.0, 100.0);
        let curr = candle(1, 104.0, 105.0, 103.5, 104.5);
        // Gap up: TR measured from previous close
        assert_eq!(true_range(&curr, Some(&prev)), dec!(5.0));
        assert_eq!(true_range(&curr, None), dec!(1.5));
    }

    #[test]
    fn test_atr_needs_enough_candles() {
        let candles = quiet_window(10);
        assert!(average_true_range(&candles, 14).is_none());
        assert!(average_true_range(&candles, 9).is_some());
    }

    #[test]
    fn test_strong_displacement_scores_full() {
        let mut candles = quiet_window(20);
        // One wide-bodied bullish candle at the end, ~4x the quiet ATR
        candles.push(candle(20, 100.0, 104.2, 99.9, 104.0));
        let check = check_displacement(&candles, Direction::Buy, &DisplacementConfig::default());
        assert!(check.is_valid);
        assert_eq!(check.score, 15.0);
        assert_eq!(check.reasons.len(), 2);
    }

    #[test]
    fn test_opposing_displacement_scores_negative() {
        let mut candles = quiet_window(20);
        candles.push(candle(20, 104.0, 104.1, 99.8, 100.0)); // strong bearish
        let check = check_displacement(&candles, Direction::Buy, &DisplacementConfig::default());
        assert!(!check.is_valid);
        assert_eq!(check.score, -15.0);
    }

    #[test]
    fn test_quiet_window_scores_small_negative() {
        let candles = quiet_window(20);
        let check = check_displacement(&candles, Direction::Buy, &DisplacementConfig::default());
        assert!(!check.is_valid);
        assert_eq!(check.score, -5.0);
    }
}
