//! Swing detection.
//!
//! Two pivot rules are supported: the structural 3-candle pivot (default,
//! one bar on each side, strict inequality) and the fractal pivot with a
//! configurable number of bars on each side. Both are pure functions of the
//! candle window; output ordering and tie-breaks are fixed.

use crate::domain::market::candle::Candle;
use crate::domain::market::structure::{SwingPoint, SwingType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingMode {
    /// 3-consecutive-candle pivot, one bar each side
    Structural,
    /// N-bars-each-side fractal pivot
    Fractal,
}

#[derive(Debug, Clone)]
pub struct SwingConfig {
    pub mode: SwingMode,
    pub pivot_left: usize,
    pub pivot_right: usize,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            mode: SwingMode::Structural,
            pivot_left: 2,
            pivot_right: 2,
        }
    }
}

impl SwingConfig {
    fn spans(&self) -> (usize, usize) {
        match self.mode {
            SwingMode::Structural => (1, 1),
            SwingMode::Fractal => (self.pivot_left.max(1), self.pivot_right.max(1)),
        }
    }
}

/// True when `candles[index]` is a 3-candle pivot of the given type,
/// independent of the configured swing mode. MSB classification uses this
/// to test whether a broken swing is structural.
pub fn is_structural_pivot(candles: &[Candle], index: usize, swing_type: SwingType) -> bool {
    if index == 0 || index + 1 >= candles.len() {
        return false;
    }
    match swing_type {
        SwingType::High => {
            candles[index].high > candles[index - 1].high
                && candles[index].high > candles[index + 1].high
        }
        SwingType::Low => {
            candles[index].low < candles[index - 1].low
                && candles[index].low < candles[index + 1].low
        }
    }
}

/// Detect all swings in the window, sorted by candle index. For equal-price
/// pivots the earlier index wins, which is what index-sorted output already
/// guarantees; re-runs over the same window produce identical vectors.
pub fn detect_swings(candles: &[Candle], config: &SwingConfig) -> Vec<SwingPoint> {
    let (left, right) = config.spans();
    if candles.len() < left + right + 1 {
        return Vec::new();
    }

    let mut swings = Vec::new();
    for i in left..candles.len() - right {
        if is_pivot(candles, i, left, right, SwingType::High) {
            swings.push(SwingPoint {
                index: i,
                swing_type: SwingType::High,
                price: candles[i].high,
                timestamp: candles[i].start_time,
            });
        }
        if is_pivot(candles, i, left, right, SwingType::Low) {
            swings.push(SwingPoint {
                index: i,
                swing_type: SwingType::Low,
                price: candles[i].low,
                timestamp: candles[i].start_time,
            });
        }
    }
    swings
}

fn is_pivot(
    candles: &[Candle],
    index: usize,
    left: usize,
    right: usize,
    swing_type: SwingType,
) -> bool {
    match swing_type {
        SwingType::High => {
            let high = candles[index].high;
            (1..=left).all(|off| candles[index - off].high < high)
                && (1..=right).all(|off| candles[index + off].high < high)
        }
        SwingType::Low => {
            let low = candles[index].low;
            (1..=left).all(|off| candles[index - off].low > low)
                && (1..=right).all(|off| candles[index + off].low > low)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    fn candle(i: usize, high: f64, low: f64) -> Candle {
        Candle {
            symbol: "XAUUSD".to_string(),
            timeframe: Timeframe::M15,
            start_time: i as i64 * 900_000,
            end_time: (i as i64 + 1) * 900_000,
            open: Decimal::from_f64((high + low) / 2.0).unwrap(),
            high: Decimal::from_f64(high).unwrap(),
            low: Decimal::from_f64(low).unwrap(),
            close: Decimal::from_f64((high + low) / 2.0).unwrap(),
            volume: Decimal::from(1000),
        }
    }

    fn window(prices: &[(f64, f64)]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, (h, l))| candle(i, *h, *l))
            .collect()
    }

    #[test]
    fn test_structural_pivot_high() {
        let candles = window(&[(10.0, 9.0), (12.0, 10.0), (11.0, 9.5)]);
        let swings = detect_swings(&candles, &SwingConfig::default());
        assert_eq!(swings.len(), 1);
        assert_eq!(swings[0].index, 1);
        assert_eq!(swings[0].swing_type, SwingType::High);
        assert_eq!(swings[0].price, Decimal::from(12));
    }

    #[test]
    fn test_equal_highs_are_not_pivots() {
        // Strict inequality: a plateau produces no swing
        let candles = window(&[(10.0, 9.0), (12.0, 10.0), (12.0, 10.0), (11.0, 9.5)]);
        let swings = detect_swings(&candles, &SwingConfig::default());
        let highs: Vec<_> = swings
            .iter()
            .filter(|s| s.swing_type == SwingType::High)
            .collect();
        assert!(highs.is_empty());
    }

    #[test]
    fn test_fractal_mode_requires_wider_dominance() {
        let candles = window(&[
            (10.0, 9.0),
            (11.0, 9.5),
            (12.0, 10.0),
            (11.5, 10.0),
            (11.0, 9.8),
        ]);
        // Structural finds the pivot at 2
        let structural = detect_swings(&candles, &SwingConfig::default());
        assert!(structural.iter().any(|s| s.index == 2));

        // Fractal with 2 bars each side also confirms it here
        let fractal = detect_swings(
            &candles,
            &SwingConfig {
                mode: SwingMode::Fractal,
                pivot_left: 2,
                pivot_right: 2,
            },
        );
        assert!(
            fractal
                .iter()
                .any(|s| s.index == 2 && s.swing_type == SwingType::High)
        );
    }

    #[test]
    fn test_deterministic_rerun() {
        let candles = window(&[
            (10.0, 9.0),
            (12.0, 10.0),
            (11.0, 9.5),
            (10.5, 8.0),
            (11.5, 9.0),
            (13.0, 10.5),
            (12.0, 10.0),
        ]);
        let cfg = SwingConfig::default();
        assert_eq!(detect_swings(&candles, &cfg), detect_swings(&candles, &cfg));
    }

    #[test]
    fn test_sorted_by_index() {
        let candles = window(&[
            (10.0, 9.0),
            (12.0, 8.5),
            (11.0, 9.5),
            (13.0, 10.0),
            (12.0, 9.8),
        ]);
        let swings = detect_swings(&candles, &SwingConfig::default());
        for pair in swings.windows(2) {
            assert!(pair[0].index <= pair[1].index);
        }
    }
}
