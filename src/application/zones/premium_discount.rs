//! Premium/discount classification against the midpoint (fib 0.5) of a
//! recent swing range. Volatile symbols read the tighter ITF window, the
//! rest the HTF window.

use crate::domain::market::candle::Candle;
use crate::domain::market::zones::{PdContext, PdZone};
use crate::domain::trading::symbol_spec::SymbolSpec;
use crate::domain::trading::types::Direction;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

#[derive(Debug, Clone)]
pub struct PdConfig {
    pub htf_window: usize,
    pub itf_window: usize,
}

impl Default for PdConfig {
    fn default() -> Self {
        Self {
            htf_window: 100,
            itf_window: 25,
        }
    }
}

impl PdConfig {
    pub fn window_for(&self, spec: &SymbolSpec) -> usize {
        if spec.volatile {
            self.itf_window
        } else {
            self.htf_window
        }
    }
}

/// Classify `price` against the high/low of the trailing `window` candles.
/// None when the window is empty or flat.
pub fn premium_discount(candles: &[Candle], window: usize, price: Decimal) -> Option<PdContext> {
    if candles.is_empty() || window == 0 {
        return None;
    }
    let start = candles.len().saturating_sub(window);
    let slice = &candles[start..];

    let swing_high = slice.iter().map(|c| c.high).max()?;
    let swing_low = slice.iter().map(|c| c.low).min()?;
    if swing_high <= swing_low {
        return None;
    }
    let fib50 = (swing_high + swing_low) / Decimal::TWO;

    let zone = if price > fib50 {
        PdZone::Premium
    } else if price < fib50 {
        PdZone::Discount
    } else {
        PdZone::Neutral
    };

    Some(PdContext {
        zone,
        swing_high,
        swing_low,
        fib50,
    })
}

/// Signed confluence contribution in [-10, +15]: deep discount rewards buys,
/// deep premium rewards sells, fighting the range costs points.
pub fn pd_score(ctx: &PdContext, price: Decimal, direction: Direction) -> f64 {
    let range = ctx.swing_high - ctx.swing_low;
    if range <= Decimal::ZERO {
        return 0.0;
    }
    let position = ((price - ctx.swing_low) / range).to_f64().unwrap_or(0.5);
    let depth = match direction {
        Direction::Buy => position,
        Direction::Sell => 1.0 - position,
    };

    if depth < 0.25 {
        15.0
    } else if depth < 0.5 {
        10.0
    } else if depth < 0.6 {
        0.0
    } else {
        -10.0
    }
}
