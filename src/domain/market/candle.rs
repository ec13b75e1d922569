use super::timeframe::Timeframe;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// One OHLCV bar. Immutable once built; sequences for a (symbol, timeframe)
/// pair are strictly ordered by `start_time` and contiguous within the
/// timeframe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Epoch milliseconds of the bar open
    pub start_time: i64,
    /// Epoch milliseconds of the bar close
    pub end_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Absolute body size
    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    /// High-low range
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// Body as a percentage of the full range, 0 when the bar is flat
    pub fn body_pct(&self) -> f64 {
        let range = self.range();
        if range <= Decimal::ZERO {
            return 0.0;
        }
        (self.body() / range).to_f64().unwrap_or(0.0) * 100.0
    }

    /// Wick above the body
    pub fn upper_wick(&self) -> Decimal {
        self.high - self.open.max(self.close)
    }

    /// Wick below the body
    pub fn lower_wick(&self) -> Decimal {
        self.open.min(self.close) - self.low
    }
}
