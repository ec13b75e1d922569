//! Average Daily Range bookkeeping for the confluence score.
//!
//! Daily ranges are built from H4 candles bucketed per UTC day. The score
//! rewards entries while the day still has room to run and punishes entries
//! into an exhausted day.

use crate::domain::market::candle::Candle;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;

const MS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, PartialEq)]
pub struct AdrSnapshot {
    pub adr: Decimal,
    pub today_range: Decimal,
    /// Percent of the ADR consumed by today's range
    pub consumed_pct: f64,
    /// True while the day still has room to run
    pub base_credit: bool,
    /// Signed confluence contribution, clamped to [-15, +10]
    pub score: f64,
}

/// Compute the ADR snapshot from H4 candles. `days` prior full days feed the
/// average; the last (partial) day is measured against it. None when there
/// is no prior day to average.
pub fn adr_snapshot(h4_candles: &[Candle], days: usize) -> Option<AdrSnapshot> {
    if h4_candles.is_empty() || days == 0 {
        return None;
    }

    let mut day_ranges: BTreeMap<i64, (Decimal, Decimal)> = BTreeMap::new();
    for candle in h4_candles {
        let day = candle.start_time.div_euclid(MS_PER_DAY);
        day_ranges
            .entry(day)
            .and_modify(|(high, low)| {
                *high = (*high).max(candle.high);
                *low = (*low).min(candle.low);
            })
            .or_insert((candle.high, candle.low));
    }

    let (_, &(today_high, today_low)) = day_ranges.iter().next_back()?;
    let prior: Vec<Decimal> = day_ranges
        .iter()
        .rev()
        .skip(1)
        .take(days)
        .map(|(_, (high, low))| *high - *low)
        .collect();
    if prior.is_empty() {
        return None;
    }

    let adr = prior.iter().copied().sum::<Decimal>() / Decimal::from(prior.len());
    if adr <= Decimal::ZERO {
        return None;
    }
    let today_range = today_high - today_low;
    let consumed_pct = (today_range / adr).to_f64().unwrap_or(0.0) * 100.0;

    let score = if consumed_pct < 40.0 {
        10.0
    } else if consumed_pct < 70.0 {
        5.0
    } else if consumed_pct < 90.0 {
        0.0
    } else if consumed_pct < 110.0 {
        -8.0
    } else {
        -15.0
    };

    Some(AdrSnapshot {
        adr,
        today_range,
        consumed_pct,
        base_credit: consumed_pct < 70.0,
        score,
    })
}
