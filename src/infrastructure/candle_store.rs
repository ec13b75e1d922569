//! In-memory candle store.
//!
//! Holds per-(symbol, timeframe) sequences strictly ordered by start time.
//! The pipeline only ever reads snapshots; ingestion replaces or appends
//! under the write lock.

use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::CandleStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
pub struct InMemoryCandleStore {
    series: RwLock<HashMap<(String, Timeframe), Vec<Candle>>>,
}

impl InMemoryCandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append candles, keeping the sequence ordered and de-duplicated by
    /// start time (later writes win).
    pub async fn ingest(&self, candles: Vec<Candle>) {
        let mut series = self.series.write().await;
        for candle in candles {
            let key = (candle.symbol.clone(), candle.timeframe);
            let sequence = series.entry(key).or_default();
            match sequence.binary_search_by_key(&candle.start_time, |c| c.start_time) {
                Ok(pos) => sequence[pos] = candle,
                Err(pos) => sequence.insert(pos, candle),
            }
        }
    }

    pub async fn len(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.series
            .read()
            .await
            .get(&(symbol.to_string(), timeframe))
            .map(|s| s.len())
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, symbol: &str, timeframe: Timeframe) -> bool {
        self.len(symbol, timeframe).await == 0
    }
}

#[async_trait]
impl CandleStore for InMemoryCandleStore {
    async fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let series = self.series.read().await;
        let Some(sequence) = series.get(&(symbol.to_string(), timeframe)) else {
            debug!("No candles stored for {} {}", symbol, timeframe);
            return Ok(Vec::new());
        };
        let start = sequence.len().saturating_sub(limit);
        Ok(sequence[start..].to_vec())
    }
}
