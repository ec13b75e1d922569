//! The signal pipeline: a linear sequence of gates from candles to a
//! `Signal` or a structured rejection.
//!
//! Everything after the candle fetch is pure CPU over the fetched windows,
//! so identical candles plus an identical `PipelineConfig` reproduce the
//! same signal byte for byte. The pipeline holds no state between calls.

use crate::application::bias::entry::compute_entry;
use crate::application::bias::htf_bias::compute_htf_bias;
use crate::application::bias::itf_flow::{
    compute_itf_flow, trend_strength_pct, volatility_ratio_pct,
};
use crate::application::bias::setup_zone::{SetupZone, compute_setup_zone};
use crate::application::signal::confluence::{ConfluenceInput, score_confluence};
use crate::application::signal::setup_gate::{SetupGateReport, evaluate_setup_gate};
use crate::application::structure::analyze_structure;
use crate::application::zones::adr::adr_snapshot;
use crate::application::zones::displacement::{average_true_range, check_displacement};
use crate::application::zones::liquidity::detect_sweeps;
use crate::application::zones::order_blocks::detect_order_blocks;
use crate::application::zones::premium_discount::{pd_score, premium_discount};
use crate::config::PipelineConfig;
use crate::domain::market::session::active_sessions;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::zones::PdZone;
use crate::domain::ports::CandleStore;
use crate::domain::trading::symbol_spec::spec_for;
use crate::domain::trading::types::{Direction, Signal, SignalOutcome};
use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::debug;

/// Candles requested per timeframe; minimums from the config still gate
const HTF_FETCH: usize = 200;
const ITF_FETCH: usize = 300;
const LTF_FETCH: usize = 200;

pub struct SignalPipeline {
    store: Arc<dyn CandleStore>,
    config: PipelineConfig,
}

impl SignalPipeline {
    pub fn new(store: Arc<dyn CandleStore>, config: PipelineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run all gates for one symbol. Only candle fetching can fail with an
    /// error; every strategic outcome is a value.
    pub async fn generate(&self, symbol: &str) -> Result<SignalOutcome> {
        let config = &self.config;
        let mut trail: Vec<String> = Vec::new();

        // Gate 1: candle minimums
        let h4 = self
            .store
            .candles(symbol, Timeframe::H4, HTF_FETCH.max(config.min_htf_candles))
            .await?;
        let m15 = self
            .store
            .candles(symbol, Timeframe::M15, ITF_FETCH.max(config.min_itf_candles))
            .await?;
        let m1 = self
            .store
            .candles(symbol, Timeframe::M1, LTF_FETCH.max(config.min_ltf_candles))
            .await?;

        if h4.len() < config.min_htf_candles {
            return Ok(reject(
                format!(
                    "Not enough H4 candles: {} < {}",
                    h4.len(),
                    config.min_htf_candles
                ),
                trail,
            ));
        }
        if m15.len() < config.min_itf_candles {
            return Ok(reject(
                format!(
                    "Not enough M15 candles: {} < {}",
                    m15.len(),
                    config.min_itf_candles
                ),
                trail,
            ));
        }
        if m1.len() < config.min_ltf_candles {
            return Ok(reject(
                format!(
                    "Not enough M1 candles: {} < {}",
                    m1.len(),
                    config.min_ltf_candles
                ),
                trail,
            ));
        }

        let spec = spec_for(symbol);
        let current_price = m1[m1.len() - 1].close;
        let now_ms = m1[m1.len() - 1].end_time;

        // Gate 2: HTF bias
        let bias = compute_htf_bias(&h4, &config.structure);
        trail.push(format!(
            "HTF bias {} (method {:?}, formal {})",
            bias.trend, bias.method, bias.formal_trend
        ));
        let Some(direction) = Direction::from_trend(bias.trend) else {
            return Ok(reject("HTF bias is neutral", trail));
        };

        // Gate 3: the formal trend must not be sideways, no matter how the
        // bias was recovered
        if config.ict_strict && !bias.formal_trend.is_directional() {
            return Ok(reject("HTF is sideways", trail));
        }

        // Gate 4: 15m quality
        let strength = trend_strength_pct(&m15, 20);
        if strength < config.min_trend_strength_pct {
            return Ok(reject(
                format!(
                    "15m trend strength too low: {:.0}% < {:.0}%",
                    strength, config.min_trend_strength_pct
                ),
                trail,
            ));
        }
        let volatility = volatility_ratio_pct(&m15, 5, 20);
        if volatility < config.min_volatility_ratio_pct {
            return Ok(reject(
                format!(
                    "15m volatility ratio too low: {:.0}% < {:.0}%",
                    volatility, config.min_volatility_ratio_pct
                ),
                trail,
            ));
        }
        trail.push(format!(
            "15m strength {:.0}%, volatility {:.0}%",
            strength, volatility
        ));

        // Gate 5: ITF flow
        let m15_analysis = analyze_structure(&m15, &config.structure);
        if m15_analysis.bos_events.len() < config.min_itf_bos_count {
            return Ok(reject(
                format!(
                    "Not enough M15 BOS events: {} < {}",
                    m15_analysis.bos_events.len(),
                    config.min_itf_bos_count
                ),
                trail,
            ));
        }
        let flow = compute_itf_flow(&m15, &config.structure);
        let itf_aligned = flow == bias.trend;
        if !config.skip_itf_alignment && !itf_aligned {
            return Ok(reject(
                format!("ITF flow not aligned with HTF bias: {} vs {}", flow, bias.trend),
                trail,
            ));
        }

        // Gate 6: M15 setup zone
        let zone = if config.force_minimal_entry {
            let half = average_true_range(&m15, 14).unwrap_or(current_price * dec!(0.001));
            trail.push("Minimal-entry debug mode: synthetic zone".to_string());
            SetupZone::synthetic_around(direction, current_price, half)
        } else {
            match compute_setup_zone(&m15, direction, &spec, &config.setup_zone, &config.structure)
            {
                Ok(zone) => zone,
                Err(reason) => return Ok(reject(reason, trail)),
            }
        };
        trail.push(format!("M15 zone [{} - {}]", zone.low, zone.high));

        // Gate 7: M1 execution
        let entry = match compute_entry(
            &m1,
            &m15,
            &zone,
            direction,
            &spec,
            &config.entry,
            &config.structure,
        ) {
            Ok(decision) => decision,
            Err(reason) => return Ok(reject(reason, trail)),
        };

        // Premium/discount context feeds both the hard gate and the score
        let pd_window = config.pd.window_for(&spec);
        let pd_ctx = premium_discount(&m15, pd_window, current_price);
        let pd_zone = pd_ctx.as_ref().map(|c| c.zone).unwrap_or(PdZone::Neutral);

        // Gate 8: hard setup gate, strict branch only
        let gate_report: Option<SetupGateReport> = if config.ict_strict {
            match evaluate_setup_gate(
                &m15,
                &zone,
                direction,
                pd_zone,
                &config.setup_gate,
                &config.structure,
            ) {
                Ok(report) => Some(report),
                Err(reason) => return Ok(reject(reason, trail)),
            }
        } else {
            None
        };

        // Displacement evidence; hard mode outside the strict branch rejects
        let displacement = check_displacement(&m15, direction, &config.displacement);
        if !config.ict_strict && config.displacement.hard && !displacement.is_valid {
            return Ok(reject(
                format!("Displacement check failed: {}", displacement.reasons.join("; ")),
                trail,
            ));
        }

        // Gate 9: session allow-list, resolved at the last candle close
        let sessions = active_sessions(now_ms);
        let allowed = config.allowed_sessions(spec.volatile);
        let session_valid = sessions.iter().any(|s| allowed.contains(s));
        if !session_valid {
            let active = sessions
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(",");
            return Ok(reject(
                format!("Session not in allow-list (active: [{}])", active),
                trail,
            ));
        }

        // Gate 10: confluence and assembly
        let sweep = match &gate_report {
            Some(report) => Some(report.sweep.clone()),
            None => {
                let sweeps =
                    detect_sweeps(&m15, &m15_analysis.swings, Timeframe::M15, &config.sweep);
                let floor = m15.len().saturating_sub(config.setup_gate.sweep_recency);
                sweeps
                    .iter()
                    .rev()
                    .find(|s| s.direction == direction.structure() && s.candle_index >= floor)
                    .cloned()
            }
        };

        let htf_blocks = detect_order_blocks(&h4, Timeframe::H4, &config.setup_zone.order_blocks);
        let htf_ob = htf_blocks
            .iter()
            .find(|b| b.direction == direction.structure() && !b.mitigated);

        let adr = adr_snapshot(&h4, config.adr_days);
        let pd_base = match direction {
            Direction::Buy => pd_zone == PdZone::Discount,
            Direction::Sell => pd_zone == PdZone::Premium,
        };
        let pd_contribution = pd_ctx
            .as_ref()
            .map(|ctx| pd_score(ctx, current_price, direction))
            .unwrap_or(0.0);

        let fvg_resolved = zone
            .fvg
            .as_ref()
            .is_some_and(|f| current_price >= f.low && current_price <= f.high);
        let vi_aligned = zone
            .order_block
            .as_ref()
            .map(|o| o.volume_imbalance)
            .or_else(|| entry.refined_ob.as_ref().map(|o| o.volume_imbalance))
            .unwrap_or(false);

        let input = ConfluenceInput {
            htf_trend: true,
            pd_base,
            adr_base: adr.as_ref().is_some_and(|a| a.base_credit),
            itf_aligned,
            ltf_bos: entry.ltf_bos,
            htf_ob: htf_ob.is_some(),
            itf_ob: zone.order_block.is_some(),
            ltf_ob: entry.refined_ob.is_some(),
            sweep: sweep.is_some(),
            fvg_resolved,
            vi_aligned,
            smt: false,
            entry_refined: entry.entry_refined,
            trendline: false,
            session_valid,
            pd_score: pd_contribution,
            adr_score: adr.as_ref().map(|a| a.score).unwrap_or(0.0),
            displacement_score: displacement.score,
        };
        let confluence = score_confluence(&input);

        let mut reasons: Vec<String> = Vec::new();
        reasons.push(format!("HTF bias: {}", bias.trend));
        if itf_aligned {
            reasons.push(format!("ITF flow aligned: {}", flow));
        }
        reasons.push(format!("M15 setup zone [{} - {}]", zone.low, zone.high));
        if !zone.synthetic {
            reasons.push("M15 CHoCH confirmed".to_string());
        }
        reasons.extend(entry.reasons.iter().cloned());
        if let Some(s) = &sweep {
            reasons.push(format!("Liquidity sweep confirmed at {}", s.level));
        }
        reasons.extend(displacement.reasons.iter().cloned());
        if pd_base {
            reasons.push(format!("Premium/Discount: {}", pd_zone));
        }
        if let Some(a) = &adr {
            reasons.push(format!("ADR consumed {:.0}%", a.consumed_pct));
        }
        if htf_ob.is_some() {
            reasons.push("HTF order block aligned".to_string());
        }
        if zone.order_block.is_some() {
            reasons.push("M15 order block backing zone".to_string());
        }
        if vi_aligned {
            reasons.push("Volume imbalance aligned".to_string());
        }
        reasons.push(format!(
            "Session valid: {}",
            sessions
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(",")
        ));

        // Defensive level validation; a violation here is a bug upstream,
        // surfaced as a rejection rather than a broken order
        let valid_levels = match direction {
            Direction::Buy => entry.stop_loss < entry.entry && entry.entry < entry.take_profit,
            Direction::Sell => entry.take_profit < entry.entry && entry.entry < entry.stop_loss,
        };
        if !valid_levels {
            return Ok(reject("Invalid signal levels computed", trail));
        }
        let risk = (entry.entry - entry.stop_loss).abs();
        let reward = (entry.take_profit - entry.entry).abs();
        let floor = Decimal::from_f64_retain(0.6 * config.entry.configured_rr)
            .unwrap_or(dec!(1.8));
        if reward < risk * floor {
            return Ok(reject("Reward below minimum RR bound", trail));
        }

        let mut ob_levels: Vec<(Decimal, Decimal)> = Vec::new();
        if let Some(ob) = &zone.order_block {
            ob_levels.push((ob.low, ob.high));
        }
        if let Some(ob) = &entry.refined_ob {
            ob_levels.push((ob.low, ob.high));
        }
        if let Some(ob) = htf_ob {
            ob_levels.push((ob.low, ob.high));
        }
        let mut fvg_levels: Vec<(Decimal, Decimal)> = Vec::new();
        if let Some(f) = &zone.fvg {
            fvg_levels.push((f.low, f.high));
        }

        if config.debug {
            debug!("Gate trail for {}: {:?}", symbol, trail);
        }
        let meta = serde_json::json!({
            "strategy": "smc-ict",
            "mode": if config.ict_strict { "strict" } else { "relaxed" },
            "bias_method": format!("{:?}", bias.method),
            "zone": {
                "low": zone.low.to_string(),
                "high": zone.high.to_string(),
                "synthetic": zone.synthetic,
            },
            "scores": {
                "pd": pd_contribution,
                "adr": input.adr_score,
                "displacement": displacement.score,
            },
            "trail": trail,
        });
        debug!(
            "Signal for {}: {} {} @ {} (score {:.0})",
            symbol, direction, entry.entry_type, entry.entry, confluence.score
        );

        Ok(SignalOutcome::Signal(Box::new(Signal {
            symbol: symbol.to_string(),
            direction,
            entry: entry.entry,
            stop_loss: entry.stop_loss,
            take_profit: entry.take_profit,
            entry_type: entry.entry_type,
            htf_trend: bias.trend,
            itf_flow: flow,
            ltf_bos: entry.ltf_bos,
            premium_discount: pd_zone,
            ob_levels,
            fvg_levels,
            smt: false,
            volume_imbalance: vi_aligned,
            session: sessions,
            confluence_reasons: reasons,
            confluence_score: confluence.score,
            timestamp: now_ms,
            meta,
        })))
    }
}

fn reject(reason: impl Into<String>, trail: Vec<String>) -> SignalOutcome {
    let reason = reason.into();
    debug!("Signal rejected: {}", reason);
    SignalOutcome::rejected(reason, trail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::candle::Candle;
    use crate::domain::market::timeframe::Timeframe;
    use anyhow::Result;
    use async_trait::async_trait;
    use rust_decimal::prelude::FromPrimitive;
    use std::collections::HashMap;

    struct MockCandleStore {
        series: HashMap<(String, Timeframe), Vec<Candle>>,
    }

    #[async_trait]
    impl CandleStore for MockCandleStore {
        async fn candles(
            &self,
            symbol: &str,
            timeframe: Timeframe,
            limit: usize,
        ) -> Result<Vec<Candle>> {
            let series = self
                .series
                .get(&(symbol.to_string(), timeframe))
                .cloned()
                .unwrap_or_default();
            let start = series.len().saturating_sub(limit);
            Ok(series[start..].to_vec())
        }
    }

    fn candle(timeframe: Timeframe, i: usize, open: f64, high: f64, low: f64, close: f64) -> Candle {
        let period = timeframe.to_millis();
        Candle {
            symbol: "XAUUSD".to_string(),
            timeframe,
            start_time: i as i64 * period,
            end_time: (i as i64 + 1) * period,
            open: Decimal::from_f64(open).unwrap(),
            high: Decimal::from_f64(high).unwrap(),
            low: Decimal::from_f64(low).unwrap(),
            close: Decimal::from_f64(close).unwrap(),
            volume: Decimal::from(1000),
        }
    }

    fn store_with(
        h4: Vec<Candle>,
        m15: Vec<Candle>,
        m1: Vec<Candle>,
    ) -> Arc<MockCandleStore> {
        let mut series = HashMap::new();
        series.insert(("XAUUSD".to_string(), Timeframe::H4), h4);
        series.insert(("XAUUSD".to_string(), Timeframe::M15), m15);
        series.insert(("XAUUSD".to_string(), Timeframe::M1), m1);
        Arc::new(MockCandleStore { series })
    }

    #[tokio::test]
    async fn test_insufficient_candles_rejects_first() {
        let store = store_with(Vec::new(), Vec::new(), Vec::new());
        let pipeline = SignalPipeline::new(store, PipelineConfig::default());
        let outcome = pipeline.generate("XAUUSD").await.unwrap();
        let rejection = outcome.rejection().unwrap();
        assert!(rejection.reason.contains("Not enough H4 candles"));
    }

    #[tokio::test]
    async fn test_sideways_htf_rejects() {
        // Oscillating H4 in a tight band: no BOS anywhere
        let h4: Vec<Candle> = (0..30)
            .map(|i| {
                let wiggle = if i % 2 == 0 { 0.5 } else { -0.5 };
                candle(
                    Timeframe::H4,
                    i,
                    4100.0,
                    4101.0 + wiggle,
                    4099.0 - wiggle,
                    4100.0 + wiggle,
                )
            })
            .collect();
        let m15: Vec<Candle> = (0..60)
            .map(|i| candle(Timeframe::M15, i, 4100.0, 4101.0, 4099.0, 4100.2))
            .collect();
        let m1: Vec<Candle> = (0..60)
            .map(|i| candle(Timeframe::M1, i, 4100.0, 4100.5, 4099.5, 4100.1))
            .collect();

        let pipeline = SignalPipeline::new(store_with(h4, m15, m1), PipelineConfig::default());
        let outcome = pipeline.generate("XAUUSD").await.unwrap();
        let rejection = outcome.rejection().unwrap();
        assert!(
            rejection.reason.contains("HTF bias is neutral")
                || rejection.reason.contains("HTF is sideways"),
            "unexpected reason: {}",
            rejection.reason
        );
    }

    #[tokio::test]
    async fn test_determinism_of_rejections() {
        let h4: Vec<Candle> = (0..30)
            .map(|i| candle(Timeframe::H4, i, 4100.0, 4101.0, 4099.0, 4100.2))
            .collect();
        let m15: Vec<Candle> = (0..60)
            .map(|i| candle(Timeframe::M15, i, 4100.0, 4101.0, 4099.0, 4100.2))
            .collect();
        let m1: Vec<Candle> = (0..60)
            .map(|i| candle(Timeframe::M1, i, 4100.0, 4100.5, 4099.5, 4100.1))
            .collect();
        let pipeline = SignalPipeline::new(
            store_with(h4, m15, m1),
            PipelineConfig::default(),
        );
        let a = pipeline.generate("XAUUSD").await.unwrap();
        let b = pipeline.generate("XAUUSD").await.unwrap();
        assert_eq!(a, b);
    }
}
