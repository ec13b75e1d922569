use crate::application::bias::entry::EntryConfig;
use crate::application::bias::setup_zone::SetupZoneConfig;
use crate::application::signal::setup_gate::SetupGateConfig;
use crate::application::structure::StructureConfig;
use crate::application::zones::displacement::DisplacementConfig;
use crate::application::zones::liquidity::SweepConfig;
use crate::application::zones::premium_discount::PdConfig;
use crate::domain::market::session::TradingSession;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use super::{env_flag, env_list, env_parse};

/// Full configuration of the signal pipeline. One record, threaded through
/// the pipeline; identical configs plus identical candles produce identical
/// signals.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub min_htf_candles: usize,
    pub min_itf_candles: usize,
    pub min_ltf_candles: usize,
    /// Skip the ITF/HTF alignment gate
    pub skip_itf_alignment: bool,
    /// Debug: synthesise a zone around price instead of requiring a setup
    pub force_minimal_entry: bool,
    /// Demand an M1 BOS on top of the CHoCH
    pub require_ltf_bos: bool,
    /// Minimum BOS events on M15 before a setup is considered
    pub min_itf_bos_count: usize,
    /// Session allow-list for standard symbols
    pub low_allowed_sessions: Vec<TradingSession>,
    /// Session allow-list for volatile symbols (XAUUSD, US30)
    pub high_allowed_sessions: Vec<TradingSession>,
    /// Strict ICT branch: hard setup gate, hard displacement
    pub ict_strict: bool,
    pub debug: bool,
    pub min_trend_strength_pct: f64,
    pub min_volatility_ratio_pct: f64,
    /// Days averaged for the ADR baseline
    pub adr_days: usize,
    pub structure: StructureConfig,
    pub displacement: DisplacementConfig,
    pub setup_zone: SetupZoneConfig,
    pub entry: EntryConfig,
    pub setup_gate: SetupGateConfig,
    pub pd: PdConfig,
    pub sweep: SweepConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_htf_candles: 15,
            min_itf_candles: 20,
            min_ltf_candles: 20,
            skip_itf_alignment: false,
            force_minimal_entry: false,
            require_ltf_bos: false,
            min_itf_bos_count: 0,
            low_allowed_sessions: vec![TradingSession::London, TradingSession::NewYork],
            high_allowed_sessions: vec![TradingSession::London, TradingSession::NewYork],
            ict_strict: true,
            debug: false,
            min_trend_strength_pct: 35.0,
            min_volatility_ratio_pct: 25.0,
            adr_days: 5,
            structure: StructureConfig::default(),
            displacement: DisplacementConfig::default(),
            setup_zone: SetupZoneConfig::default(),
            entry: EntryConfig::default(),
            setup_gate: SetupGateConfig::default(),
            pd: PdConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Bind the pipeline configuration from the environment. Unset or
    /// malformed variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self {
            min_htf_candles: env_parse("SMC_MIN_HTF_CANDLES", 15usize),
            min_itf_candles: env_parse("SMC_MIN_ITF_CANDLES", 20usize),
            skip_itf_alignment: env_flag("SMC_SKIP_ITF_ALIGNMENT", false),
            force_minimal_entry: env_flag("SMC_DEBUG_FORCE_MINIMAL_ENTRY", false),
            require_ltf_bos: env_flag("SMC_REQUIRE_LTF_BOS", false),
            min_itf_bos_count: env_parse("SMC_MIN_ITF_BOS_COUNT", 0usize),
            ict_strict: env_flag("USE_ICT_MODEL", true),
            debug: env_flag("SMC_DEBUG", false),
            ..Self::default()
        };

        if let Some(sessions) = env_list::<TradingSession>("SMC_LOW_ALLOWED_SESSIONS") {
            config.low_allowed_sessions = sessions;
        }
        if let Some(sessions) = env_list::<TradingSession>("SMC_HIGH_ALLOWED_SESSIONS") {
            config.high_allowed_sessions = sessions;
        }

        config.entry.configured_rr = env_parse("TP_R_MULT", 3.0f64);
        config.entry.require_ltf_bos = config.require_ltf_bos;
        if let Ok(raw) = std::env::var("SL_POI_BUFFER")
            && let Ok(buffer) = raw.trim().parse::<f64>()
            && let Some(buffer) = Decimal::from_f64(buffer)
        {
            config.entry.sl_buffer_override = Some(buffer);
        }

        // The relaxed pipeline lets a BOS substitute the setup CHoCH and
        // scores displacement softly instead of rejecting on it
        config.setup_zone.relaxed = !config.ict_strict;
        config.displacement.hard = config.ict_strict;

        config
    }

    pub fn allowed_sessions(&self, volatile: bool) -> &[TradingSession] {
        if volatile {
            &self.high_allowed_sessions
        } else {
            &self.low_allowed_sessions
        }
    }
}
