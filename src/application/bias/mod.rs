pub mod entry;
pub mod htf_bias;
pub mod itf_flow;
pub mod setup_zone;

pub use entry::{EntryConfig, EntryDecision, compute_entry};
pub use htf_bias::{BiasMethod, HtfBias, compute_htf_bias};
pub use itf_flow::{compute_itf_flow, trend_strength_pct, volatility_ratio_pct};
pub use setup_zone::{SetupZone, SetupZoneConfig, compute_setup_zone};
