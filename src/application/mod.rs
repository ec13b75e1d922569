// Market structure detection (swings, BOS, CHoCH, MSB)
pub mod structure;

// Zone detection (order blocks, FVGs, sweeps, displacement, premium/discount)
pub mod zones;

// Multi-timeframe bias, setup and entry services
pub mod bias;

// Signal pipeline and confluence scoring
pub mod signal;

// Per-account services and the distributed execution orchestrator
pub mod accounts;
