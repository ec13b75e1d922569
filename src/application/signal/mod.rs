pub mod confluence;
pub mod pipeline;
pub mod setup_gate;

pub use confluence::{Confluence, ConfluenceInput, score_confluence};
pub use pipeline::SignalPipeline;
pub use setup_gate::{SetupGateConfig, SetupGateReport, evaluate_setup_gate};
