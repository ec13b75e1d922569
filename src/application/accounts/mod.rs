pub mod engine;
pub mod execution_filter;
pub mod kill_switch;
pub mod orchestrator;
pub mod registry;
pub mod risk;

pub use engine::{AccountExecutionEngine, ExecutionContext};
pub use execution_filter::{AccountExecutionFilter, ExecutionFilterConfig, FilterDecision};
pub use kill_switch::{KillSwitchContext, KillSwitchService, KillSwitchVerdict};
pub use orchestrator::ExecutionOrchestrator;
pub use registry::AccountRegistry;
pub use risk::{AccountRiskService, RiskContext, RiskVerdict};
