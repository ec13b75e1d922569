pub mod bos;
pub mod market_structure;
pub mod swings;

pub use bos::{BosConfig, detect_bos};
pub use market_structure::{StructureAnalysis, StructureConfig, analyze_structure};
pub use swings::{SwingConfig, SwingMode, detect_swings, is_structural_pivot};
