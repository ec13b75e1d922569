pub mod adr;
pub mod displacement;
pub mod fvg;
pub mod liquidity;
pub mod order_blocks;
pub mod premium_discount;

pub use adr::{AdrSnapshot, adr_snapshot};
pub use displacement::{DisplacementConfig, average_true_range, check_displacement, true_range};
pub use fvg::{FvgConfig, detect_fvgs};
pub use liquidity::{SweepConfig, detect_sweeps};
pub use order_blocks::{OrderBlockConfig, detect_order_blocks};
pub use premium_discount::{PdConfig, pd_score, premium_discount};
