// In crates/risk/src/lib.rs

//! Pure risk evaluation: rule resolution, equity recomputation, drawdown
//! floors and behavioral checks. Nothing in this crate performs I/O.

pub mod behavior;
pub mod drawdown;
pub mod equity;
pub mod error;
pub mod rules;
pub mod types;

// Re-export public types
pub use behavior::{BehaviorCheck, BehaviorDetector, TradeContext};
pub use error::{Error, Result};
pub use rules::{RuleTable, normalize_group, resolve};
pub use types::{
    BehaviorParams, DrawdownLevels, DrawdownOutcome, EquitySnapshot, Finding, ProfitProgress,
    RuleDefaults,
};
