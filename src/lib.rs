// Library crate - exports shared types and scanning logic

pub mod bingx;
pub mod config;
pub mod cycle;
pub mod storage;
pub mod sweep_core;
pub mod telegram;

// Re-export commonly used types
pub use config::SweepConfig;
pub use cycle::{run_cycle, CandleFetcher};
pub use sweep_core::{Breakout, BreakoutKind, Candle, Pivot, PivotSide, ScanPlan, SweepStore};
