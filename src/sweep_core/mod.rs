//! Sweep Core - Pivot detection and breakout logic shared by the scanner
//!
//! This module contains the core scanning components:
//! - Candle normalization and interval arithmetic
//! - Windowed fractal pivot detection
//! - Pivot store with incremental reconciliation
//! - Scan planning (full / recovery / live / skip)
//! - Breakout classification and alert formatting
//! - Higher-timeframe pivot reconciliation

pub mod breakouts;
pub mod candles;
pub mod fractals;
pub mod htf;
pub mod scan;
pub mod store;

// Re-export commonly used types
pub use breakouts::{evaluate_breakout, format_breakout_message, Breakout, BreakoutKind};
pub use candles::{interval_millis, interval_seconds, normalize_candles, Candle};
pub use fractals::{detect_pivots, sort_pivots, Pivot, PivotSide};
pub use htf::reconcile_htf;
pub use scan::{plan_scan, recovery_fetch_limit, ScanParams, ScanPlan};
pub use store::{PivotSets, StoreMetadata, SweepStore};
