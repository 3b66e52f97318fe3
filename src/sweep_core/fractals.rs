//! Windowed fractal pivot detection
//!
//! A fractal pivot is a candle whose high (or low) is strictly more extreme
//! than the highs (lows) of the `n` candles on each side of it, where
//! `n = (window - 1) / 2`. Detection additionally filters out any pivot that
//! a later candle in the same batch has already broken, so the returned sets
//! contain only pivots that were still unbroken at the end of the batch.

use super::candles::Candle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which price extreme a pivot marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PivotSide {
    High,
    Low,
}

impl fmt::Display for PivotSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PivotSide::High => write!(f, "High"),
            PivotSide::Low => write!(f, "Low"),
        }
    }
}

/// A swing high or swing low extracted from a candle series.
///
/// `time` is the close time (ms) of the candle that formed the pivot and
/// `value` is its high (for a high pivot) or low (for a low pivot). The pair
/// `(time, value)` identifies a pivot within one symbol/interval set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub time: i64,
    pub value: f64,
}

/// Detect active fractal pivots in an oldest-first candle batch.
///
/// Returns `(highs, lows)`, each sorted newest-first. Batches shorter than
/// the window produce no pivots. Ties against any neighbor disqualify a
/// candidate; the comparison is strict on both sides.
pub fn detect_pivots(candles: &[Candle], window: usize) -> (Vec<Pivot>, Vec<Pivot>) {
    if window < 3 || candles.len() < window {
        return (Vec::new(), Vec::new());
    }

    let n = (window - 1) / 2;
    let mut highs = Vec::new();
    let mut lows = Vec::new();

    for i in n..candles.len() - n {
        let mid = &candles[i];
        let left = &candles[i - n..i];
        let right = &candles[i + 1..i + 1 + n];

        if left.iter().chain(right).all(|c| mid.high > c.high) {
            highs.push(Pivot {
                time: mid.close_time,
                value: mid.high,
            });
        }
        if left.iter().chain(right).all(|c| mid.low < c.low) {
            lows.push(Pivot {
                time: mid.close_time,
                value: mid.low,
            });
        }
    }

    // Keep only pivots no later candle in this batch has broken
    highs.retain(|p| {
        !candles
            .iter()
            .any(|c| c.close_time > p.time && c.high > p.value)
    });
    lows.retain(|p| {
        !candles
            .iter()
            .any(|c| c.close_time > p.time && c.low < p.value)
    });

    sort_pivots(&mut highs, PivotSide::High);
    sort_pivots(&mut lows, PivotSide::Low);
    (highs, lows)
}

/// Sort a pivot set into its canonical order: newest first, and among pivots
/// sharing a close time the more extreme value first (higher for highs,
/// lower for lows).
pub fn sort_pivots(pivots: &mut [Pivot], side: PivotSide) {
    pivots.sort_by(|a, b| {
        b.time.cmp(&a.time).then_with(|| match side {
            PivotSide::High => b.value.total_cmp(&a.value),
            PivotSide::Low => a.value.total_cmp(&b.value),
        })
    });
}
