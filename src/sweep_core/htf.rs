//! Higher-timeframe pivot reconciliation
//!
//! When a base-interval breakout lands, higher-interval sets of the same
//! symbol often hold a pivot at the very same price (the same swing seen
//! through a coarser lens). Those entries are pruned here so they cannot
//! fire a second alert for a level the market has already taken out.

use super::breakouts::Breakout;
use super::store::SweepStore;
use tracing::debug;

/// Remove pivots matching a broken level from the symbol's higher-interval
/// sets.
///
/// Only the side that broke is touched and only exactly equal values are
/// removed. Intervals without an entry for the symbol are skipped.
/// Returns the intervals where at least one pivot was removed, in the
/// order given.
pub fn reconcile_htf(
    store: &mut SweepStore,
    breakout: &Breakout,
    higher_intervals: &[String],
) -> Vec<String> {
    let mut matched = Vec::new();
    for interval in higher_intervals {
        let Some(sets) = store.existing_sets_mut(&breakout.symbol, interval) else {
            continue;
        };
        let pivots = sets.side_mut(breakout.kind.side());
        let before = pivots.len();
        pivots.retain(|p| p.value != breakout.value);
        let removed = before - pivots.len();
        if removed > 0 {
            debug!(
                "{}-{}: removed {} {} pivot(s) at {} after base breakout",
                breakout.symbol,
                interval,
                removed,
                breakout.kind.side(),
                breakout.value
            );
            matched.push(interval.clone());
        }
    }
    matched
}
