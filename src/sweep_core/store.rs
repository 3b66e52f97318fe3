//! Persistent pivot state per symbol and interval
//!
//! The store holds the active pivot sets for every tracked symbol/interval
//! pair plus scan metadata. It survives restarts (see `storage`), so pivots
//! detected in one run keep working in the next: reconciliation carries
//! stored pivots forward, drops the ones newer candles have broken and folds
//! in freshly detected ones.

use super::candles::Candle;
use super::fractals::{detect_pivots, sort_pivots, Pivot, PivotSide};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Active pivots for one symbol/interval pair, each side kept in canonical
/// newest-first order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotSets {
    #[serde(default)]
    pub highs: Vec<Pivot>,
    #[serde(default)]
    pub lows: Vec<Pivot>,
}

impl PivotSets {
    pub fn side(&self, side: PivotSide) -> &[Pivot] {
        match side {
            PivotSide::High => &self.highs,
            PivotSide::Low => &self.lows,
        }
    }

    pub fn side_mut(&mut self, side: PivotSide) -> &mut Vec<Pivot> {
        match side {
            PivotSide::High => &mut self.highs,
            PivotSide::Low => &mut self.lows,
        }
    }
}

/// Scan bookkeeping carried alongside the pivot sets.
///
/// Timestamps are stored as RFC 3339 strings exactly as written; readers
/// parse them lazily so a single mangled field degrades to "absent" instead
/// of poisoning the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// When the last full rebuild completed.
    #[serde(default)]
    pub last_full_scan: Option<String>,
    /// When the store was last written to disk.
    #[serde(default)]
    pub last_update_time: Option<String>,
    /// Close time (ms) of the newest confirmed candle processed so far.
    #[serde(default)]
    pub last_candle_close_time: Option<i64>,
}

impl StoreMetadata {
    /// Parsed `last_full_scan`, or `None` when absent or unparseable.
    pub fn last_full_scan_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.last_full_scan.as_deref())
    }

    /// Parsed `last_update_time`, or `None` when absent or unparseable.
    pub fn last_update_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.last_update_time.as_deref())
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// All pivot state: `symbols -> interval -> PivotSets` plus metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepStore {
    #[serde(default)]
    pub symbols: HashMap<String, HashMap<String, PivotSets>>,
    #[serde(default)]
    pub metadata: StoreMetadata,
}

impl SweepStore {
    /// Pivot sets for a pair, if the store has seen it.
    pub fn sets(&self, symbol: &str, interval: &str) -> Option<&PivotSets> {
        self.symbols.get(symbol)?.get(interval)
    }

    /// Mutable pivot sets for a pair, creating an empty entry on first touch.
    pub fn sets_mut(&mut self, symbol: &str, interval: &str) -> &mut PivotSets {
        self.symbols
            .entry(symbol.to_string())
            .or_default()
            .entry(interval.to_string())
            .or_default()
    }

    /// Mutable pivot sets only when the pair already exists.
    pub fn existing_sets_mut(&mut self, symbol: &str, interval: &str) -> Option<&mut PivotSets> {
        self.symbols.get_mut(symbol)?.get_mut(interval)
    }

    /// `(highs, lows)` counts for a pair; `(0, 0)` when the pair is unknown.
    pub fn counts(&self, symbol: &str, interval: &str) -> (usize, usize) {
        match self.sets(symbol, interval) {
            Some(sets) => (sets.highs.len(), sets.lows.len()),
            None => (0, 0),
        }
    }

    /// Fold a fresh candle batch into the stored sets for one pair.
    ///
    /// Three steps, in order:
    /// 1. detect pivots in the batch,
    /// 2. drop stored pivots broken by any batch candle that closed strictly
    ///    after them (equal prices leave the pivot standing),
    /// 3. union in the fresh pivots, deduplicating on exact `(time, value)`,
    ///    and restore canonical order.
    ///
    /// Feeding the same batch twice leaves the sets unchanged.
    pub fn reconcile(&mut self, symbol: &str, interval: &str, candles: &[Candle], window: usize) {
        let (fresh_highs, fresh_lows) = detect_pivots(candles, window);
        let sets = self.sets_mut(symbol, interval);

        sets.highs.retain(|p| {
            !candles
                .iter()
                .any(|c| c.close_time > p.time && c.high > p.value)
        });
        sets.lows.retain(|p| {
            !candles
                .iter()
                .any(|c| c.close_time > p.time && c.low < p.value)
        });

        merge_pivots(&mut sets.highs, fresh_highs, PivotSide::High);
        merge_pivots(&mut sets.lows, fresh_lows, PivotSide::Low);
    }

    /// Drop every stored symbol not in the configured list.
    /// Returns the removed symbol names.
    pub fn prune_symbols(&mut self, configured: &[String]) -> Vec<String> {
        let keep: HashSet<&str> = configured.iter().map(String::as_str).collect();
        let mut removed: Vec<String> = self
            .symbols
            .keys()
            .filter(|s| !keep.contains(s.as_str()))
            .cloned()
            .collect();
        removed.sort();
        for symbol in &removed {
            self.symbols.remove(symbol);
        }
        removed
    }

    /// Record the completion time of a full rebuild.
    pub fn stamp_full_scan(&mut self, at: DateTime<Utc>) {
        self.metadata.last_full_scan = Some(at.to_rfc3339());
    }

    /// Advance `last_candle_close_time`, never moving it backwards.
    pub fn record_candle_close(&mut self, close_time: i64) {
        let current = self.metadata.last_candle_close_time.unwrap_or(i64::MIN);
        if close_time > current {
            self.metadata.last_candle_close_time = Some(close_time);
        }
    }
}

fn merge_pivots(stored: &mut Vec<Pivot>, fresh: Vec<Pivot>, side: PivotSide) {
    for pivot in fresh {
        let dup = stored
            .iter()
            .any(|p| p.time == pivot.time && p.value == pivot.value);
        if !dup {
            stored.push(pivot);
        }
    }
    sort_pivots(stored, side);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close_time: i64, high: f64, low: f64) -> Candle {
        Candle {
            close_time,
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
        }
    }

    /// Batch whose middle candle forms a high pivot at (3, 10.0).
    fn high_pivot_batch() -> Vec<Candle> {
        vec![
            candle(1, 8.0, 1.0),
            candle(2, 9.0, 2.0),
            candle(3, 10.0, 3.0),
            candle(4, 9.0, 2.0),
            candle(5, 8.5, 1.0),
        ]
    }

    #[test]
    fn test_reconcile_creates_entry_on_first_touch() {
        let mut store = SweepStore::default();
        assert!(store.sets("BTCUSDT", "1h").is_none());
        store.reconcile("BTCUSDT", "1h", &high_pivot_batch(), 5);
        let sets = store.sets("BTCUSDT", "1h").unwrap();
        assert_eq!(sets.highs.len(), 1);
        assert_eq!(sets.highs[0].time, 3);
        assert_eq!(sets.highs[0].value, 10.0);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut store = SweepStore::default();
        let batch = high_pivot_batch();
        store.reconcile("BTCUSDT", "1h", &batch, 5);
        let before = store.sets("BTCUSDT", "1h").unwrap().clone();
        store.reconcile("BTCUSDT", "1h", &batch, 5);
        assert_eq!(store.sets("BTCUSDT", "1h").unwrap(), &before);
    }

    #[test]
    fn test_reconcile_drops_broken_stored_pivot() {
        let mut store = SweepStore::default();
        store.sets_mut("BTCUSDT", "1h").highs.push(Pivot {
            time: 3,
            value: 10.0,
        });
        // A later candle trades above the stored high pivot.
        let batch = vec![candle(6, 10.5, 9.0), candle(7, 10.2, 9.5)];
        store.reconcile("BTCUSDT", "1h", &batch, 5);
        assert!(store.sets("BTCUSDT", "1h").unwrap().highs.is_empty());
    }

    #[test]
    fn test_reconcile_equal_price_keeps_pivot() {
        let mut store = SweepStore::default();
        store.sets_mut("BTCUSDT", "1h").highs.push(Pivot {
            time: 3,
            value: 10.0,
        });
        let batch = vec![candle(6, 10.0, 9.0)];
        store.reconcile("BTCUSDT", "1h", &batch, 5);
        assert_eq!(store.sets("BTCUSDT", "1h").unwrap().highs.len(), 1);
    }

    #[test]
    fn test_reconcile_ignores_candles_before_pivot() {
        let mut store = SweepStore::default();
        store.sets_mut("BTCUSDT", "1h").highs.push(Pivot {
            time: 10,
            value: 10.0,
        });
        // Higher candle, but it closed before the pivot formed.
        let batch = vec![candle(8, 12.0, 9.0)];
        store.reconcile("BTCUSDT", "1h", &batch, 5);
        assert_eq!(store.sets("BTCUSDT", "1h").unwrap().highs.len(), 1);
    }

    #[test]
    fn test_reconcile_carries_forward_pivot_outside_batch() {
        // Stored pivot whose forming candles scrolled out of fetch range
        // survives as long as nothing in the new batch breaks it.
        let mut store = SweepStore::default();
        store.sets_mut("BTCUSDT", "1h").highs.push(Pivot {
            time: 3,
            value: 20.0,
        });
        let batch = vec![
            candle(100, 8.0, 1.0),
            candle(101, 9.0, 2.0),
            candle(102, 10.0, 3.0),
            candle(103, 9.0, 2.0),
            candle(104, 8.5, 1.0),
        ];
        store.reconcile("BTCUSDT", "1h", &batch, 5);
        let sets = store.sets("BTCUSDT", "1h").unwrap();
        assert_eq!(sets.highs.len(), 2);
        // Newest first: fresh pivot at 102, carried pivot at 3.
        assert_eq!(sets.highs[0].time, 102);
        assert_eq!(sets.highs[1].time, 3);
    }

    #[test]
    fn test_removed_pivot_stays_removed() {
        // Once a pivot is gone it never comes back: rerunning reconcile with
        // a batch that contains both the pivot candles and the breaking
        // candle does not resurrect it.
        let mut store = SweepStore::default();
        let mut batch = high_pivot_batch();
        store.reconcile("BTCUSDT", "1h", &batch, 5);
        batch.push(candle(6, 10.5, 1.5));
        store.reconcile("BTCUSDT", "1h", &batch, 5);
        assert!(store.sets("BTCUSDT", "1h").unwrap().highs.is_empty());
        store.reconcile("BTCUSDT", "1h", &batch, 5);
        assert!(store.sets("BTCUSDT", "1h").unwrap().highs.is_empty());
    }

    #[test]
    fn test_merge_dedups_on_exact_time_and_value() {
        let mut stored = vec![Pivot { time: 3, value: 10.0 }];
        merge_pivots(
            &mut stored,
            vec![
                Pivot { time: 3, value: 10.0 },
                Pivot { time: 3, value: 11.0 },
            ],
            PivotSide::High,
        );
        assert_eq!(stored.len(), 2);
        // Same time, more extreme value first.
        assert_eq!(stored[0].value, 11.0);
    }

    #[test]
    fn test_prune_symbols() {
        let mut store = SweepStore::default();
        store.sets_mut("BTCUSDT", "1h");
        store.sets_mut("ETHUSDT", "1h");
        store.sets_mut("DOGEUSDT", "4h");
        let removed = store.prune_symbols(&["BTCUSDT".to_string()]);
        assert_eq!(removed, vec!["DOGEUSDT".to_string(), "ETHUSDT".to_string()]);
        assert!(store.symbols.contains_key("BTCUSDT"));
        assert_eq!(store.symbols.len(), 1);
    }

    #[test]
    fn test_record_candle_close_is_monotonic() {
        let mut store = SweepStore::default();
        store.record_candle_close(1000);
        store.record_candle_close(500);
        assert_eq!(store.metadata.last_candle_close_time, Some(1000));
        store.record_candle_close(2000);
        assert_eq!(store.metadata.last_candle_close_time, Some(2000));
    }

    #[test]
    fn test_metadata_parses_lazily() {
        let mut meta = StoreMetadata::default();
        assert!(meta.last_full_scan_at().is_none());
        meta.last_full_scan = Some("not a timestamp".to_string());
        assert!(meta.last_full_scan_at().is_none());
        meta.last_full_scan = Some(Utc::now().to_rfc3339());
        assert!(meta.last_full_scan_at().is_some());
    }

    #[test]
    fn test_store_roundtrips_through_json() {
        let mut store = SweepStore::default();
        store.reconcile("BTCUSDT", "1h", &high_pivot_batch(), 5);
        store.record_candle_close(5);
        store.stamp_full_scan(Utc::now());
        let json = serde_json::to_string(&store).unwrap();
        let back: SweepStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sets("BTCUSDT", "1h"), store.sets("BTCUSDT", "1h"));
        assert_eq!(back.metadata.last_candle_close_time, Some(5));
    }
}
