//! Scan planning
//!
//! Each cycle starts by deciding how much history to rebuild before any
//! breakout evaluation runs, based on store metadata, the config file's
//! modification time and the wall clock. The rules run in a fixed order;
//! the first one that matches wins.

use super::store::StoreMetadata;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Extra candles fetched beyond the computed downtime gap so the recovery
/// window always overlaps the last processed candle.
const RECOVERY_MARGIN: i64 = 5;

/// How much work the upcoming cycle has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPlan {
    /// Discard the stored sets and rebuild from full history.
    FullScan,
    /// Refetch enough candles to cover the downtime gap.
    RecoveryScan { downtime_secs: i64 },
    /// Only the most recent candles are needed.
    LiveUpdate,
    /// No new candle can have closed since the last cycle.
    Skip,
}

impl fmt::Display for ScanPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPlan::FullScan => write!(f, "full scan"),
            ScanPlan::RecoveryScan { downtime_secs } => {
                write!(f, "recovery scan ({downtime_secs}s downtime)")
            }
            ScanPlan::LiveUpdate => write!(f, "live update"),
            ScanPlan::Skip => write!(f, "skip"),
        }
    }
}

/// Planner knobs derived from the runtime config.
#[derive(Debug, Clone, Copy)]
pub struct ScanParams {
    /// Seconds per base-interval candle.
    pub base_interval_secs: i64,
    /// Candles fetched per pair on a full rebuild.
    pub history_limit: usize,
    /// A store older than this many hours is rebuilt outright.
    pub staleness_hours: i64,
}

/// Decide the scan plan for the upcoming cycle.
///
/// Rules, first match wins:
/// 1. no parseable `last_full_scan` -> full scan
/// 2. config file modified after the last full scan -> full scan
/// 3. last full scan older than the staleness window -> full scan
/// 4. downtime unknown or larger than the stored history span -> full scan
/// 5. downtime longer than one base candle -> recovery scan
/// 6. otherwise live update, or skip when no candle can have closed yet
pub fn plan_scan(
    meta: &StoreMetadata,
    now: DateTime<Utc>,
    config_modified: Option<DateTime<Utc>>,
    params: &ScanParams,
) -> ScanPlan {
    let Some(last_full_scan) = meta.last_full_scan_at() else {
        return ScanPlan::FullScan;
    };

    if let Some(modified) = config_modified {
        if modified > last_full_scan {
            return ScanPlan::FullScan;
        }
    }

    if now - last_full_scan > Duration::hours(params.staleness_hours) {
        return ScanPlan::FullScan;
    }

    let Some(last_close) = meta.last_candle_close_time else {
        return ScanPlan::FullScan;
    };
    let downtime_secs = (now.timestamp_millis() - last_close) / 1_000;

    let history_span_secs = params.base_interval_secs * params.history_limit as i64;
    if downtime_secs > history_span_secs {
        return ScanPlan::FullScan;
    }
    if downtime_secs > params.base_interval_secs {
        return ScanPlan::RecoveryScan { downtime_secs };
    }
    if downtime_secs <= 0 {
        return ScanPlan::Skip;
    }
    ScanPlan::LiveUpdate
}

/// Candles to fetch for one pair when recovering from downtime: enough to
/// span the gap plus a small margin, capped at the full-scan depth.
pub fn recovery_fetch_limit(downtime_secs: i64, interval_secs: i64, history_limit: usize) -> usize {
    let needed = downtime_secs / interval_secs.max(1) + RECOVERY_MARGIN;
    (needed.max(0) as usize).min(history_limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn params() -> ScanParams {
        ScanParams {
            base_interval_secs: 3_600,
            history_limit: 500,
            staleness_hours: 24,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    /// Metadata with a full scan `scan_age_secs` ago and the last candle
    /// closing `downtime_secs` ago.
    fn meta(scan_age_secs: i64, downtime_secs: i64) -> StoreMetadata {
        StoreMetadata {
            last_full_scan: Some((now() - Duration::seconds(scan_age_secs)).to_rfc3339()),
            last_update_time: None,
            last_candle_close_time: Some(now().timestamp_millis() - downtime_secs * 1_000),
        }
    }

    #[test]
    fn test_missing_last_full_scan_forces_full() {
        let empty = StoreMetadata::default();
        assert_eq!(plan_scan(&empty, now(), None, &params()), ScanPlan::FullScan);
    }

    #[test]
    fn test_unparseable_last_full_scan_forces_full() {
        let mut meta = meta(60, 60);
        meta.last_full_scan = Some("yesterday-ish".to_string());
        assert_eq!(plan_scan(&meta, now(), None, &params()), ScanPlan::FullScan);
    }

    #[test]
    fn test_config_edit_after_scan_forces_full() {
        let meta = meta(3_600, 60);
        let edited = now() - Duration::seconds(60);
        assert_eq!(
            plan_scan(&meta, now(), Some(edited), &params()),
            ScanPlan::FullScan
        );
    }

    #[test]
    fn test_config_edit_before_scan_is_ignored() {
        let meta = meta(3_600, 60);
        let edited = now() - Duration::hours(2);
        assert_eq!(
            plan_scan(&meta, now(), Some(edited), &params()),
            ScanPlan::LiveUpdate
        );
    }

    #[test]
    fn test_stale_store_forces_full_even_when_downtime_small() {
        let meta = meta(25 * 3_600, 60);
        assert_eq!(plan_scan(&meta, now(), None, &params()), ScanPlan::FullScan);
    }

    #[test]
    fn test_unknown_downtime_forces_full() {
        let mut meta = meta(3_600, 60);
        meta.last_candle_close_time = None;
        assert_eq!(plan_scan(&meta, now(), None, &params()), ScanPlan::FullScan);
    }

    #[test]
    fn test_downtime_beyond_history_forces_full() {
        // 500 hourly candles of history, gone for 501 hours worth. The
        // staleness rule is silenced by pretending the scan just happened.
        let mut meta = meta(60, 501 * 3_600);
        meta.last_full_scan = Some(now().to_rfc3339());
        assert_eq!(plan_scan(&meta, now(), None, &params()), ScanPlan::FullScan);
    }

    #[test]
    fn test_moderate_downtime_gets_recovery() {
        let meta = meta(3_600 * 8, 3 * 3_600);
        assert_eq!(
            plan_scan(&meta, now(), None, &params()),
            ScanPlan::RecoveryScan {
                downtime_secs: 3 * 3_600
            }
        );
    }

    #[test]
    fn test_small_downtime_gets_live_update() {
        let meta = meta(3_600, 1_800);
        assert_eq!(plan_scan(&meta, now(), None, &params()), ScanPlan::LiveUpdate);
    }

    #[test]
    fn test_zero_downtime_skips() {
        let meta = meta(3_600, 0);
        assert_eq!(plan_scan(&meta, now(), None, &params()), ScanPlan::Skip);
        let future = meta_with_future_close();
        assert_eq!(plan_scan(&future, now(), None, &params()), ScanPlan::Skip);
    }

    fn meta_with_future_close() -> StoreMetadata {
        StoreMetadata {
            last_full_scan: Some(now().to_rfc3339()),
            last_update_time: None,
            last_candle_close_time: Some(now().timestamp_millis() + 30_000),
        }
    }

    #[test]
    fn test_recovery_fetch_limit() {
        // 3h gap on 1h candles: 3 + margin.
        assert_eq!(recovery_fetch_limit(3 * 3_600, 3_600, 500), 8);
        // Gap rounds down before the margin is added.
        assert_eq!(recovery_fetch_limit(3 * 3_600 + 1_799, 3_600, 500), 8);
        // Capped at the full-scan depth.
        assert_eq!(recovery_fetch_limit(1_000 * 3_600, 3_600, 500), 500);
    }
}
