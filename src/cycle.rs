//! Cycle orchestration
//!
//! One cycle: prune departed symbols, pick a scan plan, bring the pivot
//! store up to date and test the newest confirmed candle of every symbol
//! for breakouts. A failure on one symbol/interval is logged and skipped;
//! the rest of the cycle carries on.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::bingx::BingxClient;
use crate::config::SweepConfig;
use crate::storage::save_store;
use crate::sweep_core::{
    evaluate_breakout, format_breakout_message, interval_seconds, plan_scan, recovery_fetch_limit,
    reconcile_htf, Breakout, Candle, ScanParams, ScanPlan, SweepStore,
};
use crate::telegram::TelegramNotifier;

/// Caching fetch layer: one BingX request per (symbol, interval, limit)
/// within a cycle, however many consumers ask for it.
pub struct CandleFetcher {
    client: BingxClient,
    cache: HashMap<(String, String, usize), Vec<Candle>>,
}

impl CandleFetcher {
    pub fn new(client: BingxClient) -> Self {
        Self {
            client,
            cache: HashMap::new(),
        }
    }

    pub async fn candles(
        &mut self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let key = (symbol.to_string(), interval.to_string(), limit);
        if let Some(cached) = self.cache.get(&key) {
            debug!(
                "{}-{}: cache hit ({} candles)",
                symbol,
                interval,
                cached.len()
            );
            return Ok(cached.clone());
        }
        let candles = self.client.candles(symbol, interval, limit).await?;
        self.cache.insert(key, candles.clone());
        Ok(candles)
    }

    pub async fn last_confirmed(&self, symbol: &str, interval: &str) -> Result<Candle> {
        self.client.last_confirmed(symbol, interval).await
    }

    /// Drop everything cached; called between cycles.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

/// Run one scan cycle against the given store.
pub async fn run_cycle(
    config: &SweepConfig,
    config_modified: Option<DateTime<Utc>>,
    fetcher: &mut CandleFetcher,
    notifier: Option<&TelegramNotifier>,
    store: &mut SweepStore,
) -> Result<()> {
    let base_secs = interval_seconds(&config.base_interval)
        .ok_or_else(|| anyhow!("Unknown base_interval: {}", config.base_interval))?;

    let removed = store.prune_symbols(&config.symbols);
    if !removed.is_empty() {
        info!(
            "Pruned {} departed symbol(s): {}",
            removed.len(),
            removed.join(", ")
        );
        persist(config, store);
    }

    let params = ScanParams {
        base_interval_secs: base_secs,
        history_limit: config.history_limit,
        staleness_hours: config.staleness_hours,
    };
    let plan = plan_scan(&store.metadata, Utc::now(), config_modified, &params);
    info!("Scan plan: {}", plan);

    match plan {
        ScanPlan::Skip => return Ok(()),
        ScanPlan::FullScan => {
            *store = full_scan(config, fetcher).await;
            persist(config, store);
        }
        ScanPlan::RecoveryScan { .. } | ScanPlan::LiveUpdate => {}
    }

    let mut breakouts = 0;
    for symbol in &config.symbols {
        match process_symbol(config, fetcher, store, symbol, base_secs, plan).await {
            Ok(Some(breakout)) => {
                breakouts += 1;
                persist(config, store);
                let matched = reconcile_htf(store, &breakout, &config.higher_intervals);
                if !matched.is_empty() {
                    persist(config, store);
                }
                notify_breakout(config, notifier, store, &breakout, &matched).await;
            }
            Ok(None) => {}
            Err(e) => error!("{}: breakout pass failed: {:#}", symbol, e),
        }
    }

    persist(config, store);
    info!("Cycle complete: {} breakout(s)", breakouts);
    Ok(())
}

/// Persist the store; failures are logged and never block the cycle.
fn persist(config: &SweepConfig, store: &mut SweepStore) {
    if let Err(e) = save_store(&config.store_path, store) {
        error!("Failed to persist store: {:#}", e);
    }
}

/// Rebuild the store from scratch: full history for every configured
/// symbol and interval. A fetch failure leaves that pair absent; the next
/// cycle picks it up again.
async fn full_scan(config: &SweepConfig, fetcher: &mut CandleFetcher) -> SweepStore {
    let window = config.fractal_window;
    let mut fresh = SweepStore::default();

    for symbol in &config.symbols {
        for interval in config.all_intervals() {
            let mut candles = match fetcher.candles(symbol, interval, config.history_limit).await {
                Ok(candles) => candles,
                Err(e) => {
                    error!("{}-{}: full scan fetch failed: {:#}", symbol, interval, e);
                    continue;
                }
            };
            if config.base_interval == interval {
                // Newest row is the still forming candle; its breaks are
                // evaluated once it confirms.
                candles.pop();
            }
            if candles.len() < window {
                info!(
                    "{}-{}: {} candle(s) is not enough history for a window of {}",
                    symbol,
                    interval,
                    candles.len(),
                    window
                );
            }
            fresh.reconcile(symbol, interval, &candles, window);
            let (highs, lows) = fresh.counts(symbol, interval);
            info!(
                "{}-{}: full scan found {} high / {} low pivots",
                symbol, interval, highs, lows
            );
        }
    }

    fresh.stamp_full_scan(Utc::now());
    fresh
}

/// Bring one symbol up to date and test its newest confirmed candle.
///
/// The base interval reconciles in two phases around the confirmed candle:
/// candles that closed before it first, then breakout evaluation against
/// the stored sets, then the confirmed candle itself. Evaluation therefore
/// sees the sets as they stood before the candle it is judging.
async fn process_symbol(
    config: &SweepConfig,
    fetcher: &mut CandleFetcher,
    store: &mut SweepStore,
    symbol: &str,
    base_secs: i64,
    plan: ScanPlan,
) -> Result<Option<Breakout>> {
    let window = config.fractal_window;
    let base = config.base_interval.as_str();

    let confirmed = fetcher.last_confirmed(symbol, base).await?;
    let limit = fetch_limit(config, plan, base_secs);
    let mut candles = fetcher.candles(symbol, base, limit).await?;
    candles.retain(|c| c.close_time <= confirmed.close_time);

    if candles.len() < window {
        info!(
            "{}-{}: {} candle(s) closed, detection window is {}",
            symbol,
            base,
            candles.len(),
            window
        );
    }

    let earlier: Vec<Candle> = candles
        .iter()
        .filter(|c| c.close_time < confirmed.close_time)
        .copied()
        .collect();
    store.reconcile(symbol, base, &earlier, window);

    let sets = store.sets(symbol, base).cloned().unwrap_or_default();
    let breakout = evaluate_breakout(symbol, base, &sets, &confirmed, base_secs);

    store.reconcile(symbol, base, &candles, window);
    store.record_candle_close(confirmed.close_time);

    for interval in &config.higher_intervals {
        let Some(secs) = interval_seconds(interval) else {
            continue;
        };
        let hi_limit = fetch_limit(config, plan, secs);
        match fetcher.candles(symbol, interval, hi_limit).await {
            Ok(hi_candles) => store.reconcile(symbol, interval, &hi_candles, window),
            Err(e) => warn!("{}-{}: refresh failed: {:#}", symbol, interval, e),
        }
    }

    if let Some(b) = &breakout {
        info!(
            "{}-{}: {} of pivot {} from {} (distance {})",
            symbol, base, b.kind, b.value, b.fractal_time, b.distance
        );
    }
    Ok(breakout)
}

/// Fetch depth for one interval under the given plan. A recovery fetch is
/// never shallower than a live one, so short downtimes still cover a full
/// detection window.
fn fetch_limit(config: &SweepConfig, plan: ScanPlan, interval_secs: i64) -> usize {
    match plan {
        ScanPlan::FullScan => config.history_limit,
        ScanPlan::RecoveryScan { downtime_secs } => {
            recovery_fetch_limit(downtime_secs, interval_secs, config.history_limit)
                .max(config.effective_live_lookback())
        }
        ScanPlan::LiveUpdate | ScanPlan::Skip => config.effective_live_lookback(),
    }
}

async fn notify_breakout(
    config: &SweepConfig,
    notifier: Option<&TelegramNotifier>,
    store: &SweepStore,
    breakout: &Breakout,
    matched_htf: &[String],
) {
    let tz = config.tz().unwrap_or(chrono_tz::UTC);
    let counts: Vec<(String, usize, usize)> = config
        .all_intervals()
        .into_iter()
        .map(|interval| {
            let (highs, lows) = store.counts(&breakout.symbol, interval);
            (interval.to_string(), highs, lows)
        })
        .collect();
    let message = format_breakout_message(breakout, matched_htf, &counts, tz);
    info!("Breakout alert:\n{}", message);

    if !config.send_messages {
        info!("Telegram sending disabled; alert logged only");
        return;
    }
    let Some(notifier) = notifier else {
        warn!("Telegram credentials missing; alert logged only");
        return;
    };
    if let Err(e) = notifier.send(&message).await {
        error!("Failed to send breakout alert: {:#}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SweepConfig {
        SweepConfig {
            symbols: vec!["BTCUSDT".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_fetch_limit_full_scan_uses_history_limit() {
        assert_eq!(fetch_limit(&config(), ScanPlan::FullScan, 3_600), 500);
    }

    #[test]
    fn test_fetch_limit_recovery_scales_with_interval() {
        let plan = ScanPlan::RecoveryScan {
            downtime_secs: 12 * 3_600,
        };
        // 1h candles: 12 + margin; 4h candles: 3 + margin.
        assert_eq!(fetch_limit(&config(), plan, 3_600), 17);
        assert_eq!(fetch_limit(&config(), plan, 14_400), 8);
    }

    #[test]
    fn test_fetch_limit_short_recovery_floored_to_live_depth() {
        let plan = ScanPlan::RecoveryScan {
            downtime_secs: 3_660,
        };
        // A one-candle gap plus margin would be 6; the live depth of 7 wins.
        assert_eq!(fetch_limit(&config(), plan, 3_600), 7);
    }

    #[test]
    fn test_fetch_limit_live_covers_detection_window() {
        let config = config();
        assert_eq!(
            fetch_limit(&config, ScanPlan::LiveUpdate, 3_600),
            config.effective_live_lookback()
        );
    }
}
