//! Runtime configuration
//!
//! The scanner reads one JSON config file. Every field except `symbols` has
//! a default, so a minimal config is just `{"symbols": ["BTCUSDT"]}`. The
//! file is re-read at the start of every cycle and its modification time
//! feeds the scan planner, so edits take effect without a restart.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sweep_core::interval_seconds;

/// HTTP timeouts in seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// BingX market data requests
    pub http_secs: u64,

    /// Telegram Bot API requests
    pub telegram_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            http_secs: 15,
            telegram_secs: 10,
        }
    }
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Symbols to track, internal notation (e.g. "BTCUSDT")
    pub symbols: Vec<String>,

    /// Candle interval driving detection and breakout alerts
    pub base_interval: String,

    /// Coarser intervals kept reconciled for higher-timeframe matching
    pub higher_intervals: Vec<String>,

    /// Detection window width in candles (odd, at least 3)
    pub fractal_window: usize,

    /// Candles fetched per symbol/interval on a full rebuild
    pub history_limit: usize,

    /// Force a full rebuild when the last one is older than this
    pub staleness_hours: i64,

    /// Candles fetched per symbol/interval on a live update
    pub live_lookback: usize,

    /// Deliver alerts to Telegram; false logs them only
    pub send_messages: bool,

    /// IANA timezone for alert timestamps and runner alignment
    pub timezone: String,

    /// Where the pivot store is persisted
    pub store_path: PathBuf,

    /// Runner alignment interval in minutes; defaults to one base candle
    pub runner_interval_minutes: Option<u32>,

    /// Seconds past each interval boundary before the cycle starts, giving
    /// the exchange time to finalize the closed candle
    pub runner_delay_seconds: u64,

    /// HTTP timeouts
    pub timeouts: Timeouts,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            base_interval: "1h".to_string(),
            higher_intervals: Vec::new(),
            fractal_window: 5,
            history_limit: 500,
            staleness_hours: 24,
            live_lookback: 3,
            send_messages: false,
            timezone: "UTC".to_string(),
            store_path: PathBuf::from("storage.json"),
            runner_interval_minutes: None,
            runner_delay_seconds: 60,
            timeouts: Timeouts::default(),
        }
    }
}

impl SweepConfig {
    /// Read, parse and validate a config file.
    ///
    /// Also returns the file's modification time when the filesystem
    /// provides one; the scan planner compares it against the last full
    /// scan.
    pub fn load(path: &Path) -> Result<(Self, Option<DateTime<Utc>>)> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: SweepConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        let modified = std::fs::metadata(path)
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);
        Ok((config, modified))
    }

    /// Reject configs the scanner cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(anyhow!("Config has no symbols"));
        }
        if interval_seconds(&self.base_interval).is_none() {
            return Err(anyhow!("Unknown base_interval: {}", self.base_interval));
        }
        for interval in &self.higher_intervals {
            if interval_seconds(interval).is_none() {
                return Err(anyhow!("Unknown higher interval: {}", interval));
            }
        }
        if self.fractal_window < 3 || self.fractal_window % 2 == 0 {
            return Err(anyhow!(
                "fractal_window must be odd and at least 3, got {}",
                self.fractal_window
            ));
        }
        if self.history_limit < self.fractal_window {
            return Err(anyhow!(
                "history_limit {} is smaller than fractal_window {}",
                self.history_limit,
                self.fractal_window
            ));
        }
        if self.staleness_hours < 1 {
            return Err(anyhow!("staleness_hours must be at least 1"));
        }
        if self.timezone.parse::<Tz>().is_err() {
            return Err(anyhow!("Unknown timezone: {}", self.timezone));
        }
        if let Some(minutes) = self.runner_interval_minutes {
            if minutes == 0 || minutes > 60 {
                return Err(anyhow!(
                    "runner_interval_minutes must be 1-60, got {}",
                    minutes
                ));
            }
        }
        Ok(())
    }

    /// Parsed timezone. Always succeeds on a validated config.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| anyhow!("Unknown timezone: {}", self.timezone))
    }

    /// Base interval followed by the higher intervals.
    pub fn all_intervals(&self) -> Vec<&str> {
        std::iter::once(self.base_interval.as_str())
            .chain(self.higher_intervals.iter().map(String::as_str))
            .collect()
    }

    /// Live-update fetch depth, raised to cover one detection window so a
    /// live cycle can still mint new pivots.
    pub fn effective_live_lookback(&self) -> usize {
        self.live_lookback.max(self.fractal_window + 2)
    }

    /// Runner alignment in minutes: the explicit setting, or one base
    /// candle capped at an hour.
    pub fn effective_runner_minutes(&self) -> u32 {
        match self.runner_interval_minutes {
            Some(minutes) => minutes,
            None => {
                let secs = interval_seconds(&self.base_interval).unwrap_or(3_600);
                (secs / 60).clamp(1, 60) as u32
            }
        }
    }
}
