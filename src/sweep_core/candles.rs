//! Confirmed candle type and interval arithmetic

use serde::{Deserialize, Serialize};

/// A single closed OHLC candle.
///
/// `close_time` is the millisecond timestamp at which the candle closed and is
/// the identity of the candle within one symbol/interval series. Which series
/// a candle belongs to is carried by the call context, not the candle itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Sort candles oldest-first and drop duplicate close times, keeping the
/// first occurrence of each. Exchange kline endpoints return pages in
/// whatever order suits them, so every fetched batch goes through here
/// before any detection runs on it.
pub fn normalize_candles(candles: &mut Vec<Candle>) {
    candles.sort_by_key(|c| c.close_time);
    candles.dedup_by_key(|c| c.close_time);
}

/// Number of seconds one candle of the given interval spans.
///
/// Accepts the exchange interval notation: a positive integer followed by
/// `m` (minutes), `h` (hours), `d` (days) or `w` (weeks). Returns `None`
/// for anything else.
pub fn interval_seconds(interval: &str) -> Option<i64> {
    let mut chars = interval.chars();
    let unit = chars.next_back()?;
    let count: i64 = chars.as_str().parse().ok()?;
    if count <= 0 {
        return None;
    }
    let unit_secs = match unit {
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        'w' => 604_800,
        _ => return None,
    };
    count.checked_mul(unit_secs)
}

/// Millisecond span of one candle of the given interval.
pub fn interval_millis(interval: &str) -> Option<i64> {
    interval_seconds(interval)?.checked_mul(1_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close_time: i64, close: f64) -> Candle {
        Candle {
            close_time,
            open: close,
            high: close,
            low: close,
            close,
        }
    }

    #[test]
    fn test_interval_seconds_known_units() {
        assert_eq!(interval_seconds("1m"), Some(60));
        assert_eq!(interval_seconds("30m"), Some(1_800));
        assert_eq!(interval_seconds("1h"), Some(3_600));
        assert_eq!(interval_seconds("4h"), Some(14_400));
        assert_eq!(interval_seconds("1d"), Some(86_400));
        assert_eq!(interval_seconds("1w"), Some(604_800));
    }

    #[test]
    fn test_interval_seconds_rejects_garbage() {
        assert_eq!(interval_seconds(""), None);
        assert_eq!(interval_seconds("h"), None);
        assert_eq!(interval_seconds("0m"), None);
        assert_eq!(interval_seconds("-5m"), None);
        assert_eq!(interval_seconds("1x"), None);
        assert_eq!(interval_seconds("monthly"), None);
    }

    #[test]
    fn test_interval_seconds_rejects_multibyte_unit() {
        // Cyrillic lookalike of "1d"; must come back as unknown, not split
        // the string mid-character.
        assert_eq!(interval_seconds("1\u{0434}"), None);
        assert_eq!(interval_seconds("\u{0434}"), None);
    }

    #[test]
    fn test_interval_millis() {
        assert_eq!(interval_millis("1h"), Some(3_600_000));
        assert_eq!(interval_millis("bogus"), None);
    }

    #[test]
    fn test_normalize_sorts_ascending() {
        let mut candles = vec![candle(3000, 3.0), candle(1000, 1.0), candle(2000, 2.0)];
        normalize_candles(&mut candles);
        let times: Vec<i64> = candles.iter().map(|c| c.close_time).collect();
        assert_eq!(times, vec![1000, 2000, 3000]);
    }

    #[test]
    fn test_normalize_drops_duplicate_close_times() {
        let mut candles = vec![
            candle(1000, 1.0),
            candle(2000, 2.0),
            candle(2000, 99.0),
            candle(3000, 3.0),
        ];
        normalize_candles(&mut candles);
        assert_eq!(candles.len(), 3);
        // First occurrence wins
        assert_eq!(candles[1].close, 2.0);
    }
}
