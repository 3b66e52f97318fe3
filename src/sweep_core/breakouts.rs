//! Breakout classification and alert text
//!
//! A confirmed candle is tested against the active pivot sets of its pair.
//! Highs take priority: if the candle's high exceeds any stored high pivot,
//! the breakout is against the most extreme broken high and the close
//! decides between a confirmed break and a sweep. Only when no high broke
//! are the lows examined, mirrored. At most one breakout per candle.

use super::candles::Candle;
use super::fractals::PivotSide;
use super::store::PivotSets;
use chrono::TimeZone;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Breakout classification.
///
/// `Confirm` means the candle also closed beyond the pivot value; `Sweep`
/// means price pierced it intraperiod but closed back inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakoutKind {
    HConfirm,
    HSweep,
    LConfirm,
    LSweep,
}

impl BreakoutKind {
    pub fn side(self) -> PivotSide {
        match self {
            BreakoutKind::HConfirm | BreakoutKind::HSweep => PivotSide::High,
            BreakoutKind::LConfirm | BreakoutKind::LSweep => PivotSide::Low,
        }
    }
}

impl fmt::Display for BreakoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BreakoutKind::HConfirm => "HConfirm",
            BreakoutKind::HSweep => "HSweep",
            BreakoutKind::LConfirm => "LConfirm",
            BreakoutKind::LSweep => "LSweep",
        };
        write!(f, "{label}")
    }
}

/// One classified breakout of a stored pivot by a confirmed candle.
#[derive(Debug, Clone)]
pub struct Breakout {
    pub symbol: String,
    pub interval: String,
    pub kind: BreakoutKind,
    /// Value of the broken pivot.
    pub value: f64,
    /// Close time (ms) of the candle that formed the broken pivot.
    pub fractal_time: i64,
    /// The candle that broke it.
    pub candle: Candle,
    /// Age of the pivot in whole candles at break time.
    pub distance: i64,
}

/// Test one confirmed candle against the active pivot sets of a pair.
///
/// High pivots are checked first and win outright; among broken pivots of
/// the chosen side the most extreme value is reported (highest high,
/// lowest low), ties going to the newest pivot. Returns `None` when the
/// candle broke nothing.
pub fn evaluate_breakout(
    symbol: &str,
    interval: &str,
    sets: &PivotSets,
    candle: &Candle,
    interval_secs: i64,
) -> Option<Breakout> {
    // Sets iterate newest-first, so keeping the incumbent on equal values
    // reports the newest of an equal pair.
    let (pivot, kind) = if let Some(p) = sets
        .highs
        .iter()
        .filter(|p| candle.high > p.value)
        .reduce(|best, p| if p.value > best.value { p } else { best })
    {
        let kind = if candle.close > p.value {
            BreakoutKind::HConfirm
        } else {
            BreakoutKind::HSweep
        };
        (p, kind)
    } else if let Some(p) = sets
        .lows
        .iter()
        .filter(|p| candle.low < p.value)
        .reduce(|best, p| if p.value < best.value { p } else { best })
    {
        let kind = if candle.close < p.value {
            BreakoutKind::LConfirm
        } else {
            BreakoutKind::LSweep
        };
        (p, kind)
    } else {
        return None;
    };

    Some(Breakout {
        symbol: symbol.to_string(),
        interval: interval.to_string(),
        kind,
        value: pivot.value,
        fractal_time: pivot.time,
        candle: *candle,
        distance: (candle.close_time - pivot.time) / (interval_secs * 1_000),
    })
}

/// Render the Telegram alert for a breakout.
///
/// `matched_htf` lists higher intervals where the same pivot value was
/// also pruned; `active_counts` is `(interval, highs, lows)` per tracked
/// interval of the symbol, base interval first.
pub fn format_breakout_message(
    breakout: &Breakout,
    matched_htf: &[String],
    active_counts: &[(String, usize, usize)],
    tz: Tz,
) -> String {
    let (icon, side_label, candle_extreme) = match breakout.kind.side() {
        PivotSide::High => ("\u{1F7E9}", "High", breakout.candle.high),
        PivotSide::Low => ("\u{1F7E5}", "Low", breakout.candle.low),
    };

    let mut message = format!(
        "{icon} {kind} ({distance})\nSymbol: {symbol}, {interval}\n\
         {side_initial}Fractal {side_label}={value} | {ftime}\n\
         BreakCandle {side_label}={candle_extreme}",
        kind = breakout.kind,
        distance = breakout.distance,
        symbol = breakout.symbol,
        interval = breakout.interval,
        side_initial = match breakout.kind.side() {
            PivotSide::High => "H",
            PivotSide::Low => "L",
        },
        value = breakout.value,
        ftime = format_candle_time(breakout.fractal_time, tz),
    );

    if !matched_htf.is_empty() {
        message.push_str(&format!("\nHTF match: {}", matched_htf.join(", ")));
    }
    if !active_counts.is_empty() {
        let counts = active_counts
            .iter()
            .map(|(interval, highs, lows)| format!("{interval} H{highs}/L{lows}"))
            .collect::<Vec<_>>()
            .join(", ");
        message.push_str(&format!("\nActive: {counts}"));
    }
    message
}

fn format_candle_time(close_time_ms: i64, tz: Tz) -> String {
    match chrono::Utc.timestamp_millis_opt(close_time_ms).single() {
        Some(dt) => dt.with_timezone(&tz).format("%d%b %H:%M").to_string(),
        None => close_time_ms.to_string(),
    }
}
