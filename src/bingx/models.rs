//! BingX API data models
//!
//! The public market endpoints are loose about shape: kline rows arrive as
//! objects or arrays depending on endpoint version, numeric fields arrive as
//! JSON numbers or as decimal strings, and the `{code, msg, data}` envelope
//! is sometimes dropped for a bare array. Everything here deserializes
//! tolerantly and converts to the internal [`Candle`] type in one place.

use crate::sweep_core::Candle;
use anyhow::{anyhow, Result};
use serde::Deserialize;

/// A numeric field that may be encoded as a JSON number or a decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LooseNumber::Number(v) => Some(*v),
            LooseNumber::Text(s) => s.parse().ok(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        Some(self.as_f64()? as i64)
    }
}

/// One kline row in either of the wire shapes BingX serves.
///
/// Object rows key the open time as `time` or `openTime`; array rows put it
/// first, followed by open/high/low/close.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawKline {
    Object {
        #[serde(default)]
        time: Option<i64>,
        #[serde(default, rename = "openTime")]
        open_time: Option<i64>,
        open: LooseNumber,
        high: LooseNumber,
        low: LooseNumber,
        close: LooseNumber,
    },
    Array(Vec<LooseNumber>),
}

impl RawKline {
    /// Convert to a [`Candle`], deriving `close_time` as the open time plus
    /// one interval. Returns `None` for rows missing required fields.
    pub fn to_candle(&self, interval_ms: i64) -> Option<Candle> {
        let (open_time, open, high, low, close) = match self {
            RawKline::Object {
                time,
                open_time,
                open,
                high,
                low,
                close,
            } => (
                time.or(*open_time)?,
                open.as_f64()?,
                high.as_f64()?,
                low.as_f64()?,
                close.as_f64()?,
            ),
            RawKline::Array(fields) => {
                if fields.len() < 5 {
                    return None;
                }
                (
                    fields[0].as_i64()?,
                    fields[1].as_f64()?,
                    fields[2].as_f64()?,
                    fields[3].as_f64()?,
                    fields[4].as_f64()?,
                )
            }
        };
        Some(Candle {
            close_time: open_time + interval_ms,
            open,
            high,
            low,
            close,
        })
    }
}

/// Kline endpoint response: the usual `{code, msg, data}` envelope or a
/// bare row array. Rows stay untyped here so a single malformed row can be
/// skipped instead of failing the whole batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum KlinesResponse {
    Envelope {
        code: i64,
        #[serde(default)]
        msg: String,
        #[serde(default)]
        data: Vec<serde_json::Value>,
    },
    Bare(Vec<serde_json::Value>),
}

impl KlinesResponse {
    /// Unwrap to rows, surfacing a non-zero envelope code as an error.
    pub fn into_rows(self) -> Result<Vec<serde_json::Value>> {
        match self {
            KlinesResponse::Envelope { code, msg, data } => {
                if code != 0 {
                    return Err(anyhow!("BingX error {}: {}", code, msg));
                }
                Ok(data)
            }
            KlinesResponse::Bare(rows) => Ok(rows),
        }
    }
}

/// Convert raw kline rows to candles, dropping rows that do not parse.
pub fn parse_candles(rows: Vec<serde_json::Value>, interval_ms: i64) -> Vec<Candle> {
    rows.into_iter()
        .filter_map(|row| {
            serde_json::from_value::<RawKline>(row)
                .ok()?
                .to_candle(interval_ms)
        })
        .collect()
}

/// Contracts endpoint response.
#[derive(Debug, Deserialize)]
pub struct ContractsResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Vec<Contract>,
}

/// One perpetual contract listing. Only the fields the symbol sync cares
/// about; the endpoint returns many more.
#[derive(Debug, Clone, Deserialize)]
pub struct Contract {
    pub symbol: String,
    #[serde(default)]
    pub currency: String,
    /// 1 = online per the BingX docs.
    #[serde(default)]
    pub status: i64,
}
