//! BingX REST client
//!
//! Thin client for the public USDT-M perpetual market endpoints. No
//! authentication is involved; both endpoints used here are unsigned.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::models::{parse_candles, Contract, ContractsResponse, KlinesResponse};
use crate::sweep_core::{interval_millis, normalize_candles, Candle};

/// Default API base URL for the BingX perpetual swap endpoints
pub const DEFAULT_BASE_URL: &str = "https://open-api.bingx.com";

const KLINES_PATH: &str = "/openApi/swap/v3/quote/klines";
const CONTRACTS_PATH: &str = "/openApi/swap/v2/quote/contracts";

/// BingX market data client
pub struct BingxClient {
    client: Client,
    base_url: String,
}

impl BingxClient {
    /// Create a new client with the given request timeout.
    ///
    /// `BINGX_BASE_URL` (optional) overrides the API base URL, for proxies
    /// and test servers.
    pub fn new(timeout: Duration) -> Self {
        let base_url =
            std::env::var("BINGX_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(timeout, base_url)
    }

    /// Create a new client against an explicit base URL.
    pub fn with_base_url(timeout: Duration, base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
            base_url,
        }
    }

    /// Fetch up to `limit` candles for a symbol/interval, oldest first with
    /// duplicate close times removed. The newest row may be the still
    /// forming candle.
    pub async fn candles(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let interval_ms = interval_millis(interval)
            .ok_or_else(|| anyhow!("Unknown interval: {}", interval))?;
        let api_symbol = normalize_symbol(symbol);
        let limit_param = limit.to_string();

        let response = self
            .client
            .get(format!("{}{}", self.base_url, KLINES_PATH))
            .query(&[
                ("symbol", api_symbol.as_str()),
                ("interval", interval),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to fetch klines for {}-{}", symbol, interval))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Klines request for {}-{} failed with status {}: {}",
                symbol,
                interval,
                status,
                body
            ));
        }

        let parsed: KlinesResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse klines for {}-{}", symbol, interval))?;
        let rows = parsed.into_rows()?;
        let mut candles = parse_candles(rows, interval_ms);
        normalize_candles(&mut candles);

        debug!(
            "{}-{}: fetched {} candles (limit {})",
            symbol,
            interval,
            candles.len(),
            limit
        );
        Ok(candles)
    }

    /// Fetch the most recent confirmed candle for a symbol/interval.
    ///
    /// Asks for the last three candles and takes the second-newest: the
    /// newest row is the candle still forming.
    pub async fn last_confirmed(&self, symbol: &str, interval: &str) -> Result<Candle> {
        let candles = self.candles(symbol, interval, 3).await?;
        confirmed_candle(&candles).ok_or_else(|| {
            anyhow!(
                "Not enough candles for {}-{}: got {}",
                symbol,
                interval,
                candles.len()
            )
        })
    }

    /// Fetch all perpetual contract listings.
    pub async fn contracts(&self) -> Result<Vec<Contract>> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, CONTRACTS_PATH))
            .send()
            .await
            .context("Failed to fetch contracts")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Contracts request failed with status {}: {}",
                status,
                body
            ));
        }

        let parsed: ContractsResponse = response
            .json()
            .await
            .context("Failed to parse contracts response")?;
        if parsed.code != 0 {
            return Err(anyhow!("BingX error {}: {}", parsed.code, parsed.msg));
        }
        Ok(parsed.data)
    }
}

/// Second-newest candle of a normalized batch, or `None` when fewer than
/// two rows came back.
fn confirmed_candle(candles: &[Candle]) -> Option<Candle> {
    if candles.len() < 2 {
        return None;
    }
    Some(candles[candles.len() - 2])
}

/// Convert an internal symbol like `BTCUSDT` to the dashed form the API
/// expects (`BTC-USDT`). Symbols already containing a dash pass through.
pub fn normalize_symbol(symbol: &str) -> String {
    if symbol.contains('-') {
        return symbol.to_string();
    }
    match symbol.strip_suffix("USDT") {
        Some(base) if !base.is_empty() => format!("{}-USDT", base),
        _ => symbol.to_string(),
    }
}
