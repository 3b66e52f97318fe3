//! Telegram alert delivery
//!
//! Minimal Bot API client: one method, `sendMessage` with HTML parse mode.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Telegram Bot API base URL
pub const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Telegram notifier bound to one bot token and chat.
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Create a notifier from environment variables
    ///
    /// Expects:
    /// - `TELEGRAM_BOT_TOKEN` - Bot token from @BotFather
    /// - `TELEGRAM_CHAT_ID` - Target chat or channel id
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN")
            .context("TELEGRAM_BOT_TOKEN environment variable not set")?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID")
            .context("TELEGRAM_CHAT_ID environment variable not set")?;
        Ok(Self::new(timeout, token, chat_id))
    }

    /// Create a notifier with explicit credentials.
    pub fn new(timeout: Duration, token: String, chat_id: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: API_BASE.to_string(),
            token,
            chat_id,
        }
    }

    /// Send one message to the configured chat.
    pub async fn send(&self, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };

        let response = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.base_url, self.token))
            .json(&request)
            .send()
            .await
            .context("Failed to send Telegram message")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Telegram sendMessage failed with status {}: {}",
                status,
                body
            ));
        }

        debug!("Telegram message sent ({} chars)", text.len());
        Ok(())
    }
}
