//! BingX USDT-M perpetual market data client

pub mod client;
pub mod models;

pub use client::{normalize_symbol, BingxClient, DEFAULT_BASE_URL};
pub use models::Contract;
