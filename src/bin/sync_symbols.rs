//! Symbol list sync tool
//!
//! Fetches the tradable USDT-M perpetual contracts from BingX and writes
//! `symbols.json` (internal notation) plus a human-readable `coins.txt`.
//! With `--force` the `symbols` array of the scanner config is replaced
//! in place, leaving every other setting untouched.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use fractal_sweep::bingx::{BingxClient, Contract};

#[derive(Parser, Debug)]
#[command(author, version, about = "Sync the tradable USDT-M symbol list from BingX")]
struct Args {
    /// Path to the JSON config file updated by --force
    #[arg(short, long, env = "SWEEP_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Overwrite an existing symbols.json and write the fetched symbols
    /// into the config file
    #[arg(long)]
    force: bool,

    /// Keep only the first N symbols (alphabetical)
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fractal_sweep=info".parse().unwrap())
                .add_directive("sync_symbols=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let client = BingxClient::new(Duration::from_secs(15));
    let contracts = client.contracts().await?;
    info!("Fetched {} contract listings", contracts.len());

    let symbols = active_usdt_symbols(&contracts, args.limit);
    if symbols.is_empty() {
        return Err(anyhow!("No active USDT-M symbols returned"));
    }
    info!("{} active USDT-M perpetual symbols", symbols.len());

    if Path::new("symbols.json").exists() && !args.force {
        warn!("symbols.json already exists; use --force to overwrite");
    } else {
        std::fs::write("symbols.json", serde_json::to_string_pretty(&symbols)?)
            .context("Failed to write symbols.json")?;
        info!("Wrote symbols.json");

        std::fs::write("coins.txt", render_coins(&symbols)).context("Failed to write coins.txt")?;
        info!("Wrote coins.txt");
    }

    if args.force {
        update_config_symbols(&args.config, &symbols)?;
        info!("Updated symbols in {}", args.config.display());
    } else {
        info!("Run with --force to update {}", args.config.display());
    }
    Ok(())
}

/// Online USDT-margined contracts as internal symbols, sorted, optionally
/// truncated.
fn active_usdt_symbols(contracts: &[Contract], limit: Option<usize>) -> Vec<String> {
    let mut symbols: Vec<String> = contracts
        .iter()
        .filter(|c| c.currency == "USDT" && c.status == 1)
        .map(|c| c.symbol.replace('-', ""))
        .collect();
    symbols.sort();
    symbols.dedup();
    if let Some(limit) = limit {
        symbols.truncate(limit);
    }
    symbols
}

fn render_coins(symbols: &[String]) -> String {
    let mut out = String::new();
    out.push_str("# BingX USDT-M perpetual coins\n");
    out.push_str(&format!("# {} symbols\n", symbols.len()));
    for symbol in symbols {
        out.push_str(symbol.trim_end_matches("USDT"));
        out.push('\n');
    }
    out
}

/// Replace only the `symbols` array, leaving the rest of the config as the
/// user wrote it.
fn update_config_symbols(path: &Path, symbols: &[String]) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let mut value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| anyhow!("Config {} is not a JSON object", path.display()))?;
    object.insert("symbols".to_string(), serde_json::json!(symbols));
    std::fs::write(path, serde_json::to_string_pretty(&value)?)
        .with_context(|| format!("Failed to write config {}", path.display()))?;
    Ok(())
}
