use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use clap::Parser;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use tracing::{error, info, warn};

use fractal_sweep::bingx::BingxClient;
use fractal_sweep::config::SweepConfig;
use fractal_sweep::cycle::{run_cycle, CandleFetcher};
use fractal_sweep::storage::load_store;
use fractal_sweep::telegram::TelegramNotifier;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long, env = "SWEEP_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Run a single cycle immediately and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fractal_sweep=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let (mut config, mut config_modified) = SweepConfig::load(&args.config)?;
    info!("Starting fractal sweep scanner");
    info!("Config: {}", args.config.display());
    info!(
        "Symbols: {} | base interval: {} | higher: {}",
        config.symbols.len(),
        config.base_interval,
        if config.higher_intervals.is_empty() {
            "none".to_string()
        } else {
            config.higher_intervals.join(", ")
        }
    );
    info!("Store: {}", config.store_path.display());

    let notifier =
        match TelegramNotifier::from_env(StdDuration::from_secs(config.timeouts.telegram_secs)) {
            Ok(notifier) => Some(notifier),
            Err(e) => {
                warn!("Telegram delivery unavailable: {:#}", e);
                None
            }
        };
    let client = BingxClient::new(StdDuration::from_secs(config.timeouts.http_secs));
    let mut fetcher = CandleFetcher::new(client);
    let mut store = load_store(&config.store_path);

    if args.once {
        run_cycle(
            &config,
            config_modified,
            &mut fetcher,
            notifier.as_ref(),
            &mut store,
        )
        .await?;
        return Ok(());
    }

    let mut known_symbols: Option<BTreeSet<String>> = None;
    loop {
        let tz = config.tz()?;
        let now = Utc::now().with_timezone(&tz);
        let next = next_run_time(
            now.clone(),
            config.effective_runner_minutes(),
            config.runner_delay_seconds as i64,
        );
        let wait = (next.clone() - now).to_std().unwrap_or_default();
        info!(
            "Next cycle at {} (sleeping {}s)",
            next.format("%Y-%m-%d %H:%M:%S %Z"),
            wait.as_secs()
        );
        tokio::time::sleep(wait).await;

        // Re-read the config so edits take effect without a restart
        if !reload_config(&args.config, &mut config, &mut config_modified) {
            tokio::time::sleep(StdDuration::from_secs(5)).await;
            continue;
        }

        announce_symbols(&config, &mut known_symbols, notifier.as_ref()).await;

        if let Err(e) = run_cycle(
            &config,
            config_modified,
            &mut fetcher,
            notifier.as_ref(),
            &mut store,
        )
        .await
        {
            error!("Cycle failed: {:#}", e);
            if config.send_messages {
                if let Some(notifier) = &notifier {
                    let message = format!("\u{274C} Bot crashed with error: {e:#}");
                    if let Err(send_err) = notifier.send(&message).await {
                        error!("Failed to send crash alert: {:#}", send_err);
                    }
                }
            }
        }
        fetcher.clear();
    }
}

/// Re-read the config, replacing the current one on success. A failed
/// reload leaves the previous config in place and the cycle is skipped.
fn reload_config(
    path: &Path,
    config: &mut SweepConfig,
    modified: &mut Option<DateTime<Utc>>,
) -> bool {
    match SweepConfig::load(path) {
        Ok((fresh, fresh_modified)) => {
            *config = fresh;
            *modified = fresh_modified;
            true
        }
        Err(e) => {
            error!("Config reload failed, skipping cycle: {:#}", e);
            false
        }
    }
}

/// Log, and alert when enabled, whenever the tracked symbol set differs
/// from the previous cycle. Fires once at startup too, announcing the
/// initial set.
async fn announce_symbols(
    config: &SweepConfig,
    known: &mut Option<BTreeSet<String>>,
    notifier: Option<&TelegramNotifier>,
) {
    let current: BTreeSet<String> = config.symbols.iter().cloned().collect();
    if known.as_ref() == Some(&current) {
        return;
    }

    let names = symbol_names(&current);
    info!("Tracking {} symbol(s): {}", current.len(), names);
    if config.send_messages {
        if let Some(notifier) = notifier {
            let message = format!("\u{1F504} Active symbols updated:\n{}", names);
            if let Err(e) = notifier.send(&message).await {
                error!("Failed to send symbol update: {:#}", e);
            }
        }
    }
    *known = Some(current);
}

fn symbol_names(symbols: &BTreeSet<String>) -> String {
    symbols
        .iter()
        .map(|s| s.trim_end_matches("USDT"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Next aligned run slot: floor the current time to the alignment interval,
/// advance one interval, then add the start delay.
///
/// At 10:02 with a 5 minute interval and 60s delay the next run is
/// 10:06:00 (the 10:05 boundary plus the delay).
fn next_run_time<T: TimeZone>(
    now: DateTime<T>,
    interval_minutes: u32,
    delay_seconds: i64,
) -> DateTime<T> {
    let interval = interval_minutes.clamp(1, 60);
    let floored_minute = now.minute() / interval * interval;
    let base = now
        .clone()
        .with_minute(floored_minute)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    base + Duration::minutes(interval as i64) + Duration::seconds(delay_seconds)
}
