//! Store persistence
//!
//! The pivot store lives in a single pretty-printed JSON file so it can be
//! inspected and hand-edited. Loading never fails the process: a missing
//! file yields an empty store and a corrupt one is logged and replaced by
//! an empty store, which downstream scan planning treats as "rebuild
//! everything".

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use tracing::{info, warn};

use crate::sweep_core::SweepStore;

/// Load the store from disk, falling back to an empty store.
pub fn load_store(path: &Path) -> SweepStore {
    if !path.exists() {
        info!("No store at {}, starting empty", path.display());
        return SweepStore::default();
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to read store {}: {}", path.display(), e);
            return SweepStore::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(store) => store,
        Err(e) => {
            warn!(
                "Store {} is corrupt ({}), starting empty",
                path.display(),
                e
            );
            SweepStore::default()
        }
    }
}

/// Write the store to disk, stamping `last_update_time` first.
pub fn save_store(path: &Path, store: &mut SweepStore) -> Result<()> {
    store.metadata.last_update_time = Some(Utc::now().to_rfc3339());
    let json = serde_json::to_string_pretty(store).context("Failed to serialize store")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write store {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep_core::Pivot;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fractal-sweep-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let store = load_store(Path::new("/nonexistent/fractal-sweep-store.json"));
        assert!(store.symbols.is_empty());
        assert!(store.metadata.last_full_scan.is_none());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let path = temp_path("corrupt.json");
        std::fs::write(&path, "{ this is not json").unwrap();
        let store = load_store(&path);
        assert!(store.symbols.is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let path = temp_path("roundtrip.json");
        let mut store = SweepStore::default();
        store.sets_mut("BTCUSDT", "1h").highs.push(Pivot {
            time: 1_691_244_000_000,
            value: 27345.67,
        });
        store.record_candle_close(1_691_247_600_000);
        save_store(&path, &mut store).unwrap();
        assert!(store.metadata.last_update_time.is_some());

        let loaded = load_store(&path);
        assert_eq!(
            loaded.sets("BTCUSDT", "1h").unwrap().highs,
            store.sets("BTCUSDT", "1h").unwrap().highs
        );
        assert_eq!(
            loaded.metadata.last_candle_close_time,
            Some(1_691_247_600_000)
        );
        assert!(loaded.metadata.last_update_at().is_some());
        std::fs::remove_file(&path).ok();
    }
}
