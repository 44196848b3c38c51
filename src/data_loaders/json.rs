use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{LazyLock, RwLock},
    time::{Duration, Instant},
};

use serde_json::Value;

/* =========================
   SETTINGS CACHE
========================= */

// Per-file cache so repeated watcher polls don't re-read and re-parse.
static JSON_CACHE: LazyLock<RwLock<HashMap<String, (Value, Instant)>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));
const CACHE_TTL: Duration = Duration::from_secs(1);
const CACHE_CAP: usize = 100;

/// Universal JSON loader with a short per-file cache.
pub fn load_json(path: &Path) -> Option<Value> {
    let now = Instant::now();
    let key = path.to_string_lossy().to_string();
    {
        let cache = JSON_CACHE.read().ok()?;
        if let Some((v, t)) = cache.get(&key) {
            if now.duration_since(*t) < CACHE_TTL {
                return Some(v.clone());
            }
        }
    }

    let txt = fs::read_to_string(path).ok()?;
    let v: Value = serde_json::from_str(&txt).ok()?;
    let mut cache = JSON_CACHE.write().ok()?;

    if cache.len() >= CACHE_CAP {
        if let Some(oldest_key) = cache
            .iter()
            .min_by_key(|(_, (_, t))| t)
            .map(|(k, _)| k.clone())
        {
            cache.remove(&oldest_key);
        }
    }

    cache.insert(key, (v.clone(), now));
    Some(v)
}

/// Drops the cache entry for `path` so the next load re-reads from disk.
/// Used after boundary writes such as the daily-fetch stamp update.
pub fn invalidate(path: &Path) {
    let key = path.to_string_lossy().to_string();
    if let Ok(mut cache) = JSON_CACHE.write() {
        cache.remove(&key);
    }
}
