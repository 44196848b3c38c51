use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    errors::EngineError,
    info, warn,
    web::{self, ImageCatalog},
};

/// Hard ceiling on download attempts for one daily fetch. Counted across
/// the today-image try and every listing candidate together.
pub const MAX_FETCH_ATTEMPTS: usize = 10;

/* =========================
   DAILY CACHE
   ========================= */

/// Where a provider's daily image lives on disk, and the `YYYYMMDD` stamp
/// of the last successful fetch.
#[derive(Debug, Clone)]
pub struct RemoteCacheEntry {
    pub local_path: PathBuf,
    pub last_fetch_date: String,
}

impl RemoteCacheEntry {
    /// Fresh means: fetched today and the file is still on disk. A fresh
    /// entry is served with zero network calls.
    pub fn is_fresh(&self, today: &str) -> bool {
        !self.last_fetch_date.is_empty()
            && self.last_fetch_date == today
            && self.local_path.is_file()
    }
}

/* =========================
   FETCH
   ========================= */

pub trait Downloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), EngineError>;
}

pub struct HttpDownloader;

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), EngineError> {
        web::download(url, dest)
    }
}

/// Fetches today's image from `catalog` into `dest`.
///
/// The today-image URL is tried first; on failure the listing candidates
/// are tried in catalog order, each at most once. After ten failed
/// downloads in total the fetch gives up with a network error and `dest`
/// is left untouched. `cancel` is polled between attempts so a superseded
/// job stops burning the network.
pub fn fetch_daily_image(
    catalog: &dyn ImageCatalog,
    downloader: &dyn Downloader,
    dest: &Path,
    cancel: &AtomicBool,
) -> Result<PathBuf, EngineError> {
    let mut attempts = 0usize;
    let mut tried: Vec<String> = Vec::new();

    let mut candidates: Vec<String> = Vec::new();
    if let Some(today) = catalog.today_image() {
        candidates.push(today);
    }
    candidates.extend(catalog.listing());

    for url in candidates {
        if cancel.load(Ordering::Relaxed) {
            return Err(EngineError::Network("daily fetch cancelled".to_string()));
        }
        if tried.contains(&url) {
            continue;
        }
        if attempts >= MAX_FETCH_ATTEMPTS {
            break;
        }

        attempts += 1;
        tried.push(url.clone());
        match downloader.download(&url, dest) {
            Ok(()) => {
                info!("daily image fetched on attempt {attempts}: {url}");
                return Ok(dest.to_path_buf());
            }
            Err(e) => {
                warn!("daily fetch attempt {attempts}/{MAX_FETCH_ATTEMPTS} failed: {e}");
            }
        }
    }

    Err(EngineError::Network(format!(
        "no daily image after {attempts} attempts"
    )))
}
