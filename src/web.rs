use std::{
    fs,
    path::Path,
    sync::OnceLock,
    time::Duration,
};

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::{errors::EngineError, info};

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

const BING_TODAY_URL: &str = "https://bing.gifposter.com";
const BING_LISTING_URL: &str = "https://bing.gifposter.com/list/new/desc/slide.html?p=1";
const CHROMECAST_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/dconnolly/chromecast-backgrounds/master/backgrounds.json";

static HTTP: OnceLock<Client> = OnceLock::new();

fn client() -> &'static Client {
    HTTP.get_or_init(|| {
        Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default()
    })
}

/* =========================
   TRANSPORT
   ========================= */

/// Bounded-timeout reachability probe.
pub fn ping(url: &str) -> bool {
    client()
        .get(url)
        .send()
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}

pub fn fetch_text(url: &str) -> Result<String, EngineError> {
    let response = client()
        .get(url)
        .send()
        .map_err(|e| EngineError::Network(format!("GET {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(EngineError::Network(format!(
            "GET {url}: status {}",
            response.status()
        )));
    }
    response
        .text()
        .map_err(|e| EngineError::Network(format!("read body of {url}: {e}")))
}

pub fn fetch_json(url: &str) -> Result<serde_json::Value, EngineError> {
    let body = fetch_text(url)?;
    serde_json::from_str(&body).map_err(|e| EngineError::Network(format!("parse {url}: {e}")))
}

/// Streams `url` into `dest`. Written through a `.part` sibling and
/// renamed so a half-finished download never shadows a good cache file.
pub fn download(url: &str, dest: &Path) -> Result<(), EngineError> {
    let mut response = client()
        .get(url)
        .send()
        .map_err(|e| EngineError::Network(format!("GET {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(EngineError::Network(format!(
            "GET {url}: status {}",
            response.status()
        )));
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| EngineError::Network(format!("create {}: {e}", parent.display())))?;
    }

    write_via_part(dest, |file| {
        response
            .copy_to(file)
            .map(|_| ())
            .map_err(|e| EngineError::Network(format!("stream {url}: {e}")))
    })?;
    info!("downloaded {url} -> {}", dest.display());
    Ok(())
}

/// Runs `write` against the `.part` sibling of `dest`, renaming it into
/// place on success. A failed write removes the sibling so aborted
/// downloads do not accumulate on disk.
fn write_via_part(
    dest: &Path,
    write: impl FnOnce(&mut fs::File) -> Result<(), EngineError>,
) -> Result<(), EngineError> {
    let part = dest.with_extension("part");
    let written = fs::File::create(&part)
        .map_err(|e| EngineError::Network(format!("create {}: {e}", part.display())))
        .and_then(|mut file| write(&mut file));
    if let Err(e) = written {
        let _ = fs::remove_file(&part);
        return Err(e);
    }
    fs::rename(&part, dest)
        .map_err(|e| EngineError::Network(format!("finalize {}: {e}", dest.display())))
}

/* =========================
   PROVIDER CATALOGS
   ========================= */

/// A remote provider that can name today's image plus a listing of
/// recent alternatives, newest first.
pub trait ImageCatalog {
    fn today_image(&self) -> Option<String>;
    fn listing(&self) -> Vec<String>;
}

/// Bing picture-of-the-day, scraped from the gifposter mirror.
pub struct BingCatalog;

impl ImageCatalog for BingCatalog {
    fn today_image(&self) -> Option<String> {
        let html = fetch_text(BING_TODAY_URL).ok()?;
        scrape_today_image(&html)
    }

    fn listing(&self) -> Vec<String> {
        match fetch_text(BING_LISTING_URL) {
            Ok(html) => scrape_listing(&html),
            Err(_) => Vec::new(),
        }
    }
}

/// Chromecast ambient backgrounds, published as a JSON catalog.
pub struct ChromecastCatalog;

#[derive(Debug, Deserialize)]
struct ChromecastEntry {
    url: String,
}

impl ImageCatalog for ChromecastCatalog {
    fn today_image(&self) -> Option<String> {
        // The catalog has no picture-of-the-day endpoint; rotate through
        // it by date so the image changes every day.
        let listing = self.listing();
        if listing.is_empty() {
            return None;
        }
        let index = daily_pick_index(&crate::utility::today_stamp(), listing.len());
        Some(listing[index].clone())
    }

    fn listing(&self) -> Vec<String> {
        let Ok(value) = fetch_json(CHROMECAST_CATALOG_URL) else {
            return Vec::new();
        };
        let entries: Vec<ChromecastEntry> = match serde_json::from_value(value) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        entries.into_iter().map(|e| e.url).collect()
    }
}

/// Maps a `YYYYMMDD` stamp onto a listing index. Stable within a day and
/// guaranteed to move on the next one.
fn daily_pick_index(stamp: &str, len: usize) -> usize {
    let seed = stamp.parse::<u64>().unwrap_or(0);
    (seed % len as u64) as usize
}

/* =========================
   SCRAPING
   ========================= */

/// Today's image is advertised in a `<meta name="twitter:image">` tag.
pub fn scrape_today_image(html: &str) -> Option<String> {
    for tag in html.split('<') {
        if !tag.starts_with("meta") || !tag.contains("twitter:image") {
            continue;
        }
        if let Some(url) = tag_attr(tag, "content") {
            if !url.is_empty() {
                return Some(url);
            }
        }
    }
    None
}

/// The archive page marks each day's entry with `itemprop="contentUrl"`.
pub fn scrape_listing(html: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for tag in html.split('<') {
        if !tag.contains("itemprop=\"contentUrl\"") {
            continue;
        }
        if let Some(href) = tag_attr(tag, "href") {
            if !href.is_empty() && !urls.contains(&href) {
                urls.push(href);
            }
        }
    }
    urls
}

/// Extracts a double-quoted attribute value from a single tag body.
fn tag_attr(tag: &str, name: &str) -> Option<String> {
    let marker = format!("{name}=\"");
    let start = tag.find(&marker)? + marker.len();
    let rest = &tag[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn today_image_comes_from_the_twitter_meta_tag() {
        let html = r#"
            <head>
                <meta name="description" content="daily pictures">
                <meta name="twitter:image" content="https://img.example/today.jpg">
            </head>
        "#;
        assert_eq!(
            scrape_today_image(html).as_deref(),
            Some("https://img.example/today.jpg")
        );
    }

    #[test]
    fn today_image_is_none_without_the_tag() {
        assert_eq!(scrape_today_image("<html><body>nothing</body></html>"), None);
    }

    #[test]
    fn listing_collects_content_url_hrefs_in_order() {
        let html = r#"
            <a itemprop="contentUrl" href="https://img.example/a.jpg">a</a>
            <a class="x" itemprop="contentUrl" href="https://img.example/b.jpg">b</a>
            <a href="https://img.example/ignored.jpg">c</a>
            <a itemprop="contentUrl" href="https://img.example/a.jpg">dup</a>
        "#;
        assert_eq!(
            scrape_listing(html),
            vec![
                "https://img.example/a.jpg".to_string(),
                "https://img.example/b.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn failed_stream_leaves_no_partial_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("daily.jpg");

        let result = write_via_part(&dest, |file| {
            use std::io::Write;
            file.write_all(b"half").unwrap();
            Err(EngineError::Network("connection reset".to_string()))
        });
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn successful_stream_renames_the_partial_file_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("daily.jpg");

        write_via_part(&dest, |file| {
            use std::io::Write;
            file.write_all(b"image-bytes").unwrap();
            Ok(())
        })
        .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"image-bytes");
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn daily_pick_is_stable_within_a_day_and_moves_the_next_day() {
        assert_eq!(daily_pick_index("20260823", 7), daily_pick_index("20260823", 7));
        assert_ne!(daily_pick_index("20260823", 7), daily_pick_index("20260824", 7));
        assert_eq!(daily_pick_index("not-a-date", 7), 0);
        assert!(daily_pick_index("20260823", 3) < 3);
    }

    #[test]
    fn attribute_extraction_stops_at_the_closing_quote() {
        assert_eq!(
            tag_attr(r#"a href="one" title="two""#, "title").as_deref(),
            Some("two")
        );
        assert_eq!(tag_attr("a href=one", "href"), None);
    }
}
