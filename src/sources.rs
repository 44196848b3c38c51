use std::path::{Path, PathBuf};

use crate::{
    data_loaders::settings::{ImageMode, Settings, VideoMode, WallpaperMode, WebMode},
    errors::EngineError,
    remote_fetch::RemoteCacheEntry,
    utility::cache_dir,
    warn,
};

/// Extensions accepted when scanning a carousel folder.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Embed target substituted when a share reference cannot be parsed.
pub const DEFAULT_STREAM_ID: &str = "dQw4w9WgXcQ";

/* =========================
   SOURCES
   ========================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyProvider {
    Bing,
    Chromecast,
}

impl DailyProvider {
    pub fn cache_file(self) -> PathBuf {
        match self {
            DailyProvider::Bing => cache_dir().join("bing_daily.jpg"),
            DailyProvider::Chromecast => cache_dir().join("chromecast_daily.jpg"),
        }
    }

    pub fn web_mode(self) -> WebMode {
        match self {
            DailyProvider::Bing => WebMode::Bing,
            DailyProvider::Chromecast => WebMode::Chromecast,
        }
    }
}

/// What the scheduler has been asked to show. One closed set; adding a
/// content kind means adding a variant and handling it everywhere the
/// compiler then points.
#[derive(Debug, Clone)]
pub enum ContentSource {
    FixedImage {
        path: PathBuf,
    },
    ImageCarousel {
        folder: PathBuf,
        period_secs: u64,
    },
    LocalVideo {
        path: PathBuf,
    },
    StreamedVideo {
        embed_url: String,
    },
    RenderedPage {
        url: String,
    },
    RemoteDailyImage {
        provider: DailyProvider,
        cache: RemoteCacheEntry,
    },
}

/// One concrete thing a render surface can present.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetDescriptor {
    Image(PathBuf),
    Video(PathBuf),
    Page(String),
}

/// Maps a settings snapshot onto the source it selects. Pure; no disk or
/// network access happens here.
pub fn source_from_settings(settings: &Settings) -> ContentSource {
    match settings.mode {
        WallpaperMode::Image => match settings.img_mode {
            ImageMode::Fixed => ContentSource::FixedImage {
                path: PathBuf::from(&settings.img),
            },
            ImageMode::Carousel => ContentSource::ImageCarousel {
                folder: PathBuf::from(&settings.folder),
                period_secs: settings.img_period.max(1),
            },
        },
        WallpaperMode::Video => match settings.video_mode {
            VideoMode::Local => ContentSource::LocalVideo {
                path: PathBuf::from(&settings.video),
            },
            VideoMode::Streamed => {
                let (embed_url, substituted) = parse_share_reference(&settings.video_ref);
                if substituted {
                    warn!(
                        "unrecognized stream reference {:?}; using the default stream",
                        settings.video_ref
                    );
                }
                ContentSource::StreamedVideo { embed_url }
            }
        },
        WallpaperMode::Web => match settings.web_mode {
            WebMode::Url => ContentSource::RenderedPage {
                url: settings.url.clone(),
            },
            WebMode::Bing => daily_source(DailyProvider::Bing, &settings.bing_last_fetch),
            WebMode::Chromecast => {
                daily_source(DailyProvider::Chromecast, &settings.chromecast_last_fetch)
            }
        },
    }
}

fn daily_source(provider: DailyProvider, last_fetch: &str) -> ContentSource {
    ContentSource::RemoteDailyImage {
        provider,
        cache: RemoteCacheEntry {
            local_path: provider.cache_file(),
            last_fetch_date: last_fetch.to_string(),
        },
    }
}

/* =========================
   FOLDER SCAN
   ========================= */

/// Immediate files of `folder` with an accepted image extension, sorted
/// by name. Subdirectories are not descended into.
pub fn images_in_folder(folder: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let entries = std::fs::read_dir(folder)
        .map_err(|e| EngineError::EmptyFolder(format!("{}: {e}", folder.display())))?;

    let mut images: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    images.sort();

    if images.is_empty() {
        return Err(EngineError::EmptyFolder(folder.display().to_string()));
    }
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// Cheap structural check that a file really is a decodable image.
pub fn validate_image(path: &Path) -> Result<(), EngineError> {
    if !path.is_file() {
        return Err(EngineError::Asset(format!("{} not found", path.display())));
    }
    image::image_dimensions(path)
        .map(|_| ())
        .map_err(|e| EngineError::Asset(format!("{}: {e}", path.display())))
}

/* =========================
   STREAM REFERENCES
   ========================= */

/// Turns a share reference (watch URL, short link, shorts link or bare
/// video id) into a muted autoplaying embed URL. Returns the URL and
/// whether the default stream had to be substituted.
pub fn parse_share_reference(reference: &str) -> (String, bool) {
    let id = extract_video_id(reference.trim());
    match id {
        Some(id) => (embed_url(&id), false),
        None => (embed_url(DEFAULT_STREAM_ID), true),
    }
}

fn embed_url(id: &str) -> String {
    format!("https://www.youtube.com/embed/{id}?autoplay=1&mute=1&loop=1&playlist={id}")
}

fn extract_video_id(reference: &str) -> Option<String> {
    if reference.is_empty() {
        return None;
    }

    let tail = |marker: &str| -> Option<String> {
        let at = reference.find(marker)? + marker.len();
        let rest = &reference[at..];
        let end = rest.find(['&', '?', '#']).unwrap_or(rest.len());
        let id = &rest[..end];
        valid_id(id).then(|| id.to_string())
    };

    if reference.contains("watch?v=") {
        // watch URLs key the id on the v parameter
        let at = reference.find("watch?v=")? + "watch?v=".len();
        let rest = &reference[at..];
        let end = rest.find(['&', '#']).unwrap_or(rest.len());
        let id = &rest[..end];
        return valid_id(id).then(|| id.to_string());
    }
    if reference.contains("youtu.be/") {
        return tail("youtu.be/");
    }
    if reference.contains("/shorts/") {
        return tail("/shorts/");
    }
    if !reference.contains('/') && !reference.contains('.') && valid_id(reference) {
        return Some(reference.to_string());
    }
    None
}

fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 16
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
