use std::{fs, path::Path};

use serde_json::{Map, Value};

use crate::errors::EngineError;

use super::json::{invalidate, load_json};

/* =========================
   MODE SELECTORS
   ========================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallpaperMode {
    Image,
    Video,
    Web,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    Fixed,
    Carousel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMode {
    Local,
    Streamed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebMode {
    Bing,
    Chromecast,
    Url,
}

impl WallpaperMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            v if v.eq_ignore_ascii_case("image") => Some(Self::Image),
            v if v.eq_ignore_ascii_case("video") => Some(Self::Video),
            v if v.eq_ignore_ascii_case("web") => Some(Self::Web),
            _ => None,
        }
    }
}

impl ImageMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            v if v.eq_ignore_ascii_case("fixed") => Some(Self::Fixed),
            v if v.eq_ignore_ascii_case("carousel") => Some(Self::Carousel),
            _ => None,
        }
    }
}

impl VideoMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            v if v.eq_ignore_ascii_case("local") => Some(Self::Local),
            v if v.eq_ignore_ascii_case("streamed") => Some(Self::Streamed),
            _ => None,
        }
    }
}

impl WebMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            v if v.eq_ignore_ascii_case("bing") => Some(Self::Bing),
            v if v.eq_ignore_ascii_case("chromecast") => Some(Self::Chromecast),
            v if v.eq_ignore_ascii_case("url") => Some(Self::Url),
            _ => None,
        }
    }

    /// The settings key holding this provider's last-fetch date stamp.
    pub fn stamp_key(self) -> Option<&'static str> {
        match self {
            WebMode::Bing => Some("bing_last_fetch"),
            WebMode::Chromecast => Some("chromecast_last_fetch"),
            WebMode::Url => None,
        }
    }
}

/* =========================
   SNAPSHOT
   ========================= */

/// One immutable configuration snapshot. Replaced wholesale on every
/// reload; the engine never mutates it in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub debug: bool,
    pub mode: WallpaperMode,
    pub img_mode: ImageMode,
    pub video_mode: VideoMode,
    pub web_mode: WebMode,
    pub img: String,
    pub folder: String,
    /// Carousel period in seconds; always >= 1.
    pub img_period: u64,
    pub video: String,
    pub video_ref: String,
    pub url: String,
    /// `YYYYMMDD` stamps of the last successful daily fetch, per provider.
    pub bing_last_fetch: String,
    pub chromecast_last_fetch: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            mode: WallpaperMode::Image,
            img_mode: ImageMode::Fixed,
            video_mode: VideoMode::Local,
            web_mode: WebMode::Bing,
            img: String::new(),
            folder: String::new(),
            img_period: 30,
            video: String::new(),
            video_ref: String::new(),
            url: String::new(),
            bing_last_fetch: String::new(),
            chromecast_last_fetch: String::new(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let value = load_json(path).ok_or_else(|| {
            EngineError::Config(format!("cannot read {}", path.display()))
        })?;
        Self::from_json(&value)
            .ok_or_else(|| EngineError::Config(format!("invalid fields in {}", path.display())))
    }

    /// Loads the snapshot, or substitutes the default configuration when the
    /// file is missing or unparseable. The error, if any, is returned so the
    /// caller can surface its one-time notice.
    pub fn load_or_default(path: &Path) -> (Self, Option<EngineError>) {
        match Self::load(path) {
            Ok(settings) => (settings, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn from_json(root: &Value) -> Option<Self> {
        let map = root.as_object()?;
        let defaults = Self::default();

        // Mode selectors are strict: an unknown string is a config error,
        // not a silent default (a silently unhandled mode shows nothing).
        let mode = WallpaperMode::parse(str_at(map, "mode")?)?;
        let img_mode = ImageMode::parse(str_at(map, "img_mode")?)?;
        let video_mode = VideoMode::parse(str_at(map, "video_mode")?)?;
        let web_mode = WebMode::parse(str_at(map, "web_mode")?)?;

        let img_period = u64_at(map, "img_period").unwrap_or(defaults.img_period);
        if img_period == 0 {
            return None;
        }

        Some(Self {
            debug: bool_at(map, "debug").unwrap_or(defaults.debug),
            mode,
            img_mode,
            video_mode,
            web_mode,
            img: string_at(map, "img"),
            folder: string_at(map, "folder"),
            img_period,
            video: string_at(map, "video"),
            video_ref: string_at(map, "video_ref"),
            url: string_at(map, "url"),
            bing_last_fetch: string_at(map, "bing_last_fetch"),
            chromecast_last_fetch: string_at(map, "chromecast_last_fetch"),
        })
    }

    /// Boundary write into the persistence collaborator's file: record a
    /// successful daily fetch. Only the stamp field is touched; everything
    /// else is preserved as stored.
    pub fn store_fetch_stamp(path: &Path, mode: WebMode, stamp: &str) -> Result<(), EngineError> {
        let Some(key) = mode.stamp_key() else {
            return Ok(());
        };

        let txt = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut value: Value = serde_json::from_str(&txt)
            .map_err(|e| EngineError::Config(format!("cannot parse {}: {e}", path.display())))?;
        let map = value
            .as_object_mut()
            .ok_or_else(|| EngineError::Config("settings root is not an object".to_string()))?;
        map.insert(key.to_string(), Value::String(stamp.to_string()));

        let serialized = serde_json::to_string_pretty(&value)
            .map_err(|e| EngineError::Config(format!("cannot serialize settings: {e}")))?;
        fs::write(path, serialized)
            .map_err(|e| EngineError::Config(format!("cannot write {}: {e}", path.display())))?;
        invalidate(path);
        Ok(())
    }

    /// The default settings file scaffolded on first run.
    pub fn default_file_contents() -> String {
        let template = serde_json::json!({
            "debug": false,
            "mode": "Image",
            "img_mode": "Fixed",
            "video_mode": "Local",
            "web_mode": "Bing",
            "img": "",
            "folder": "",
            "img_period": 30,
            "video": "",
            "video_ref": "",
            "url": "",
            "bing_last_fetch": "",
            "chromecast_last_fetch": "",
        });
        serde_json::to_string_pretty(&template).unwrap_or_else(|_| "{}".to_string())
    }
}

/* =========================
   FIELD HELPERS
   ========================= */

fn str_at<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)?.as_str()
}

fn string_at(map: &Map<String, Value>, key: &str) -> String {
    str_at(map, key).unwrap_or("").to_string()
}

fn bool_at(map: &Map<String, Value>, key: &str) -> Option<bool> {
    map.get(key)?.as_bool()
}

fn u64_at(map: &Map<String, Value>, key: &str) -> Option<u64> {
    map.get(key)?.as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_settings(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("settings.json");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_a_full_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_settings(
            &dir,
            r#"{
                "debug": true,
                "mode": "Web",
                "img_mode": "Carousel",
                "video_mode": "Streamed",
                "web_mode": "Chromecast",
                "img": "/pics/a.png",
                "folder": "/pics",
                "img_period": 5,
                "video": "/vids/v.mp4",
                "video_ref": "https://youtu.be/abc123",
                "url": "https://example.com",
                "bing_last_fetch": "20260822",
                "chromecast_last_fetch": ""
            }"#,
        );

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.mode, WallpaperMode::Web);
        assert_eq!(settings.img_mode, ImageMode::Carousel);
        assert_eq!(settings.video_mode, VideoMode::Streamed);
        assert_eq!(settings.web_mode, WebMode::Chromecast);
        assert_eq!(settings.img_period, 5);
        assert_eq!(settings.bing_last_fetch, "20260822");
        assert!(settings.debug);
    }

    #[test]
    fn missing_file_falls_back_to_defaults_with_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        let (settings, err) = Settings::load_or_default(&path);
        assert_eq!(settings, Settings::default());
        assert!(matches!(err, Some(EngineError::Config(_))));
    }

    #[test]
    fn unknown_mode_string_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_settings(
            &dir,
            r#"{"mode": "Hologram", "img_mode": "Fixed",
                "video_mode": "Local", "web_mode": "Bing"}"#,
        );
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn zero_period_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_settings(
            &dir,
            r#"{"mode": "Image", "img_mode": "Carousel",
                "video_mode": "Local", "web_mode": "Bing", "img_period": 0}"#,
        );
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn mode_strings_are_case_insensitive() {
        let value: Value = serde_json::from_str(
            r#"{"mode": "image", "img_mode": "CAROUSEL",
                "video_mode": "local", "web_mode": "url"}"#,
        )
        .unwrap();
        let settings = Settings::from_json(&value).unwrap();
        assert_eq!(settings.mode, WallpaperMode::Image);
        assert_eq!(settings.img_mode, ImageMode::Carousel);
        assert_eq!(settings.web_mode, WebMode::Url);
    }

    #[test]
    fn stamp_write_back_preserves_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_settings(&dir, &Settings::default_file_contents());

        Settings::store_fetch_stamp(&path, WebMode::Bing, "20260823").unwrap();

        let reloaded = Settings::load(&path).unwrap();
        assert_eq!(reloaded.bing_last_fetch, "20260823");
        assert_eq!(reloaded.mode, WallpaperMode::Image);
        assert_eq!(reloaded.chromecast_last_fetch, "");
    }

    #[test]
    fn default_file_round_trips() {
        let value: Value = serde_json::from_str(&Settings::default_file_contents()).unwrap();
        assert_eq!(Settings::from_json(&value).unwrap(), Settings::default());
    }
}
