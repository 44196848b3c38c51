use std::path::PathBuf;

use crate::{desktop::DesktopIntegration, info, utility::cache_dir, warn};

/// The static wallpaper that was set before the engine started. Captured
/// once at startup and used as the never-blank fallback and the shutdown
/// restore target.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    value: Option<String>,
}

impl SnapshotStore {
    pub fn capture(desktop: &dyn DesktopIntegration) -> Self {
        match desktop.current_wallpaper() {
            Some(value) if !value.is_empty() => {
                info!("startup wallpaper snapshot: {value}");
                Self { value: Some(value) }
            }
            _ => {
                warn!("no startup wallpaper could be captured");
                Self { value: None }
            }
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The asset to show when active content fails: the snapshot if it
    /// points at an existing file, otherwise the generated default.
    pub fn fallback_asset(&self) -> PathBuf {
        if let Some(value) = &self.value {
            let path = PathBuf::from(strip_file_scheme(value));
            if path.is_file() {
                return path;
            }
        }
        default_asset_path()
    }

    pub fn restore(&self, desktop: &dyn DesktopIntegration) {
        let target = match &self.value {
            Some(value) => value.clone(),
            None => default_asset_path().to_string_lossy().to_string(),
        };
        if let Err(e) = desktop.set_wallpaper(&target) {
            warn!("could not restore startup wallpaper: {e}");
        }
    }
}

/// The generated plain background shipped as the fallback of last resort.
pub fn default_asset_path() -> PathBuf {
    cache_dir().join("default.png")
}

/// Writes the default asset if it is not on disk yet. A solid dark tone
/// keeps the desktop legible while real content is unavailable.
pub fn ensure_default_asset() -> std::io::Result<PathBuf> {
    let path = default_asset_path();
    if path.is_file() {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pixel = image::Rgb([0x10u8, 0x10, 0x18]);
    let canvas = image::RgbImage::from_pixel(1280, 720, pixel);
    canvas
        .save(&path)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    Ok(path)
}

fn strip_file_scheme(value: &str) -> &str {
    let Some(rest) = value.strip_prefix("file://") else {
        return value;
    };
    // Drive-letter URLs carry an extra slash: file:///C:/pics/bg.png
    if rest.len() > 2 && rest.as_bytes()[0] == b'/' && rest.as_bytes()[2] == b':' {
        &rest[1..]
    } else {
        rest
    }
}
