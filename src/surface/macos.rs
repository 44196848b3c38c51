use std::process::Command;

use super::RenderSurface;
use crate::{errors::EngineError, sources::AssetDescriptor, warn};

/// Images are routed through the desktop picture setting; there is no
/// public way to park a live window behind the icon layer, so video and
/// page content degrade to a platform error and the scheduler falls back.
pub struct DesktopPictureSurface {
    original: Option<String>,
}

impl DesktopPictureSurface {
    pub fn new() -> Self {
        Self {
            original: current_picture(),
        }
    }
}

fn osascript(script: &str) -> Result<String, EngineError> {
    let output = Command::new("osascript")
        .args(["-e", script])
        .output()
        .map_err(|e| EngineError::PlatformIntegration(format!("run osascript: {e}")))?;
    if !output.status.success() {
        return Err(EngineError::PlatformIntegration(format!(
            "osascript: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn current_picture() -> Option<String> {
    osascript(r#"tell application "System Events" to get picture of current desktop"#)
        .ok()
        .filter(|s| !s.is_empty())
}

impl RenderSurface for DesktopPictureSurface {
    fn present(&mut self, asset: &AssetDescriptor) -> Result<(), EngineError> {
        match asset {
            AssetDescriptor::Image(path) => {
                let escaped = path.to_string_lossy().replace('"', "\\\"");
                osascript(&format!(
                    r#"tell application "System Events" to set picture of every desktop to "{escaped}""#
                ))
                .map(|_| ())
            }
            AssetDescriptor::Video(_) => Err(EngineError::PlatformIntegration(
                "video wallpaper is not available on this platform".to_string(),
            )),
            AssetDescriptor::Page(_) => Err(EngineError::PlatformIntegration(
                "page wallpaper is not available on this platform".to_string(),
            )),
        }
    }

    fn clear(&mut self) {
        if let Some(original) = &self.original {
            let escaped = original.replace('"', "\\\"");
            if let Err(e) = osascript(&format!(
                r#"tell application "System Events" to set picture of every desktop to "{escaped}""#
            )) {
                warn!("could not restore the desktop picture: {e}");
            }
        }
    }
}
