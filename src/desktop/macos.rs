use std::process::Command;

use super::{DesktopIntegration, WindowHandle, WindowPredicate};
use crate::{errors::EngineError, info};

/// Capability-based backend: the desktop picture is driven through
/// System Events, and there is no public way to reparent a foreign
/// window under the icon layer. Insertion is therefore a no-op and the
/// image path goes through `set_wallpaper` instead.
pub struct MacDesktop;

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

impl DesktopIntegration for MacDesktop {
    fn find_windows(
        &self,
        _predicate: &WindowPredicate,
        _parent: Option<WindowHandle>,
    ) -> Vec<WindowHandle> {
        Vec::new()
    }

    fn insert_render_surface(&self, _title: &str) -> Result<(), EngineError> {
        info!("behind-icons insertion is handled through the desktop picture");
        Ok(())
    }

    fn request_desktop_refresh(&self) {}

    fn toggle_icon_visibility(&self) {
        info!("icon visibility toggle is not supported on this platform");
    }

    fn current_wallpaper(&self) -> Option<String> {
        osascript(r#"tell application "System Events" to get picture of current desktop"#)
            .ok()
            .filter(|s| !s.is_empty())
    }

    fn set_wallpaper(&self, value: &str) -> Result<(), EngineError> {
        let escaped = value.replace('"', "\\\"");
        osascript(&format!(
            r#"tell application "System Events" to set picture of every desktop to "{escaped}""#
        ))
        .map(|_| ())
    }
}
