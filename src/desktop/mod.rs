use crate::errors::EngineError;

#[cfg(windows)]
mod windows;
#[cfg(target_os = "linux")]
mod x11;
#[cfg(target_os = "macos")]
mod macos;

/// Opaque native window identifier (HWND on Windows, XID on X11).
pub type WindowHandle = isize;

/// Exact-match window lookup criteria. An empty class or an absent title
/// matches any value for that field.
#[derive(Debug, Clone, Default)]
pub struct WindowPredicate {
    pub class_name: String,
    pub title: Option<String>,
}

impl WindowPredicate {
    pub fn class(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            title: None,
        }
    }

    pub fn titled(title: &str) -> Self {
        Self {
            class_name: String::new(),
            title: Some(title.to_string()),
        }
    }

    pub fn matches(&self, class_name: &str, title: &str) -> bool {
        if !self.class_name.is_empty() && self.class_name != class_name {
            return false;
        }
        if let Some(wanted) = &self.title {
            if wanted != title {
                return false;
            }
        }
        true
    }
}

/// What the engine needs from a desktop environment. Capability-based:
/// a backend that cannot reparent simply reports the failure and the
/// scheduler degrades, it never crashes.
pub trait DesktopIntegration {
    /// All windows matching `predicate`, children of `parent` or top-level
    /// when `parent` is `None`. Returns an owned list; no live enumeration
    /// state escapes the call.
    fn find_windows(
        &self,
        predicate: &WindowPredicate,
        parent: Option<WindowHandle>,
    ) -> Vec<WindowHandle>;

    fn find_window(
        &self,
        predicate: &WindowPredicate,
        parent: Option<WindowHandle>,
    ) -> Option<WindowHandle> {
        self.find_windows(predicate, parent).into_iter().next()
    }

    /// Re-hosts the render surface titled `title` behind the icon layer.
    fn insert_render_surface(&self, title: &str) -> Result<(), EngineError>;

    /// Nudges the shell to repaint the desktop.
    fn request_desktop_refresh(&self);

    /// Flips desktop icon visibility where the shell supports it.
    fn toggle_icon_visibility(&self);

    /// The static wallpaper currently configured, as a path or URI.
    fn current_wallpaper(&self) -> Option<String>;

    fn set_wallpaper(&self, value: &str) -> Result<(), EngineError>;
}

/// The one integration for the OS this build targets.
pub fn platform() -> Box<dyn DesktopIntegration> {
    #[cfg(windows)]
    {
        Box::new(windows::WindowsDesktop)
    }
    #[cfg(target_os = "linux")]
    {
        Box::new(x11::X11Desktop)
    }
    #[cfg(target_os = "macos")]
    {
        Box::new(macos::MacDesktop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_predicate_is_exact() {
        let p = WindowPredicate::class("WorkerW");
        assert!(p.matches("WorkerW", "anything"));
        assert!(!p.matches("workerw", ""));
        assert!(!p.matches("WorkerW2", ""));
    }

    #[test]
    fn title_predicate_is_exact() {
        let p = WindowPredicate::titled("MuralisRenderSurface");
        assert!(p.matches("AnyClass", "MuralisRenderSurface"));
        assert!(!p.matches("AnyClass", "MuralisRenderSurface2"));
    }

    #[test]
    fn empty_predicate_matches_everything() {
        let p = WindowPredicate::default();
        assert!(p.matches("A", "b"));
        assert!(p.matches("", ""));
    }

    #[test]
    fn combined_predicate_requires_both() {
        let p = WindowPredicate {
            class_name: "Progman".to_string(),
            title: Some("Program Manager".to_string()),
        };
        assert!(p.matches("Progman", "Program Manager"));
        assert!(!p.matches("Progman", "Other"));
        assert!(!p.matches("Other", "Program Manager"));
    }
}
