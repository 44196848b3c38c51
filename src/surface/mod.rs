use crate::{errors::EngineError, sources::AssetDescriptor};

#[cfg(windows)]
mod windows;
#[cfg(target_os = "linux")]
mod x11;
#[cfg(target_os = "macos")]
mod macos;

/// Title the render surface window is created with; the desktop layer
/// finds it by this exact title when parenting it behind the icons.
pub const SURFACE_TITLE: &str = "MuralisRenderSurface";

/// A full-screen window (or platform equivalent) that can show one asset
/// at a time. Presenting a new asset replaces the previous one; there is
/// no moment where the surface shows nothing.
pub trait RenderSurface {
    fn title(&self) -> &str {
        SURFACE_TITLE
    }

    fn present(&mut self, asset: &AssetDescriptor) -> Result<(), EngineError>;

    /// Errors that only materialize after `present` returned, such as a
    /// navigation failure or a decoder exit. Drained every tick.
    fn take_async_error(&mut self) -> Option<EngineError> {
        None
    }

    fn clear(&mut self);
}

pub fn create() -> Result<Box<dyn RenderSurface>, EngineError> {
    #[cfg(windows)]
    {
        Ok(Box::new(windows::WebViewSurface::new()?))
    }
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(x11::X11Surface::new()?))
    }
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(macos::DesktopPictureSurface::new()))
    }
}

/// Minimal page that plays a local video muted, looping and letterboxed
/// to fill the screen.
pub fn video_wrapper_html(file_url: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><style>\
         html,body{{margin:0;height:100%;background:#000;overflow:hidden}}\
         video{{width:100%;height:100%;object-fit:cover}}\
         </style></head><body>\
         <video src=\"{file_url}\" autoplay muted loop playsinline></video>\
         </body></html>"
    )
}

/// Same wrapper for a still image: aspect-preserving, center-cropped.
pub fn image_wrapper_html(file_url: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><style>\
         html,body{{margin:0;height:100%;background:#000;overflow:hidden}}\
         img{{width:100%;height:100%;object-fit:cover}}\
         </style></head><body>\
         <img src=\"{file_url}\" alt=\"\">\
         </body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_wrapper_is_muted_and_loops() {
        let html = video_wrapper_html("file:///tmp/clip.mp4");
        assert!(html.contains("file:///tmp/clip.mp4"));
        assert!(html.contains("muted"));
        assert!(html.contains("loop"));
        assert!(html.contains("autoplay"));
    }

    #[test]
    fn image_wrapper_covers_the_viewport() {
        let html = image_wrapper_html("file:///tmp/bg.png");
        assert!(html.contains("file:///tmp/bg.png"));
        assert!(html.contains("object-fit:cover"));
    }
}
