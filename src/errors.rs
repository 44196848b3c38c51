use thiserror::Error;

/// Everything that can go wrong while keeping content on the desktop.
///
/// None of these terminate the process: each is caught at the boundary
/// where it occurs and converted into either a scheduler transition or a
/// logged degradation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("settings missing or unparseable: {0}")]
    Config(String),

    #[error("asset failed to load: {0}")]
    Asset(String),

    #[error("no usable images in folder: {0}")]
    EmptyFolder(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("desktop integration failed: {0}")]
    PlatformIntegration(String),
}

impl EngineError {
    /// The one human-readable notice for this error category. The caller
    /// shows it while the fallback content is already on screen, never
    /// instead of content.
    pub fn user_notice(&self) -> &'static str {
        match self {
            EngineError::Config(_) => {
                "Your settings could not be read; default settings are in use"
            }
            EngineError::Asset(_) => {
                "The selected media is not supported or corrupted; showing the previous wallpaper"
            }
            EngineError::EmptyFolder(_) => {
                "The selected folder contains no valid images to show"
            }
            EngineError::Network(_) => {
                "The remote content could not be reached; showing the previous wallpaper"
            }
            EngineError::PlatformIntegration(_) => {
                "The wallpaper could not be placed behind the desktop icons"
            }
        }
    }
}
