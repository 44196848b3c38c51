use std::fs;

use crate::{
    data_loaders::settings::Settings,
    error, info,
    snapshot::ensure_default_asset,
    utility::{app_root_dir, cache_dir, settings_path},
};

/// First-run scaffolding: the app directories, a default settings file
/// and the built-in fallback image. Returns whether the settings file
/// had to be created.
pub fn scaffold() -> bool {
    let root = app_root_dir();
    if let Err(e) = fs::create_dir_all(&root) {
        error!("could not create {}: {e}", root.display());
        return false;
    }
    if let Err(e) = fs::create_dir_all(cache_dir()) {
        error!("could not create the cache directory: {e}");
    }

    if let Err(e) = ensure_default_asset() {
        error!("could not write the default background: {e}");
    }

    let settings = settings_path();
    if settings.is_file() {
        return false;
    }
    match fs::write(&settings, Settings::default_file_contents()) {
        Ok(()) => {
            info!("scaffolded default settings at {}", settings.display());
            true
        }
        Err(e) => {
            error!("could not scaffold {}: {e}", settings.display());
            false
        }
    }
}
