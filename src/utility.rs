use std::{env, path::PathBuf};

#[cfg(windows)]
pub fn to_wstring(s: &str) -> Vec<u16> {
    use std::{ffi::OsStr, os::windows::ffi::OsStrExt};

    OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

pub fn user_home_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        env::var("USERPROFILE").map(PathBuf::from).ok()
    } else {
        env::var("HOME").map(PathBuf::from).ok()
    }
}

/// The canonical app root is `~/.muralis/`; settings, cache and the log
/// file all live here. Falls back to the working directory when the home
/// directory cannot be resolved.
pub fn app_root_dir() -> PathBuf {
    user_home_dir()
        .map(|p| p.join(".muralis"))
        .unwrap_or_else(|| PathBuf::from(".muralis"))
}

pub fn cache_dir() -> PathBuf {
    app_root_dir().join("cache")
}

pub fn settings_path() -> PathBuf {
    app_root_dir().join("settings.json")
}

/// Current local date as a `YYYYMMDD` stamp, the daily-cache key.
pub fn today_stamp() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}

/// Turns a local path into a `file:///` URL the embedded surface can load.
pub fn path_to_file_url(path: &std::path::Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    if normalized.starts_with('/') {
        format!("file://{normalized}")
    } else {
        format!("file:///{normalized}")
    }
}
