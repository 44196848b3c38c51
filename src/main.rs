#![cfg_attr(windows, windows_subsystem = "windows")]

mod bootstrap;
mod data_loaders;
mod desktop;
mod errors;
mod logging;
mod remote_fetch;
mod scheduler;
mod snapshot;
mod sources;
mod surface;
mod utility;
mod web;

use std::{
    fs,
    sync::mpsc,
    thread,
    time::{Duration, Instant, SystemTime},
};

#[cfg(windows)]
use windows::Win32::UI::{
    HiDpi::{SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2},
    WindowsAndMessaging::{DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE, WM_QUIT},
};

use crate::{
    data_loaders::settings::Settings,
    scheduler::{ContentScheduler, ThreadedRunner},
    snapshot::SnapshotStore,
    utility::{app_root_dir, settings_path},
};

pub const APP_NAME: &str = "muralis";

const TICK_SLEEP: Duration = Duration::from_millis(50);
const WATCH_INTERVAL: Duration = Duration::from_millis(500);

#[cfg(windows)]
fn enable_per_monitor_dpi_awareness() {
    unsafe {
        if SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2).is_err() {
            warn!("failed to set PerMonitorV2 DPI awareness; sizes may be scaled");
        }
    }
}

fn settings_mtime(path: &std::path::Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Returns true when the process should exit. On Windows that is WM_QUIT;
/// everywhere it also honors a `quit` marker file dropped into the app
/// directory.
fn quit_requested() -> bool {
    #[cfg(windows)]
    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            if msg.message == WM_QUIT {
                return true;
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    let marker = app_root_dir().join("quit");
    if marker.exists() {
        let _ = fs::remove_file(&marker);
        return true;
    }
    false
}

/// Marker-file command channel for surrounding tooling: dropping an
/// `icons` file into the app directory flips desktop icon visibility.
fn poll_commands(desktop: &dyn desktop::DesktopIntegration) {
    let marker = app_root_dir().join("icons");
    if marker.exists() {
        let _ = fs::remove_file(&marker);
        desktop.toggle_icon_visibility();
    }
}

fn main() {
    logging::init(false);
    std::panic::set_hook(Box::new(|panic_info| {
        error!("panic: {panic_info}");
    }));

    let first_run = bootstrap::scaffold();
    #[cfg(windows)]
    enable_per_monitor_dpi_awareness();

    let config_path = settings_path();
    let (mut current, config_err) = Settings::load_or_default(&config_path);
    logging::set_debug(current.debug);
    info!("!---------- starting {APP_NAME} ----------!");
    if first_run {
        info!("first run; defaults scaffolded at {}", config_path.display());
    }

    let desktop = desktop::platform();
    let snapshot = SnapshotStore::capture(desktop.as_ref());

    let mut surface = match surface::create() {
        Ok(surface) => surface,
        Err(e) => {
            error!("no render surface available: {e}");
            return;
        }
    };

    let (outcome_tx, outcome_rx) = mpsc::channel();
    let mut runner = ThreadedRunner::new(outcome_tx);
    let mut scheduler = ContentScheduler::new(snapshot, config_path.clone());
    if let Some(e) = config_err {
        scheduler.notify_config_error(&e);
    }

    scheduler.load_or_reload(&current, surface.as_mut(), &mut runner);

    // Behind-icons layering is best effort: one retry after a refresh,
    // then the content simply runs as a normal bottom window.
    if let Err(e) = desktop.insert_render_surface(surface.title()) {
        warn!("behind-icons insertion failed: {e}");
        desktop.request_desktop_refresh();
        if let Err(e) = desktop.insert_render_surface(surface.title()) {
            warn!("running without behind-icons layering: {e}");
        }
    }

    let mut last_modified = settings_mtime(&config_path);
    let mut last_watch = Instant::now();

    loop {
        if quit_requested() {
            info!("shutdown requested");
            break;
        }

        poll_commands(desktop.as_ref());

        while let Ok(outcome) = outcome_rx.try_recv() {
            scheduler.handle_outcome(outcome, surface.as_mut());
        }
        scheduler.pump_surface(surface.as_mut());
        scheduler.tick(Instant::now(), surface.as_mut());

        if last_watch.elapsed() >= WATCH_INTERVAL {
            last_watch = Instant::now();
            let modified = settings_mtime(&config_path);
            let changed = match (last_modified, modified) {
                (Some(prev), Some(curr)) => curr > prev,
                (None, Some(_)) => true,
                _ => false,
            };
            if changed {
                last_modified = modified;
                match Settings::load(&config_path) {
                    Ok(next) => {
                        if next != current {
                            info!("settings changed; reloading");
                            logging::set_debug(next.debug);
                            scheduler.load_or_reload(&next, surface.as_mut(), &mut runner);
                            if let Err(e) = desktop.insert_render_surface(surface.title()) {
                                warn!("behind-icons insertion failed after reload: {e}");
                            }
                            current = next;
                        }
                    }
                    Err(e) => scheduler.notify_config_error(&e),
                }
            }
        }

        if let Some(notice) = scheduler.take_notice() {
            warn!("[NOTICE] {notice}");
        }

        thread::sleep(TICK_SLEEP);
    }

    // Re-assert the layering once so the restored wallpaper repaints
    // cleanly behind whatever is left on screen.
    if let Err(e) = desktop.insert_render_surface(surface.title()) {
        warn!("final layering attempt failed: {e}");
    }
    scheduler.shutdown(surface.as_mut(), desktop.as_ref());
    info!("!---------- {APP_NAME} stopped ----------!");
}
