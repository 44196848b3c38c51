use windows::{
    core::{w, BOOL},
    Win32::{
        Foundation::{HWND, LPARAM, WPARAM},
        UI::WindowsAndMessaging::{
            EnumChildWindows, EnumWindows, FindWindowExW, FindWindowW, GetClassNameW,
            GetWindowTextW, SendMessageTimeoutW, SendMessageW, SendNotifyMessageW, SetParent,
            SystemParametersInfoW, HWND_BROADCAST, SMTO_NORMAL, SPIF_SENDCHANGE,
            SPIF_UPDATEINIFILE, SPI_GETDESKWALLPAPER, SPI_SETDESKWALLPAPER,
            SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS, WM_COMMAND, WM_SETTINGCHANGE,
        },
    },
};

use super::{DesktopIntegration, WindowHandle, WindowPredicate};
use crate::{errors::EngineError, info, utility::to_wstring, warn};

/// Menu command the shell's DefView uses to flip icon visibility.
const DEFVIEW_TOGGLE_ICONS: usize = 0x7402;

/// Undocumented Progman message that spawns the WorkerW pair used for
/// behind-icons hosting.
const SPAWN_WORKERW: u32 = 0x052C;

const MAX_PATH: usize = 260;

pub struct WindowsDesktop;

struct EnumState<'a> {
    predicate: &'a WindowPredicate,
    out: Vec<WindowHandle>,
}

unsafe extern "system" fn collect_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let Some(state) = (lparam.0 as *mut EnumState).as_mut() else {
        return BOOL(0);
    };
    if state.predicate.matches(&read_class(hwnd), &read_title(hwnd)) {
        state.out.push(hwnd.0 as WindowHandle);
    }
    BOOL(1)
}

fn read_class(hwnd: HWND) -> String {
    let mut buf = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn read_title(hwnd: HWND) -> String {
    let mut buf = [0u16; 512];
    let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn as_hwnd(handle: WindowHandle) -> HWND {
    HWND(handle as *mut core::ffi::c_void)
}

/// The window the render surface must be parented under so it paints
/// behind the icon layer. Mirrors the Progman 0x052C handshake, then
/// prefers the WorkerW sibling of whichever window hosts the DefView.
fn behind_icons_host() -> Option<HWND> {
    unsafe {
        let progman = FindWindowW(w!("Progman"), None).ok()?;

        let mut spawn_result = 0usize;
        let _ = SendMessageTimeoutW(
            progman,
            SPAWN_WORKERW,
            WPARAM(0),
            LPARAM(0),
            SMTO_NORMAL,
            1000,
            Some(&mut spawn_result),
        );

        let mut defview_host: Option<HWND> = None;
        unsafe extern "system" fn defview_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
            let out = (lparam.0 as *mut Option<HWND>).as_mut().unwrap();
            if FindWindowExW(Some(hwnd), None, w!("SHELLDLL_DefView"), None).ok().is_some() {
                *out = Some(hwnd);
                return BOOL(0);
            }
            BOOL(1)
        }
        let _ = EnumWindows(
            Some(defview_proc),
            LPARAM((&mut defview_host) as *mut Option<HWND> as isize),
        );

        if let Some(host) = defview_host {
            if let Ok(workerw) = FindWindowExW(None, Some(host), w!("WorkerW"), None) {
                info!("behind-icons host: WorkerW sibling {workerw:?}");
                return Some(workerw);
            }
            if let Ok(workerw) = FindWindowExW(Some(progman), None, w!("WorkerW"), None) {
                info!("behind-icons host: WorkerW under Progman {workerw:?}");
                return Some(workerw);
            }
            warn!("no WorkerW found; hosting under the DefView parent");
            return Some(host);
        }

        if let Ok(workerw) = FindWindowExW(Some(progman), None, w!("WorkerW"), None) {
            return Some(workerw);
        }
        warn!("no DefView host found; hosting under Progman");
        Some(progman)
    }
}

fn defview_window() -> Option<HWND> {
    let mut defview: Option<HWND> = None;
    unsafe extern "system" fn find_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let out = (lparam.0 as *mut Option<HWND>).as_mut().unwrap();
        if let Ok(dv) = FindWindowExW(Some(hwnd), None, w!("SHELLDLL_DefView"), None) {
            *out = Some(dv);
            return BOOL(0);
        }
        BOOL(1)
    }
    unsafe {
        let _ = EnumWindows(
            Some(find_proc),
            LPARAM((&mut defview) as *mut Option<HWND> as isize),
        );
    }
    defview
}

impl DesktopIntegration for WindowsDesktop {
    fn find_windows(
        &self,
        predicate: &WindowPredicate,
        parent: Option<WindowHandle>,
    ) -> Vec<WindowHandle> {
        let mut state = EnumState {
            predicate,
            out: Vec::new(),
        };
        let lparam = LPARAM((&mut state) as *mut EnumState as isize);
        unsafe {
            match parent {
                Some(parent) => {
                    let _ = EnumChildWindows(Some(as_hwnd(parent)), Some(collect_proc), lparam);
                }
                None => {
                    let _ = EnumWindows(Some(collect_proc), lparam);
                }
            }
        }
        state.out
    }

    fn insert_render_surface(&self, title: &str) -> Result<(), EngineError> {
        let surface = self
            .find_window(&WindowPredicate::titled(title), None)
            .ok_or_else(|| {
                EngineError::PlatformIntegration(format!("render surface {title:?} not found"))
            })?;
        let host = behind_icons_host().ok_or_else(|| {
            EngineError::PlatformIntegration("no behind-icons host window".to_string())
        })?;

        unsafe {
            SetParent(as_hwnd(surface), Some(host)).map_err(|e| {
                EngineError::PlatformIntegration(format!("SetParent failed: {e}"))
            })?;
        }
        info!("render surface parented under {host:?}");
        self.request_desktop_refresh();
        Ok(())
    }

    fn request_desktop_refresh(&self) {
        unsafe {
            let _ = SendNotifyMessageW(HWND_BROADCAST, WM_SETTINGCHANGE, WPARAM(0), LPARAM(0));
        }
    }

    fn toggle_icon_visibility(&self) {
        let Some(defview) = defview_window() else {
            warn!("icon toggle skipped; DefView not found");
            return;
        };
        unsafe {
            let _ = SendMessageW(
                defview,
                WM_COMMAND,
                Some(WPARAM(DEFVIEW_TOGGLE_ICONS)),
                Some(LPARAM(0)),
            );
        }
    }

    fn current_wallpaper(&self) -> Option<String> {
        let mut buf = [0u16; MAX_PATH];
        unsafe {
            SystemParametersInfoW(
                SPI_GETDESKWALLPAPER,
                buf.len() as u32,
                Some(buf.as_mut_ptr() as *mut _),
                SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
            )
            .ok()?;
        }
        let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        let value = String::from_utf16_lossy(&buf[..len]);
        (!value.is_empty()).then_some(value)
    }

    fn set_wallpaper(&self, value: &str) -> Result<(), EngineError> {
        let wide = to_wstring(value);
        unsafe {
            SystemParametersInfoW(
                SPI_SETDESKWALLPAPER,
                0,
                Some(wide.as_ptr() as *mut _),
                SPIF_UPDATEINIFILE | SPIF_SENDCHANGE,
            )
            .map_err(|e| EngineError::PlatformIntegration(format!("set wallpaper: {e}")))
        }
    }
}
