use std::process::Command;

use x11rb::{
    connection::Connection,
    protocol::xproto::{
        AtomEnum, ConfigureWindowAux, ConnectionExt, PropMode, StackMode, Window,
    },
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
};

use super::{DesktopIntegration, WindowHandle, WindowPredicate};
use crate::{errors::EngineError, info, warn};

pub struct X11Desktop;

fn connect() -> Result<(RustConnection, Window), EngineError> {
    let (conn, screen_num) = RustConnection::connect(None)
        .map_err(|e| EngineError::PlatformIntegration(format!("X11 connect: {e}")))?;
    let root = conn.setup().roots[screen_num].root;
    Ok((conn, root))
}

fn window_class(conn: &RustConnection, window: Window) -> String {
    // WM_CLASS holds instance and class as nul-separated strings; the
    // class comes second.
    let Ok(cookie) = conn.get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)
    else {
        return String::new();
    };
    let Ok(reply) = cookie.reply() else {
        return String::new();
    };
    let mut parts = reply.value.split(|&b| b == 0).filter(|s| !s.is_empty());
    let instance = parts.next();
    let class = parts.next().or(instance);
    class
        .map(|s| String::from_utf8_lossy(s).to_string())
        .unwrap_or_default()
}

fn window_title(conn: &RustConnection, window: Window) -> String {
    let net_wm_name = conn
        .intern_atom(false, b"_NET_WM_NAME")
        .ok()
        .and_then(|c| c.reply().ok())
        .map(|r| r.atom);
    let atoms = [net_wm_name, Some(AtomEnum::WM_NAME.into())];

    for atom in atoms.into_iter().flatten() {
        let Ok(cookie) = conn.get_property(false, window, atom, AtomEnum::ANY, 0, 1024) else {
            continue;
        };
        let Ok(reply) = cookie.reply() else {
            continue;
        };
        if !reply.value.is_empty() {
            return String::from_utf8_lossy(&reply.value).to_string();
        }
    }
    String::new()
}

fn collect_matches(
    conn: &RustConnection,
    predicate: &WindowPredicate,
    window: Window,
    out: &mut Vec<WindowHandle>,
) {
    let Ok(cookie) = conn.query_tree(window) else {
        return;
    };
    let Ok(tree) = cookie.reply() else {
        return;
    };
    for child in tree.children {
        if predicate.matches(&window_class(conn, child), &window_title(conn, child)) {
            out.push(child as WindowHandle);
        }
        collect_matches(conn, predicate, child, out);
    }
}

fn intern(conn: &RustConnection, name: &[u8]) -> Result<u32, EngineError> {
    conn.intern_atom(false, name)
        .map_err(|e| EngineError::PlatformIntegration(format!("intern atom: {e}")))?
        .reply()
        .map_err(|e| EngineError::PlatformIntegration(format!("intern atom: {e}")))
        .map(|r| r.atom)
}

fn gsettings_get(key: &str) -> Option<String> {
    let output = Command::new("gsettings")
        .args(["get", "org.gnome.desktop.background", key])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let unquoted = raw.trim_matches('\'').to_string();
    (!unquoted.is_empty()).then_some(unquoted)
}

impl DesktopIntegration for X11Desktop {
    fn find_windows(
        &self,
        predicate: &WindowPredicate,
        parent: Option<WindowHandle>,
    ) -> Vec<WindowHandle> {
        let mut out = Vec::new();
        match connect() {
            Ok((conn, root)) => {
                let start = parent.map(|p| p as Window).unwrap_or(root);
                collect_matches(&conn, predicate, start, &mut out);
            }
            Err(e) => warn!("window enumeration unavailable: {e}"),
        }
        out
    }

    fn insert_render_surface(&self, title: &str) -> Result<(), EngineError> {
        let (conn, root) = connect()?;
        let surface = self
            .find_window(&WindowPredicate::titled(title), None)
            .ok_or_else(|| {
                EngineError::PlatformIntegration(format!("render surface {title:?} not found"))
            })? as Window;

        let window_type = intern(&conn, b"_NET_WM_WINDOW_TYPE")?;
        let desktop_type = intern(&conn, b"_NET_WM_WINDOW_TYPE_DESKTOP")?;

        conn.change_property32(
            PropMode::REPLACE,
            surface,
            window_type,
            AtomEnum::ATOM,
            &[desktop_type],
        )
        .map_err(|e| EngineError::PlatformIntegration(format!("set window type: {e}")))?;

        conn.reparent_window(surface, root, 0, 0)
            .map_err(|e| EngineError::PlatformIntegration(format!("reparent: {e}")))?;
        conn.configure_window(surface, &ConfigureWindowAux::new().stack_mode(StackMode::BELOW))
            .map_err(|e| EngineError::PlatformIntegration(format!("restack: {e}")))?;
        conn.flush()
            .map_err(|e| EngineError::PlatformIntegration(format!("flush: {e}")))?;

        info!("render surface placed at the bottom of the X11 stack");
        Ok(())
    }

    fn request_desktop_refresh(&self) {
        if let Ok((conn, root)) = connect() {
            let _ = conn.clear_area(true, root, 0, 0, 0, 0);
            let _ = conn.flush();
        }
    }

    fn toggle_icon_visibility(&self) {
        // Icon visibility is owned by the file manager on this platform.
        info!("icon visibility toggle is not supported on X11");
    }

    fn current_wallpaper(&self) -> Option<String> {
        gsettings_get("picture-uri")
    }

    fn set_wallpaper(&self, value: &str) -> Result<(), EngineError> {
        let uri = if value.starts_with("file://") {
            value.to_string()
        } else {
            format!("file://{value}")
        };
        let status = Command::new("gsettings")
            .args(["set", "org.gnome.desktop.background", "picture-uri", &uri])
            .status()
            .map_err(|e| EngineError::PlatformIntegration(format!("run gsettings: {e}")))?;
        if !status.success() {
            return Err(EngineError::PlatformIntegration(
                "gsettings rejected the wallpaper".to_string(),
            ));
        }
        // Dark variant exists on GNOME 42+; best effort.
        let _ = Command::new("gsettings")
            .args(["set", "org.gnome.desktop.background", "picture-uri-dark", &uri])
            .status();
        Ok(())
    }
}
