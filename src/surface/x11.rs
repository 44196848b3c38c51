use std::process::{Child, Command};

use x11rb::{
    connection::{Connection, RequestConnection},
    protocol::xproto::{
        AtomEnum, ConnectionExt, CreateGCAux, CreateWindowAux, EventMask, Gcontext, ImageFormat,
        PropMode, Window, WindowClass,
    },
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
    COPY_DEPTH_FROM_PARENT,
};

use super::{RenderSurface, SURFACE_TITLE};
use crate::{errors::EngineError, info, sources::AssetDescriptor, warn};

fn intern(conn: &RustConnection, name: &[u8]) -> Option<u32> {
    conn.intern_atom(false, name)
        .ok()?
        .reply()
        .ok()
        .map(|r| r.atom)
}

pub struct X11Surface {
    conn: RustConnection,
    window: Window,
    gc: Gcontext,
    width: u16,
    height: u16,
    depth: u8,
    player: Option<Child>,
}

impl X11Surface {
    pub fn new() -> Result<Self, EngineError> {
        let (conn, screen_num) = RustConnection::connect(None)
            .map_err(|e| EngineError::PlatformIntegration(format!("X11 connect: {e}")))?;
        let screen = conn.setup().roots[screen_num].clone();

        let window = conn
            .generate_id()
            .map_err(|e| EngineError::PlatformIntegration(format!("window id: {e}")))?;
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            screen.root,
            0,
            0,
            screen.width_in_pixels,
            screen.height_in_pixels,
            0,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new()
                .background_pixel(screen.black_pixel)
                .event_mask(EventMask::EXPOSURE),
        )
        .map_err(|e| EngineError::PlatformIntegration(format!("create window: {e}")))?;

        // Both name properties, so any window manager can find us.
        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            SURFACE_TITLE.as_bytes(),
        )
        .map_err(|e| EngineError::PlatformIntegration(format!("set WM_NAME: {e}")))?;
        if let (Some(net_wm_name), Some(utf8_string)) =
            (intern(&conn, b"_NET_WM_NAME"), intern(&conn, b"UTF8_STRING"))
        {
            let _ = conn.change_property8(
                PropMode::REPLACE,
                window,
                net_wm_name,
                utf8_string,
                SURFACE_TITLE.as_bytes(),
            );
        }

        let gc = conn
            .generate_id()
            .map_err(|e| EngineError::PlatformIntegration(format!("gc id: {e}")))?;
        conn.create_gc(gc, window, &CreateGCAux::new())
            .map_err(|e| EngineError::PlatformIntegration(format!("create gc: {e}")))?;

        conn.map_window(window)
            .map_err(|e| EngineError::PlatformIntegration(format!("map window: {e}")))?;
        conn.flush()
            .map_err(|e| EngineError::PlatformIntegration(format!("flush: {e}")))?;

        info!(
            "render surface ready ({}x{})",
            screen.width_in_pixels, screen.height_in_pixels
        );
        Ok(Self {
            conn,
            window,
            gc,
            width: screen.width_in_pixels,
            height: screen.height_in_pixels,
            depth: screen.root_depth,
            player: None,
        })
    }

    fn stop_player(&mut self) {
        if let Some(mut child) = self.player.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn paint_image(&mut self, path: &std::path::Path) -> Result<(), EngineError> {
        let decoded = image::open(path)
            .map_err(|e| EngineError::Asset(format!("{}: {e}", path.display())))?
            .resize_to_fill(
                self.width as u32,
                self.height as u32,
                image::imageops::FilterType::Triangle,
            )
            .to_rgba8();

        // ZPixmap rows are BGRX on little-endian 24/32-bit visuals.
        let mut data = Vec::with_capacity(decoded.len());
        for pixel in decoded.pixels() {
            data.extend_from_slice(&[pixel[2], pixel[1], pixel[0], 0]);
        }

        let row_bytes = self.width as usize * 4;
        let max_request = self.conn.maximum_request_bytes().saturating_sub(1024);
        let rows_per_chunk = (max_request / row_bytes).clamp(1, u16::MAX as usize) as u16;

        let mut y = 0u16;
        while y < self.height {
            let rows = rows_per_chunk.min(self.height - y);
            let start = y as usize * row_bytes;
            let end = start + rows as usize * row_bytes;
            self.conn
                .put_image(
                    ImageFormat::Z_PIXMAP,
                    self.window,
                    self.gc,
                    self.width,
                    rows,
                    0,
                    y as i16,
                    0,
                    self.depth,
                    &data[start..end],
                )
                .map_err(|e| EngineError::PlatformIntegration(format!("put image: {e}")))?;
            y += rows;
        }
        self.conn
            .flush()
            .map_err(|e| EngineError::PlatformIntegration(format!("flush: {e}")))?;
        Ok(())
    }

    fn play_video(&mut self, path: &std::path::Path) -> Result<(), EngineError> {
        self.stop_player();
        let child = Command::new("mpv")
            .arg(format!("--wid={}", self.window))
            .arg("--loop=inf")
            .arg("--no-audio")
            .arg("--really-quiet")
            .arg(path)
            .spawn()
            .map_err(|e| EngineError::Asset(format!("spawn mpv: {e}")))?;
        self.player = Some(child);
        Ok(())
    }
}

impl RenderSurface for X11Surface {
    fn present(&mut self, asset: &AssetDescriptor) -> Result<(), EngineError> {
        match asset {
            AssetDescriptor::Image(path) => {
                self.stop_player();
                self.paint_image(path)
            }
            AssetDescriptor::Video(path) => self.play_video(path),
            AssetDescriptor::Page(url) => Err(EngineError::PlatformIntegration(format!(
                "page rendering is not available on X11 ({url})"
            ))),
        }
    }

    fn take_async_error(&mut self) -> Option<EngineError> {
        let child = self.player.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.player = None;
                Some(EngineError::Asset(format!("video player exited: {status}")))
            }
            Ok(None) => None,
            Err(e) => {
                warn!("could not poll the video player: {e}");
                None
            }
        }
    }

    fn clear(&mut self) {
        self.stop_player();
        let _ = self.conn.clear_area(false, self.window, 0, 0, 0, 0);
        let _ = self.conn.unmap_window(self.window);
        let _ = self.conn.flush();
    }
}

impl Drop for X11Surface {
    fn drop(&mut self) {
        self.stop_player();
    }
}
