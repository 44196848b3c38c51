use std::{
    fs,
    path::PathBuf,
    sync::{mpsc, OnceLock},
};

use webview2_com::Microsoft::Web::WebView2::Win32::*;
use webview2_com::NavigationCompletedEventHandler;
use windows::{
    core::{Interface, BOOL, PCWSTR},
    Win32::{
        Foundation::{E_POINTER, HINSTANCE, HWND, LPARAM, LRESULT, RECT, WPARAM},
        System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED},
        System::LibraryLoader::GetModuleHandleW,
        UI::WindowsAndMessaging::{
            CreateWindowExW, DefWindowProcW, GetSystemMetrics, RegisterClassW, SM_CXSCREEN,
            SM_CYSCREEN, WINDOW_EX_STYLE, WINDOW_STYLE, WNDCLASSW, WS_CLIPCHILDREN,
            WS_CLIPSIBLINGS, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_POPUP, WS_VISIBLE,
        },
    },
};

use super::{image_wrapper_html, video_wrapper_html, RenderSurface, SURFACE_TITLE};
use crate::{
    errors::EngineError,
    info,
    sources::AssetDescriptor,
    utility::{cache_dir, path_to_file_url, to_wstring},
    warn,
};

const HOST_CLASS_NAME: PCWSTR = windows::core::w!("MuralisHostWindow");

pub struct WebViewSurface {
    controller: ICoreWebView2Controller,
    webview: ICoreWebView2,
    error_rx: mpsc::Receiver<EngineError>,
    wrapper_path: PathBuf,
}

impl WebViewSurface {
    pub fn new() -> Result<Self, EngineError> {
        unsafe {
            let _ = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
        }
        ensure_host_class()?;

        let (width, height) = unsafe {
            (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN))
        };
        let hwnd = create_surface_window(width, height)?;
        let controller = create_webview_controller(hwnd, width, height)?;
        let webview = unsafe {
            controller
                .CoreWebView2()
                .map_err(|e| EngineError::PlatformIntegration(format!("CoreWebView2: {e:?}")))?
        };

        let (error_tx, error_rx) = mpsc::channel();
        register_navigation_watch(&webview, error_tx)?;

        info!("render surface ready ({width}x{height})");
        Ok(Self {
            controller,
            webview,
            error_rx,
            wrapper_path: cache_dir().join("wrapper.html"),
        })
    }

    fn navigate(&self, url: &str) -> Result<(), EngineError> {
        let wide = to_wstring(url);
        unsafe {
            self.webview
                .Navigate(PCWSTR(wide.as_ptr()))
                .map_err(|e| EngineError::Asset(format!("navigate to {url}: {e:?}")))
        }
    }

    /// Local assets go through a generated wrapper page so they scale to
    /// fill the screen, aspect-preserving and center-cropped.
    fn navigate_wrapped(&self, html: &str) -> Result<(), EngineError> {
        if let Some(parent) = self.wrapper_path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        fs::write(&self.wrapper_path, html)
            .map_err(|e| EngineError::Asset(format!("write wrapper page: {e}")))?;
        self.navigate(&path_to_file_url(&self.wrapper_path))
    }

    fn set_muted(&self) {
        // Muting arrived with a later runtime interface; degrade quietly
        // on machines that predate it.
        match self.webview.cast::<ICoreWebView2_8>() {
            Ok(webview) => unsafe {
                if let Err(e) = webview.SetIsMuted(true) {
                    warn!("could not mute the page: {e:?}");
                }
            },
            Err(_) => warn!("runtime too old to mute pages"),
        }
    }
}

impl RenderSurface for WebViewSurface {
    fn present(&mut self, asset: &AssetDescriptor) -> Result<(), EngineError> {
        match asset {
            AssetDescriptor::Image(path) => {
                self.navigate_wrapped(&image_wrapper_html(&path_to_file_url(path)))
            }
            AssetDescriptor::Video(path) => {
                self.navigate_wrapped(&video_wrapper_html(&path_to_file_url(path)))
            }
            AssetDescriptor::Page(url) => {
                self.navigate(url)?;
                self.set_muted();
                Ok(())
            }
        }
    }

    fn take_async_error(&mut self) -> Option<EngineError> {
        self.error_rx.try_recv().ok()
    }

    fn clear(&mut self) {
        if let Err(e) = self.navigate("about:blank") {
            warn!("could not clear the surface: {e}");
        }
        unsafe {
            let _ = self.controller.SetIsVisible(false);
        }
    }
}

fn ensure_host_class() -> Result<(), EngineError> {
    static CLASS_ONCE: OnceLock<bool> = OnceLock::new();
    if CLASS_ONCE.get().is_some() {
        return Ok(());
    }

    let hinstance = module_instance()?;
    let wc = WNDCLASSW {
        lpfnWndProc: Some(host_window_proc),
        hInstance: hinstance,
        lpszClassName: HOST_CLASS_NAME,
        ..Default::default()
    };
    unsafe {
        let _ = RegisterClassW(&wc);
    }
    let _ = CLASS_ONCE.set(true);
    Ok(())
}

unsafe extern "system" fn host_window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

fn module_instance() -> Result<HINSTANCE, EngineError> {
    unsafe {
        GetModuleHandleW(None)
            .map(|h| HINSTANCE(h.0))
            .map_err(|e| EngineError::PlatformIntegration(format!("GetModuleHandleW: {e:?}")))
    }
}

fn create_surface_window(width: i32, height: i32) -> Result<HWND, EngineError> {
    let style = WINDOW_STYLE((WS_POPUP | WS_VISIBLE | WS_CLIPSIBLINGS | WS_CLIPCHILDREN).0);
    let ex_style = WINDOW_EX_STYLE((WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE).0);
    let hinstance = module_instance()?;
    let title = to_wstring(SURFACE_TITLE);

    unsafe {
        CreateWindowExW(
            ex_style,
            HOST_CLASS_NAME,
            PCWSTR(title.as_ptr()),
            style,
            0,
            0,
            width,
            height,
            None,
            None,
            Some(hinstance),
            None,
        )
        .map_err(|e| EngineError::PlatformIntegration(format!("CreateWindowExW: {e:?}")))
    }
}

fn create_webview_controller(
    hwnd: HWND,
    width: i32,
    height: i32,
) -> Result<ICoreWebView2Controller, EngineError> {
    let environment = {
        let (tx, rx) = mpsc::channel();

        webview2_com::CreateCoreWebView2EnvironmentCompletedHandler::wait_for_async_operation(
            Box::new(|handler| unsafe {
                CreateCoreWebView2Environment(&handler).map_err(webview2_com::Error::WindowsError)
            }),
            Box::new(move |error_code, environment| {
                error_code?;
                tx.send(environment.ok_or_else(|| windows::core::Error::from(E_POINTER)))
                    .expect("send WebView2 environment");
                Ok(())
            }),
        )
        .map_err(|e| EngineError::PlatformIntegration(format!("WebView2 environment: {e:?}")))?;

        rx.recv()
            .map_err(|_| EngineError::PlatformIntegration("WebView2 environment lost".to_string()))?
            .map_err(|e| EngineError::PlatformIntegration(format!("WebView2 environment: {e:?}")))?
    };

    let controller = {
        let (tx, rx) = mpsc::channel();

        webview2_com::CreateCoreWebView2ControllerCompletedHandler::wait_for_async_operation(
            Box::new(move |handler| unsafe {
                environment
                    .CreateCoreWebView2Controller(hwnd, &handler)
                    .map_err(webview2_com::Error::WindowsError)
            }),
            Box::new(move |error_code, controller| {
                error_code?;
                tx.send(controller.ok_or_else(|| windows::core::Error::from(E_POINTER)))
                    .expect("send WebView2 controller");
                Ok(())
            }),
        )
        .map_err(|e| EngineError::PlatformIntegration(format!("WebView2 controller: {e:?}")))?;

        rx.recv()
            .map_err(|_| EngineError::PlatformIntegration("WebView2 controller lost".to_string()))?
            .map_err(|e| EngineError::PlatformIntegration(format!("WebView2 controller: {e:?}")))?
    };

    unsafe {
        controller
            .SetBounds(RECT {
                left: 0,
                top: 0,
                right: width,
                bottom: height,
            })
            .map_err(|e| EngineError::PlatformIntegration(format!("SetBounds: {e:?}")))?;
        controller
            .SetIsVisible(true)
            .map_err(|e| EngineError::PlatformIntegration(format!("SetIsVisible: {e:?}")))?;
    }

    Ok(controller)
}

fn register_navigation_watch(
    webview: &ICoreWebView2,
    error_tx: mpsc::Sender<EngineError>,
) -> Result<(), EngineError> {
    let handler = NavigationCompletedEventHandler::create(Box::new(move |_, args| {
        if let Some(args) = args {
            let mut success = BOOL(0);
            unsafe {
                args.IsSuccess(&mut success)?;
            }
            if !success.as_bool() {
                let mut status = COREWEBVIEW2_WEB_ERROR_STATUS_UNKNOWN;
                unsafe {
                    args.WebErrorStatus(&mut status)?;
                }
                let _ = error_tx.send(EngineError::Asset(format!(
                    "navigation failed with status {}",
                    status.0
                )));
            }
        }
        Ok(())
    }));

    let mut token = EventRegistrationToken::default();
    unsafe {
        webview
            .add_NavigationCompleted(&handler, &mut token)
            .map_err(|e| EngineError::PlatformIntegration(format!("NavigationCompleted: {e:?}")))
    }
}
