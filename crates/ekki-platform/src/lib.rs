// SPDX-License-Identifier: CEPL-1.0
//! The window the renderer presents into.

use std::sync::Arc;

use anyhow::{Context, Result};
use ekki_render::{RenderSize, SurfaceWindow};
use tracing::debug;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use winit::window::{Window, WindowId};

pub use winit;

/// Tracks the last known framebuffer size and whether it changed since the
/// swap chain was built for it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResizeTracker {
    extent: RenderSize,
    pending: bool,
}

impl ResizeTracker {
    pub fn new(extent: RenderSize) -> Self {
        Self {
            extent,
            pending: false,
        }
    }

    pub fn extent(&self) -> RenderSize {
        self.extent
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    /// Any size report marks the chain stale, even a repeat of the same size:
    /// some platforms send the final size twice around a mode switch.
    pub fn report(&mut self, extent: RenderSize) {
        self.extent = extent;
        self.pending = true;
    }

    pub fn clear(&mut self) {
        self.pending = false;
    }
}

pub struct AppWindow {
    window: Arc<Window>,
    size: ResizeTracker,
}

impl AppWindow {
    pub fn create(event_loop: &ActiveEventLoop, title: &str, size: RenderSize) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(size.width, size.height));
        let window = event_loop.create_window(attrs).context("create_window")?;
        let inner = window.inner_size();
        Ok(Self {
            window: Arc::new(window),
            size: ResizeTracker::new(RenderSize::new(inner.width, inner.height)),
        })
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn is_minimized(&self) -> bool {
        self.size.extent().is_zero() || self.window.is_minimized().unwrap_or(false)
    }

    /// Feed `WindowEvent::Resized`.
    pub fn on_resized(&mut self, size: PhysicalSize<u32>) {
        debug!("window resized to {}x{}", size.width, size.height);
        self.size.report(RenderSize::new(size.width, size.height));
    }

    /// Feed `WindowEvent::ScaleFactorChanged`; the new physical size arrives
    /// separately, so re-read it from the window.
    pub fn on_scale_factor_changed(&mut self) {
        let inner = self.window.inner_size();
        self.size.report(RenderSize::new(inner.width, inner.height));
    }
}

impl SurfaceWindow for AppWindow {
    fn extent(&self) -> RenderSize {
        self.size.extent()
    }

    fn resize_pending(&self) -> bool {
        self.size.pending()
    }

    fn clear_resize_pending(&mut self) {
        self.size.clear();
    }
}

impl HasWindowHandle for AppWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for AppWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}
