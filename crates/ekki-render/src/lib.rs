// SPDX-License-Identifier: CEPL-1.0
//! Backend-independent half of the render core: adapter selection, swap
//! chain planning, the per-frame state machine and draw recording.
//!
//! The Vulkan crate supplies the [`FrameBackend`] and [`DrawRecorder`]
//! implementations; everything here can run against the test mock.

mod device;
mod error;
mod frame;
mod pipeline;
mod render_system;
mod renderer;
mod swapchain;

#[cfg(test)]
mod mock;

pub use device::{
    select_adapter, AdapterChoice, AdapterKind, AdapterProfile, QueueCaps, QueueFamilyIndices,
    QueueFamilyProfile,
};
pub use error::{DeviceError, FrameError, FrameResult, PipelineError, SwapChainError};
pub use frame::{
    Acquire, FrameBackend, FrameSettings, FrameState, PresentOutcome, SurfaceWindow,
    SwapchainSummary,
};
pub use pipeline::{CullMode, FrontFace, PipelineConfig, PolygonMode, ShaderStages, Topology};
pub use render_system::{
    DrawRecorder, Drawable, GameObject, PushConstants, RenderSystem, Transform,
};
pub use renderer::{ActiveFrame, RenderPassScope, Renderer};
pub use swapchain::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format,
    plan_swapchain, ColorFormat, ColorSpace, PresentMode, SurfaceCaps, SurfaceFormat,
    SurfaceSupport, SwapchainPlan, SwapchainPreferences,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Minimized windows report a zero-area size; nothing can be created for it.
    pub fn is_zero(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn clamp(self, min: RenderSize, max: RenderSize) -> RenderSize {
        RenderSize {
            width: self.width.clamp(min.width, max.width.max(min.width)),
            height: self.height.clamp(min.height, max.height.max(min.height)),
        }
    }

    pub fn aspect_ratio(self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}
