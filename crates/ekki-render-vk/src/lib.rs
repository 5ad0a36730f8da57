// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend for `ekki-render`.
//!
//! Teardown order is enforced by ownership: every resource holds an
//! `Arc<GraphicsDevice>`, and the device owns the instance and surface, so the
//! device goes last among GPU objects and the instance after it.

use anyhow::{Context, Result};
use ekki_render::{FrameSettings, RenderSize, Renderer, SwapchainPreferences};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::info;

mod backend;
mod conv;
mod depth;
mod device;
mod instance;
mod model;
mod pipeline;
mod render_system;
mod swapchain;
mod sync;

pub use backend::VkFrameBackend;
pub use depth::DepthResource;
pub use device::GraphicsDevice;
pub use instance::VulkanInstance;
pub use model::{Geometry, Mesh, Vertex};
pub use pipeline::{push_constant_range, simple_shaders, Pipeline, PUSH_CONSTANT_STAGES};
pub use render_system::SimpleRenderSystem;
pub use swapchain::SwapChain;
pub use sync::{FrameSlot, FrameSlots};

pub type VkRenderer = Renderer<VkFrameBackend>;

/// Instance, surface, device, swap chain and frame slots for `window`, wrapped
/// in a ready [`Renderer`].
pub fn create_renderer<W>(
    window: &W,
    size: RenderSize,
    settings: FrameSettings,
    prefs: SwapchainPreferences,
    app_name: &str,
) -> Result<VkRenderer>
where
    W: HasWindowHandle + HasDisplayHandle,
{
    let instance = VulkanInstance::new(window, window, app_name)?;
    let device = GraphicsDevice::new(instance).context("graphics device")?;
    info!("rendering on {}", device.name());
    let backend = VkFrameBackend::new(&device, prefs, size, settings.frames_in_flight)
        .context("swap chain and frame slots")?;
    Renderer::new(backend, settings).context("renderer")
}
