// SPDX-License-Identifier: CEPL-1.0
use std::time::Duration;

use crate::error::{FrameResult, SwapChainError};
use crate::swapchain::{PresentMode, SurfaceFormat};
use crate::RenderSize;

/// Where the renderer is inside one frame.
///
/// ```text
/// Idle → FrameStarted → ImageAcquired → RecordingCommands → Submitted → Presented → Idle
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    FrameStarted,
    ImageAcquired,
    RecordingCommands,
    Submitted,
    Presented,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    Image { index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// What the renderer needs to know about the live swap chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainSummary {
    pub image_count: u32,
    pub format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub extent: RenderSize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSettings {
    /// K: how many frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
    pub fence_timeout: Duration,
    pub acquire_timeout: Duration,
    pub max_rebuild_attempts: u32,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            fence_timeout: Duration::from_secs(2),
            acquire_timeout: Duration::from_secs(2),
            max_rebuild_attempts: 3,
        }
    }
}

/// Read-only view of the window the surface belongs to.
pub trait SurfaceWindow {
    fn extent(&self) -> RenderSize;
    fn resize_pending(&self) -> bool;
    fn clear_resize_pending(&mut self);
}

/// GPU side of the frame protocol, one call per step.
///
/// `slot` is always `frame_index % K`. Slot resources are only touched by the
/// renderer that owns the backend, so no method needs interior locking.
pub trait FrameBackend {
    type CommandBuffer: Copy + std::fmt::Debug;

    fn slot_count(&self) -> usize;

    /// Block until the GPU has finished the last submission made from `slot`.
    fn wait_for_slot(&mut self, slot: usize, timeout: Duration) -> FrameResult<()>;

    /// Ask for the next presentable image; signals the slot's image-available
    /// semaphore on success.
    fn acquire_image(&mut self, slot: usize, timeout: Duration) -> FrameResult<Acquire>;

    /// Reset the slot's command buffer. Only called after
    /// [`FrameBackend::wait_for_slot`] returned and an image was acquired.
    /// The fence is left signaled so an abandoned frame never strands it.
    fn reset_slot(&mut self, slot: usize) -> FrameResult<()>;

    fn begin_commands(&mut self, slot: usize) -> FrameResult<Self::CommandBuffer>;
    fn begin_render_pass(&mut self, slot: usize, image_index: u32, clear_color: [f32; 4]);
    fn end_render_pass(&mut self, slot: usize);
    fn end_commands(&mut self, slot: usize) -> FrameResult<()>;

    /// Unsignals the slot fence immediately before queueing, then waits on
    /// image-available and signals render-finished and the slot fence.
    fn submit(&mut self, slot: usize, image_index: u32) -> FrameResult<()>;

    /// Waits on render-finished.
    fn present(&mut self, slot: usize, image_index: u32) -> FrameResult<PresentOutcome>;

    fn wait_idle(&mut self) -> FrameResult<()>;

    /// Replace the swap chain for a new window size. The old chain is handed to
    /// the new one and released only once the new one exists. On error nothing
    /// created by the attempt is left alive and the call may be retried.
    fn recreate_swapchain(&mut self, window: RenderSize) -> Result<SwapchainSummary, SwapChainError>;

    fn swapchain(&self) -> SwapchainSummary;
}
