// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use ekki_render::{
    Acquire, DrawRecorder, FrameBackend, FrameError, FrameResult, PresentOutcome, PushConstants,
    RenderSize, SwapChainError, SwapchainPreferences, SwapchainSummary,
};
use tracing::{debug, info};

use crate::device::GraphicsDevice;
use crate::model::Mesh;
use crate::pipeline::{Pipeline, PUSH_CONSTANT_STAGES};
use crate::swapchain::SwapChain;
use crate::sync::FrameSlots;

fn nanos(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}

/// Vulkan side of the frame protocol: owns the swap chain and the K frame
/// slots, and records draws into the slot currently being recorded.
pub struct VkFrameBackend {
    slots: FrameSlots,
    /// `None` only after a failed recreation retired the previous chain.
    swapchain: Option<SwapChain>,
    summary: SwapchainSummary,
    prefs: SwapchainPreferences,
    device: Arc<GraphicsDevice>,
    recording: Option<vk::CommandBuffer>,
    bound_layout: vk::PipelineLayout,
}

impl VkFrameBackend {
    pub fn new(
        device: &Arc<GraphicsDevice>,
        prefs: SwapchainPreferences,
        window: RenderSize,
        frames_in_flight: usize,
    ) -> FrameResult<Self> {
        let swapchain = SwapChain::new(device, &prefs, window, frames_in_flight, None)?;
        let slots = FrameSlots::new(device, frames_in_flight)?;
        info!("{} frame slots allocated", slots.len());
        Ok(Self {
            slots,
            summary: swapchain.summary(),
            swapchain: Some(swapchain),
            prefs,
            device: Arc::clone(device),
            recording: None,
            bound_layout: vk::PipelineLayout::null(),
        })
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Render pass of the live swap chain; pipelines are built against it.
    pub fn render_pass(&self) -> Option<vk::RenderPass> {
        self.swapchain.as_ref().map(SwapChain::render_pass)
    }

    /// Takes effect on the next swap chain rebuild.
    pub fn set_preferences(&mut self, prefs: SwapchainPreferences) {
        self.prefs = prefs;
    }

    fn cmd(&self) -> vk::CommandBuffer {
        self.recording.unwrap_or(vk::CommandBuffer::null())
    }
}

impl FrameBackend for VkFrameBackend {
    type CommandBuffer = vk::CommandBuffer;

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn wait_for_slot(&mut self, slot: usize, timeout: Duration) -> FrameResult<()> {
        let fence = self.slots.get(slot).in_flight;
        match unsafe { self.device.raw().wait_for_fences(&[fence], true, nanos(timeout)) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(FrameError::Timeout("frame slot fence")),
            Err(e) => Err(FrameError::Backend(format!("wait_for_fences: {e:?}"))),
        }
    }

    fn acquire_image(&mut self, slot: usize, timeout: Duration) -> FrameResult<Acquire> {
        let Some(chain) = &self.swapchain else {
            return Ok(Acquire::OutOfDate);
        };
        let semaphore = self.slots.get(slot).image_available;
        let result = unsafe {
            chain
                .loader()
                .acquire_next_image(chain.handle(), nanos(timeout), semaphore, vk::Fence::null())
        };
        match result {
            Ok((index, suboptimal)) => Ok(Acquire::Image { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::OutOfDate),
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => {
                Err(FrameError::Timeout("swap chain image"))
            }
            Err(e) => Err(FrameError::Acquire(format!("acquire_next_image: {e:?}"))),
        }
    }

    fn reset_slot(&mut self, slot: usize) -> FrameResult<()> {
        let cmd = self.slots.get(slot).command_buffer;
        unsafe {
            self.device
                .raw()
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
        }
        .map_err(|e| FrameError::Recording(format!("reset_command_buffer: {e:?}")))
    }

    fn begin_commands(&mut self, slot: usize) -> FrameResult<vk::CommandBuffer> {
        let cmd = self.slots.get(slot).command_buffer;
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        unsafe { self.device.raw().begin_command_buffer(cmd, &begin) }
            .map_err(|e| FrameError::Recording(format!("begin_command_buffer: {e:?}")))?;
        self.recording = Some(cmd);
        Ok(cmd)
    }

    fn begin_render_pass(&mut self, slot: usize, image_index: u32, clear_color: [f32; 4]) {
        let Some(chain) = &self.swapchain else {
            return;
        };
        let cmd = self.slots.get(slot).command_buffer;
        let extent = chain.extent();
        let clears = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: chain.render_pass(),
            framebuffer: chain.framebuffer(image_index),
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let d = self.device.raw();
        unsafe {
            d.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
            d.cmd_set_viewport(cmd, 0, &[viewport]);
            d.cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }

    fn end_render_pass(&mut self, slot: usize) {
        let cmd = self.slots.get(slot).command_buffer;
        unsafe { self.device.raw().cmd_end_render_pass(cmd) };
        self.bound_layout = vk::PipelineLayout::null();
    }

    fn end_commands(&mut self, slot: usize) -> FrameResult<()> {
        let cmd = self.slots.get(slot).command_buffer;
        self.recording = None;
        unsafe { self.device.raw().end_command_buffer(cmd) }
            .map_err(|e| FrameError::Recording(format!("end_command_buffer: {e:?}")))
    }

    fn submit(&mut self, slot: usize, _image_index: u32) -> FrameResult<()> {
        let s = self.slots.get(slot);
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &s.image_available,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &s.command_buffer,
            signal_semaphore_count: 1,
            p_signal_semaphores: &s.render_finished,
            ..Default::default()
        };
        let d = self.device.raw();
        // Unsignal only once the submit that signals it again is next.
        unsafe { d.reset_fences(&[s.in_flight]) }
            .map_err(|e| FrameError::Submit(format!("reset_fences: {e:?}")))?;
        unsafe {
            d.queue_submit(
                self.device.graphics_queue(),
                std::slice::from_ref(&submit),
                s.in_flight,
            )
        }
        .map_err(|e| FrameError::Submit(format!("queue_submit: {e:?}")))
    }

    fn present(&mut self, slot: usize, image_index: u32) -> FrameResult<PresentOutcome> {
        let Some(chain) = &self.swapchain else {
            return Ok(PresentOutcome::OutOfDate);
        };
        let s = self.slots.get(slot);
        let handle = chain.handle();
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &s.render_finished,
            swapchain_count: 1,
            p_swapchains: &handle,
            p_image_indices: &image_index,
            ..Default::default()
        };
        match unsafe { chain.loader().queue_present(self.device.present_queue(), &present) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(FrameError::Present(format!("queue_present: {e:?}"))),
        }
    }

    fn wait_idle(&mut self) -> FrameResult<()> {
        self.device
            .wait_idle()
            .map_err(|e| FrameError::Backend(format!("device_wait_idle: {e:?}")))
    }

    // STRICT ORDER:
    // 1) plan against the surface (no side effects, ZeroExtent keeps the old chain)
    // 2) create the new chain with the old one as `old_swapchain`
    // 3) destroy the old chain, whether or not 2) succeeded
    fn recreate_swapchain(&mut self, window: RenderSize) -> Result<SwapchainSummary, SwapChainError> {
        let plan = SwapChain::plan(&self.device, &self.prefs, window, self.slots.len())?;

        let previous = self.swapchain.take();
        let created = SwapChain::create(&self.device, &plan, previous.as_ref());
        drop(previous);

        let chain = created?;
        self.summary = chain.summary();
        self.swapchain = Some(chain);
        debug!("swap chain replaced: {:?}", self.summary);
        Ok(self.summary)
    }

    fn swapchain(&self) -> SwapchainSummary {
        self.summary
    }
}

impl DrawRecorder for VkFrameBackend {
    type Pipeline = Pipeline;
    type Mesh = Mesh;

    fn bind_pipeline(&mut self, pipeline: &Pipeline) {
        let cmd = self.cmd();
        unsafe {
            self.device
                .raw()
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.handle())
        };
        self.bound_layout = pipeline.layout();
    }

    fn push_constants(&mut self, constants: &PushConstants) {
        unsafe {
            self.device.raw().cmd_push_constants(
                self.cmd(),
                self.bound_layout,
                PUSH_CONSTANT_STAGES,
                0,
                bytemuck::bytes_of(constants),
            )
        };
    }

    fn draw_mesh(&mut self, mesh: &Mesh) {
        mesh.record_draw(self.cmd());
    }
}

impl Drop for VkFrameBackend {
    fn drop(&mut self) {
        self.device.wait_idle().ok();
    }
}
