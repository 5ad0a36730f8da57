// SPDX-License-Identifier: CEPL-1.0
//! In-memory backend for driving [`crate::Renderer`] without a GPU.
//!
//! Fences are modelled per slot: a submit leaves the slot pending until the
//! next wait on it, and a fence reset by a failed submit never signals again.
//! Misuse of the protocol (recording into a slot the GPU may
//! still read, submitting an image from a destroyed swap chain) panics.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{FrameError, FrameResult, SwapChainError};
use crate::frame::{
    Acquire, FrameBackend, PresentOutcome, SurfaceWindow, SwapchainSummary,
};
use crate::render_system::{DrawRecorder, PushConstants};
use crate::swapchain::{ColorFormat, ColorSpace, PresentMode, SurfaceFormat};
use crate::RenderSize;

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    WaitFence { slot: usize },
    FenceSignaled { slot: usize },
    Acquire { slot: usize, image: u32 },
    ResetSlot { slot: usize },
    BeginCommands { slot: usize },
    BeginPass { slot: usize, image: u32 },
    EndPass { slot: usize },
    EndCommands { slot: usize },
    Submit { slot: usize, image: u32, generation: u32 },
    Present { slot: usize, image: u32 },
    Bind { slot: usize },
    Draw { slot: usize, mesh: &'static str },
    WaitIdle,
    Recreate { width: u32, height: u32 },
}

impl Event {
    fn slot(&self) -> Option<usize> {
        match *self {
            Event::WaitFence { slot }
            | Event::FenceSignaled { slot }
            | Event::Acquire { slot, .. }
            | Event::ResetSlot { slot }
            | Event::BeginCommands { slot }
            | Event::BeginPass { slot, .. }
            | Event::EndPass { slot }
            | Event::EndCommands { slot }
            | Event::Submit { slot, .. }
            | Event::Present { slot, .. }
            | Event::Bind { slot }
            | Event::Draw { slot, .. } => Some(slot),
            Event::WaitIdle | Event::Recreate { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ScriptedAcquire {
    OutOfDate,
    Suboptimal,
    Fail,
}

#[derive(Clone, Copy, Debug)]
pub enum ScriptedPresent {
    OutOfDate,
    Suboptimal,
    Fail,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Fence {
    #[default]
    Signaled,
    /// Submitted work the next wait completes.
    Pending,
    /// Reset with nothing queued to signal it.
    Unsignaled,
}

#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    fence: Fence,
    reset: bool,
    recording: bool,
    /// Swap chain generation of the image acquired into this slot.
    acquired: Option<u32>,
}

pub struct MockBackend {
    pub events: Vec<Event>,
    pub acquire_script: VecDeque<ScriptedAcquire>,
    pub present_script: VecDeque<ScriptedPresent>,
    /// Number of upcoming `recreate_swapchain` calls that fail.
    pub recreate_failures: u32,
    /// Number of upcoming `submit` calls that fail after resetting the fence.
    pub submit_failures: u32,
    /// Number of upcoming fence waits that time out.
    pub wait_timeouts: u32,
    /// Number of upcoming image acquisitions that time out.
    pub acquire_timeouts: u32,
    /// Surface reports a zero extent whatever the window says.
    pub surface_zero: bool,
    /// Format the next successful recreation switches to.
    pub next_format: Option<SurfaceFormat>,
    pub pushes: usize,
    slots: Vec<Slot>,
    summary: SwapchainSummary,
    generation: u32,
    next_image: u32,
    recording: Option<usize>,
}

impl MockBackend {
    pub fn new(slots: usize, image_count: u32) -> Self {
        Self {
            events: Vec::new(),
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            recreate_failures: 0,
            submit_failures: 0,
            wait_timeouts: 0,
            acquire_timeouts: 0,
            surface_zero: false,
            next_format: None,
            pushes: 0,
            slots: vec![Slot::default(); slots],
            summary: SwapchainSummary {
                image_count,
                format: SurfaceFormat {
                    format: ColorFormat::Bgra8Srgb,
                    color_space: ColorSpace::SrgbNonlinear,
                },
                present_mode: PresentMode::Fifo,
                extent: RenderSize::new(800, 600),
            },
            generation: 0,
            next_image: 0,
            recording: None,
        }
    }

    /// Successful swap chain recreations so far.
    pub fn recreations(&self) -> u32 {
        self.generation
    }

    /// Whether the slot's fence would let a host wait through.
    pub fn fence_signaled(&self, slot: usize) -> bool {
        self.slots[slot].fence != Fence::Unsignaled
    }

    pub fn events_for_slot(&self, slot: usize) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| e.slot() == Some(slot))
            .cloned()
            .collect()
    }

    fn next_image(&mut self) -> u32 {
        let image = self.next_image % self.summary.image_count;
        self.next_image = self.next_image.wrapping_add(1);
        image
    }

    fn recording_slot(&self) -> usize {
        match self.recording {
            Some(slot) => slot,
            None => panic!("draw recorded outside a command buffer"),
        }
    }
}

impl FrameBackend for MockBackend {
    type CommandBuffer = usize;

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn wait_for_slot(&mut self, slot: usize, _timeout: Duration) -> FrameResult<()> {
        self.events.push(Event::WaitFence { slot });
        if self.wait_timeouts > 0 {
            self.wait_timeouts -= 1;
            return Err(FrameError::Timeout("frame slot fence"));
        }
        match self.slots[slot].fence {
            Fence::Signaled => {}
            Fence::Pending => {
                self.slots[slot].fence = Fence::Signaled;
                self.events.push(Event::FenceSignaled { slot });
            }
            Fence::Unsignaled => return Err(FrameError::Timeout("frame slot fence")),
        }
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize, _timeout: Duration) -> FrameResult<Acquire> {
        if self.acquire_timeouts > 0 {
            self.acquire_timeouts -= 1;
            return Err(FrameError::Timeout("swap chain image"));
        }
        let suboptimal = match self.acquire_script.pop_front() {
            Some(ScriptedAcquire::OutOfDate) => return Ok(Acquire::OutOfDate),
            Some(ScriptedAcquire::Fail) => {
                return Err(FrameError::Acquire("device lost".into()));
            }
            Some(ScriptedAcquire::Suboptimal) => true,
            None => false,
        };
        let index = self.next_image();
        self.slots[slot].acquired = Some(self.generation);
        self.events.push(Event::Acquire { slot, image: index });
        Ok(Acquire::Image { index, suboptimal })
    }

    fn reset_slot(&mut self, slot: usize) -> FrameResult<()> {
        let s = &mut self.slots[slot];
        assert_eq!(s.fence, Fence::Signaled, "slot {slot} reset while the GPU still owns it");
        assert!(s.acquired.is_some(), "slot {slot} reset without an acquired image");
        s.reset = true;
        self.events.push(Event::ResetSlot { slot });
        Ok(())
    }

    fn begin_commands(&mut self, slot: usize) -> FrameResult<usize> {
        let s = &mut self.slots[slot];
        assert!(s.reset && s.fence == Fence::Signaled, "slot {slot} recorded before its fence signaled");
        s.reset = false;
        s.recording = true;
        self.recording = Some(slot);
        self.events.push(Event::BeginCommands { slot });
        Ok(slot)
    }

    fn begin_render_pass(&mut self, slot: usize, image_index: u32, _clear_color: [f32; 4]) {
        assert!(self.slots[slot].recording);
        self.events.push(Event::BeginPass { slot, image: image_index });
    }

    fn end_render_pass(&mut self, slot: usize) {
        self.events.push(Event::EndPass { slot });
    }

    fn end_commands(&mut self, slot: usize) -> FrameResult<()> {
        self.slots[slot].recording = false;
        self.recording = None;
        self.events.push(Event::EndCommands { slot });
        Ok(())
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> FrameResult<()> {
        let generation = self.slots[slot].acquired.take();
        assert_eq!(
            generation,
            Some(self.generation),
            "image {image_index} belongs to a destroyed swap chain"
        );
        assert_eq!(self.slots[slot].fence, Fence::Signaled, "slot {slot} submitted twice");
        self.slots[slot].fence = Fence::Unsignaled;
        if self.submit_failures > 0 {
            self.submit_failures -= 1;
            return Err(FrameError::Submit("ERROR_DEVICE_LOST".into()));
        }
        self.slots[slot].fence = Fence::Pending;
        self.events.push(Event::Submit {
            slot,
            image: image_index,
            generation: self.generation,
        });
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> FrameResult<PresentOutcome> {
        self.events.push(Event::Present { slot, image: image_index });
        match self.present_script.pop_front() {
            Some(ScriptedPresent::OutOfDate) => Ok(PresentOutcome::OutOfDate),
            Some(ScriptedPresent::Suboptimal) => Ok(PresentOutcome::Suboptimal),
            Some(ScriptedPresent::Fail) => Err(FrameError::Present("surface lost".into())),
            None => Ok(PresentOutcome::Presented),
        }
    }

    fn wait_idle(&mut self) -> FrameResult<()> {
        for s in &mut self.slots {
            if s.fence == Fence::Pending {
                s.fence = Fence::Signaled;
            }
        }
        self.events.push(Event::WaitIdle);
        Ok(())
    }

    fn recreate_swapchain(&mut self, window: RenderSize) -> Result<SwapchainSummary, SwapChainError> {
        if self.surface_zero {
            return Err(SwapChainError::ZeroExtent { width: 0, height: 0 });
        }
        if self.recreate_failures > 0 {
            self.recreate_failures -= 1;
            return Err(SwapChainError::Creation("ERROR_OUT_OF_DEVICE_MEMORY".into()));
        }
        self.events.push(Event::Recreate {
            width: window.width,
            height: window.height,
        });
        self.generation += 1;
        self.next_image = 0;
        for s in &mut self.slots {
            s.acquired = None;
        }
        self.summary.extent = window;
        if let Some(format) = self.next_format.take() {
            self.summary.format = format;
        }
        Ok(self.summary)
    }

    fn swapchain(&self) -> SwapchainSummary {
        self.summary
    }
}

impl DrawRecorder for MockBackend {
    type Pipeline = &'static str;
    type Mesh = &'static str;

    fn bind_pipeline(&mut self, _pipeline: &&'static str) {
        let slot = self.recording_slot();
        self.events.push(Event::Bind { slot });
    }

    fn push_constants(&mut self, _constants: &PushConstants) {
        self.pushes += 1;
    }

    fn draw_mesh(&mut self, mesh: &&'static str) {
        let slot = self.recording_slot();
        self.events.push(Event::Draw { slot, mesh: *mesh });
    }
}

/// Window stand-in with a settable extent and resize flag.
pub struct TestWindow {
    pub extent: RenderSize,
    resized: bool,
}

impl TestWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: RenderSize::new(width, height),
            resized: false,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.extent = RenderSize::new(width, height);
        self.resized = true;
    }
}

impl SurfaceWindow for TestWindow {
    fn extent(&self) -> RenderSize {
        self.extent
    }

    fn resize_pending(&self) -> bool {
        self.resized
    }

    fn clear_resize_pending(&mut self) {
        self.resized = false;
    }
}
