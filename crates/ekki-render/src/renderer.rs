// SPDX-License-Identifier: CEPL-1.0
use std::ops::{Deref, DerefMut};

use tracing::{debug, info, warn};

use crate::error::{FrameError, FrameResult, SwapChainError};
use crate::frame::{
    Acquire, FrameBackend, FrameSettings, FrameState, PresentOutcome, SurfaceWindow,
    SwapchainSummary,
};
use crate::RenderSize;

/// Handed out by [`Renderer::begin_frame`] for the frame being recorded.
#[derive(Clone, Copy, Debug)]
pub struct ActiveFrame<C> {
    pub command_buffer: C,
    /// Slot in `0..K`.
    pub frame_index: usize,
    /// Swap chain image; unrelated to `frame_index`.
    pub image_index: u32,
    pub extent: RenderSize,
}

/// Drives the per-frame protocol over a [`FrameBackend`] and owns it, and
/// with it the swap chain.
///
/// ```text
/// begin_frame:  wait slot fence → acquire → reset slot → begin commands
/// end_frame:    end commands → submit → present → advance slot → maybe rebuild
/// ```
pub struct Renderer<B: FrameBackend> {
    backend: B,
    settings: FrameSettings,
    state: FrameState,
    frame_index: usize,
    frame_count: u64,
    image_index: u32,
    swapchain: SwapchainSummary,
    rebuild_pending: bool,
    rebuild_after_present: bool,
    target_changed: bool,
    rebuild_count: u64,
    clear_color: [f32; 4],
}

impl<B: FrameBackend> Renderer<B> {
    pub fn new(backend: B, settings: FrameSettings) -> FrameResult<Self> {
        if settings.frames_in_flight == 0 || backend.slot_count() != settings.frames_in_flight {
            return Err(FrameError::Backend(format!(
                "backend has {} frame slots, settings ask for {}",
                backend.slot_count(),
                settings.frames_in_flight
            )));
        }
        let swapchain = backend.swapchain();
        info!(
            "renderer ready: {} frames in flight, {} swap chain images, {}x{}",
            settings.frames_in_flight,
            swapchain.image_count,
            swapchain.extent.width,
            swapchain.extent.height
        );
        Ok(Self {
            backend,
            settings,
            state: FrameState::Idle,
            frame_index: 0,
            frame_count: 0,
            image_index: 0,
            swapchain,
            rebuild_pending: false,
            rebuild_after_present: false,
            target_changed: false,
            rebuild_count: 0,
            clear_color: [0.01, 0.01, 0.01, 1.0],
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Frames presented so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    pub fn swapchain(&self) -> SwapchainSummary {
        self.swapchain
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.extent.aspect_ratio()
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    /// True once after a rebuild changed the color format; pipelines built
    /// against the old render pass must be recreated before recording.
    pub fn take_target_changed(&mut self) -> bool {
        std::mem::take(&mut self.target_changed)
    }

    /// Rebuild before the next frame, for settings that live in the swap chain
    /// (present mode).
    pub fn request_rebuild(&mut self) {
        self.rebuild_pending = true;
    }

    fn expect_state(&self, expected: FrameState) -> FrameResult<()> {
        if self.state != expected {
            return Err(FrameError::InvalidState {
                expected,
                found: self.state,
            });
        }
        Ok(())
    }

    /// Start a frame and return the command buffer to record into.
    ///
    /// `Ok(None)` means no frame can be drawn right now because the window has
    /// no area; the rebuild stays pending and is retried on the next call.
    pub fn begin_frame<W: SurfaceWindow>(
        &mut self,
        window: &mut W,
    ) -> FrameResult<Option<ActiveFrame<B::CommandBuffer>>> {
        self.expect_state(FrameState::Idle)?;

        if self.rebuild_pending && !self.rebuild(window)? {
            return Ok(None);
        }

        let slot = self.frame_index;
        self.state = FrameState::FrameStarted;
        self.backend.wait_for_slot(slot, self.settings.fence_timeout)?;

        let mut rebuilds = 0;
        let image_index = loop {
            match self.backend.acquire_image(slot, self.settings.acquire_timeout)? {
                Acquire::Image { index, suboptimal } => {
                    if suboptimal {
                        debug!("acquired image {index} from a suboptimal swap chain");
                        self.rebuild_after_present = true;
                    }
                    break index;
                }
                Acquire::OutOfDate => {
                    warn!("swap chain out of date on acquire");
                    rebuilds += 1;
                    if rebuilds > self.settings.max_rebuild_attempts {
                        self.state = FrameState::Idle;
                        return Err(FrameError::Acquire(
                            "swap chain still out of date after rebuilding".into(),
                        ));
                    }
                    self.state = FrameState::Idle;
                    if !self.rebuild(window)? {
                        return Ok(None);
                    }
                    self.state = FrameState::FrameStarted;
                }
            }
        };
        self.state = FrameState::ImageAcquired;
        self.image_index = image_index;

        self.backend.reset_slot(slot)?;
        let command_buffer = self.backend.begin_commands(slot)?;
        self.state = FrameState::RecordingCommands;

        Ok(Some(ActiveFrame {
            command_buffer,
            frame_index: slot,
            image_index,
            extent: self.swapchain.extent,
        }))
    }

    /// Open the swap chain render pass. It is closed when the returned scope
    /// is dropped, on every path.
    pub fn begin_render_pass(&mut self) -> FrameResult<RenderPassScope<'_, B>> {
        self.expect_state(FrameState::RecordingCommands)?;
        let slot = self.frame_index;
        self.backend
            .begin_render_pass(slot, self.image_index, self.clear_color);
        Ok(RenderPassScope {
            backend: &mut self.backend,
            slot,
        })
    }

    /// Finish recording, submit, present, and rebuild if the surface asked
    /// for it.
    pub fn end_frame<W: SurfaceWindow>(&mut self, window: &mut W) -> FrameResult<()> {
        self.expect_state(FrameState::RecordingCommands)?;
        let slot = self.frame_index;

        self.backend.end_commands(slot)?;
        self.backend.submit(slot, self.image_index)?;
        self.state = FrameState::Submitted;

        let outcome = self.backend.present(slot, self.image_index)?;
        self.state = FrameState::Presented;

        self.frame_index = (self.frame_index + 1) % self.settings.frames_in_flight;
        self.frame_count += 1;

        let surface_changed = match outcome {
            PresentOutcome::Presented => false,
            PresentOutcome::Suboptimal | PresentOutcome::OutOfDate => {
                warn!("present reported {outcome:?}");
                true
            }
        };
        let resized = window.resize_pending();
        let needs_rebuild =
            surface_changed || resized || std::mem::take(&mut self.rebuild_after_present);

        self.state = FrameState::Idle;
        if needs_rebuild {
            self.rebuild(window)?;
        }
        Ok(())
    }

    /// Drain the GPU and replace the swap chain. Returns `false` without
    /// touching anything while the window has no area.
    fn rebuild<W: SurfaceWindow>(&mut self, window: &mut W) -> FrameResult<bool> {
        let extent = window.extent();
        if extent.is_zero() {
            if !self.rebuild_pending {
                debug!(
                    "window is {}x{}, swap chain rebuild deferred",
                    extent.width, extent.height
                );
            }
            self.rebuild_pending = true;
            return Ok(false);
        }

        self.backend.wait_idle()?;

        let attempts = self.settings.max_rebuild_attempts.max(1);
        let mut attempt = 0;
        let summary = loop {
            attempt += 1;
            match self.backend.recreate_swapchain(window.extent()) {
                Ok(summary) => break summary,
                Err(SwapChainError::ZeroExtent { width, height }) => {
                    debug!("surface reports {width}x{height}, swap chain rebuild deferred");
                    self.rebuild_pending = true;
                    return Ok(false);
                }
                Err(e) if attempt < attempts => {
                    warn!("swap chain rebuild attempt {attempt}/{attempts} failed: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        };

        if summary.format != self.swapchain.format {
            info!(
                "swap chain format changed {:?} → {:?}",
                self.swapchain.format.format, summary.format.format
            );
            self.target_changed = true;
        }
        self.swapchain = summary;
        self.rebuild_pending = false;
        window.clear_resize_pending();
        self.rebuild_count += 1;
        info!(
            "swap chain rebuilt: {}x{}, {} images, {:?}",
            summary.extent.width, summary.extent.height, summary.image_count, summary.present_mode
        );
        Ok(true)
    }

    /// Wait for all submitted work; call before dropping the renderer.
    pub fn shutdown(&mut self) -> FrameResult<()> {
        info!("renderer shutdown after {} frames", self.frame_count);
        self.backend.wait_idle()
    }
}

/// Open render pass on the current frame's command buffer. Derefs to the
/// backend so draw recording goes through it.
pub struct RenderPassScope<'a, B: FrameBackend> {
    backend: &'a mut B,
    slot: usize,
}

impl<B: FrameBackend> Deref for RenderPassScope<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.backend
    }
}

impl<B: FrameBackend> DerefMut for RenderPassScope<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.backend
    }
}

impl<B: FrameBackend> Drop for RenderPassScope<'_, B> {
    fn drop(&mut self) {
        self.backend.end_render_pass(self.slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Event, MockBackend, ScriptedAcquire, ScriptedPresent, TestWindow};
    use crate::render_system::{GameObject, RenderSystem};
    use std::sync::Arc;

    fn renderer(slots: usize) -> Renderer<MockBackend> {
        let settings = FrameSettings {
            frames_in_flight: slots,
            ..FrameSettings::default()
        };
        Renderer::new(MockBackend::new(slots, 3), settings).unwrap()
    }

    fn draw_frame(r: &mut Renderer<MockBackend>, w: &mut TestWindow) -> bool {
        match r.begin_frame(w).unwrap() {
            Some(_) => {
                drop(r.begin_render_pass().unwrap());
                r.end_frame(w).unwrap();
                true
            }
            None => false,
        }
    }

    #[test]
    fn slot_count_must_match_settings() {
        let settings = FrameSettings {
            frames_in_flight: 3,
            ..FrameSettings::default()
        };
        assert!(Renderer::new(MockBackend::new(2, 3), settings).is_err());
    }

    #[test]
    fn frame_walks_through_every_state() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        assert_eq!(r.state(), FrameState::Idle);

        let frame = r.begin_frame(&mut w).unwrap().unwrap();
        assert_eq!(r.state(), FrameState::RecordingCommands);
        assert_eq!(frame.frame_index, 0);
        assert_eq!(frame.extent, RenderSize::new(800, 600));

        drop(r.begin_render_pass().unwrap());
        r.end_frame(&mut w).unwrap();
        assert_eq!(r.state(), FrameState::Idle);
        assert_eq!(r.frame_index(), 1);
        assert_eq!(r.frame_count(), 1);

        let slot0 = r.backend().events_for_slot(0);
        assert_eq!(
            slot0,
            vec![
                Event::WaitFence { slot: 0 },
                Event::Acquire { slot: 0, image: 0 },
                Event::ResetSlot { slot: 0 },
                Event::BeginCommands { slot: 0 },
                Event::BeginPass { slot: 0, image: 0 },
                Event::EndPass { slot: 0 },
                Event::EndCommands { slot: 0 },
                Event::Submit { slot: 0, image: 0, generation: 0 },
                Event::Present { slot: 0, image: 0 },
            ]
        );
    }

    #[test]
    fn out_of_order_calls_are_rejected() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        assert!(matches!(
            r.end_frame(&mut w),
            Err(FrameError::InvalidState { expected: FrameState::RecordingCommands, found: FrameState::Idle })
        ));
        assert!(r.begin_render_pass().is_err());

        r.begin_frame(&mut w).unwrap().unwrap();
        assert!(matches!(r.begin_frame(&mut w), Err(FrameError::InvalidState { .. })));
    }

    #[test]
    fn slot_is_reused_only_after_its_fence_signaled() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        for _ in 0..7 {
            assert!(draw_frame(&mut r, &mut w));
        }

        // The mock panics on reuse-before-completion; check the ordering too.
        let events = &r.backend().events;
        let submits: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, Event::Submit { .. }))
            .map(|(i, _)| i)
            .collect();
        let begins: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, Event::BeginCommands { .. }))
            .map(|(i, _)| i)
            .collect();
        for frame in 2..7 {
            let slot = frame % 2;
            let signal = events
                .iter()
                .enumerate()
                .position(|(i, e)| i > submits[frame - 2] && *e == Event::FenceSignaled { slot })
                .expect("fence of frame i-K never signaled");
            assert!(signal < begins[frame], "frame {frame} re-recorded before frame {} finished", frame - 2);
        }
    }

    #[test]
    fn frame_zero_fence_signals_before_frame_two_passes_its_wait() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        assert!(draw_frame(&mut r, &mut w));
        assert!(draw_frame(&mut r, &mut w));
        r.backend_mut().events.clear();

        r.begin_frame(&mut w).unwrap().unwrap();
        assert_eq!(
            &r.backend().events[..3],
            &[
                Event::WaitFence { slot: 0 },
                Event::FenceSignaled { slot: 0 },
                Event::Acquire { slot: 0, image: 2 },
            ]
        );
    }

    #[test]
    fn out_of_date_acquire_rebuilds_once_then_renders() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        assert!(draw_frame(&mut r, &mut w));

        r.backend_mut().acquire_script.push_back(ScriptedAcquire::OutOfDate);
        w.extent = RenderSize::new(1024, 768);
        let frame = r.begin_frame(&mut w).unwrap().unwrap();
        assert_eq!(frame.extent, RenderSize::new(1024, 768));
        assert_eq!(r.rebuild_count(), 1);
        assert_eq!(r.backend().recreations(), 1);

        drop(r.begin_render_pass().unwrap());
        r.end_frame(&mut w).unwrap();
        assert!(draw_frame(&mut r, &mut w));
        assert_eq!(r.rebuild_count(), 1);

        let last_submit = r
            .backend()
            .events
            .iter()
            .rev()
            .find_map(|e| match e {
                Event::Submit { generation, .. } => Some(*generation),
                _ => None,
            });
        assert_eq!(last_submit, Some(1));
    }

    #[test]
    fn out_of_date_present_rebuilds_exactly_once() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        r.backend_mut().present_script.push_back(ScriptedPresent::OutOfDate);
        assert!(draw_frame(&mut r, &mut w));
        assert_eq!(r.rebuild_count(), 1);

        assert!(draw_frame(&mut r, &mut w));
        assert!(draw_frame(&mut r, &mut w));
        assert_eq!(r.rebuild_count(), 1);
        assert_eq!(r.backend().recreations(), 1);
    }

    #[test]
    fn suboptimal_acquire_still_renders_and_rebuilds_after_present() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        r.backend_mut().acquire_script.push_back(ScriptedAcquire::Suboptimal);
        assert!(draw_frame(&mut r, &mut w));
        assert_eq!(r.frame_count(), 1);
        assert_eq!(r.rebuild_count(), 1);
        assert!(draw_frame(&mut r, &mut w));
        assert_eq!(r.rebuild_count(), 1);
    }

    #[test]
    fn suboptimal_present_rebuilds_exactly_once() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        r.backend_mut().present_script.push_back(ScriptedPresent::Suboptimal);
        assert!(draw_frame(&mut r, &mut w));
        assert_eq!(r.backend().recreations(), 1);

        assert!(draw_frame(&mut r, &mut w));
        assert_eq!(r.backend().recreations(), 1);
        assert_eq!(r.rebuild_count(), 1);
    }

    #[test]
    fn acquire_gives_up_after_max_rebuild_attempts() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        for _ in 0..4 {
            r.backend_mut().acquire_script.push_back(ScriptedAcquire::OutOfDate);
        }
        assert!(matches!(r.begin_frame(&mut w), Err(FrameError::Acquire(_))));
        assert_eq!(r.backend().recreations(), 3);
        assert_eq!(r.state(), FrameState::Idle);
    }

    #[test]
    fn fence_wait_timeout_is_reported() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        r.backend_mut().wait_timeouts = 1;
        assert!(matches!(r.begin_frame(&mut w), Err(FrameError::Timeout(_))));
        assert!(!r
            .backend()
            .events
            .iter()
            .any(|e| matches!(e, Event::Acquire { .. })));
    }

    #[test]
    fn acquire_timeout_is_reported_before_the_slot_is_touched() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        r.backend_mut().acquire_timeouts = 1;
        assert!(matches!(r.begin_frame(&mut w), Err(FrameError::Timeout(_))));
        assert!(!r.backend().events.contains(&Event::ResetSlot { slot: 0 }));
        assert!(r.backend().fence_signaled(0));
    }

    #[test]
    fn abandoned_frame_leaves_its_fence_signaled() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        assert!(draw_frame(&mut r, &mut w));
        assert!(draw_frame(&mut r, &mut w));

        r.begin_frame(&mut w).unwrap().unwrap();
        drop(r.begin_render_pass().unwrap());
        assert!(r.backend().fence_signaled(0));

        r.shutdown().unwrap();
        assert!(r.backend().fence_signaled(0));
        assert!(r.backend().fence_signaled(1));
        assert_eq!(
            r.backend()
                .events_for_slot(0)
                .iter()
                .filter(|e| matches!(e, Event::Submit { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn failed_submit_does_not_block_shutdown() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        r.backend_mut().submit_failures = 1;
        r.begin_frame(&mut w).unwrap().unwrap();
        drop(r.begin_render_pass().unwrap());
        assert!(matches!(r.end_frame(&mut w), Err(FrameError::Submit(_))));
        assert!(!r.backend().fence_signaled(0));
        r.shutdown().unwrap();
        assert_eq!(r.backend().events.last(), Some(&Event::WaitIdle));
    }

    #[test]
    fn resize_flag_triggers_rebuild_and_is_cleared() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        w.resize(1280, 720);
        assert!(draw_frame(&mut r, &mut w));
        assert!(!w.resize_pending());
        assert_eq!(r.swapchain().extent, RenderSize::new(1280, 720));
        assert_eq!(r.rebuild_count(), 1);
    }

    #[test]
    fn minimized_window_polls_without_creating_a_swap_chain() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        assert!(draw_frame(&mut r, &mut w));

        w.resize(0, 0);
        assert!(draw_frame(&mut r, &mut w));
        assert_eq!(r.backend().recreations(), 0);

        for _ in 0..5 {
            assert!(!draw_frame(&mut r, &mut w));
            assert_eq!(r.state(), FrameState::Idle);
        }
        assert_eq!(r.backend().recreations(), 0);
        assert!(!r.backend().events.contains(&Event::WaitIdle));

        w.resize(800, 600);
        assert!(draw_frame(&mut r, &mut w));
        assert_eq!(r.backend().recreations(), 1);
        assert_eq!(r.swapchain().extent, RenderSize::new(800, 600));
        assert_eq!(r.rebuild_count(), 1);
    }

    #[test]
    fn rebuild_drains_the_device_first() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        w.resize(640, 480);
        assert!(draw_frame(&mut r, &mut w));
        let events = &r.backend().events;
        let idle = events.iter().position(|e| *e == Event::WaitIdle).unwrap();
        let recreate = events
            .iter()
            .position(|e| matches!(e, Event::Recreate { .. }))
            .unwrap();
        assert!(idle < recreate);
    }

    #[test]
    fn rebuild_retries_then_gives_up() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        r.backend_mut().recreate_failures = 2;
        w.resize(900, 700);
        assert!(draw_frame(&mut r, &mut w));
        assert_eq!(r.backend().recreations(), 1);

        r.backend_mut().recreate_failures = 10;
        w.resize(1000, 700);
        let err = match r.begin_frame(&mut w).unwrap() {
            Some(_) => {
                drop(r.begin_render_pass().unwrap());
                r.end_frame(&mut w).unwrap_err()
            }
            None => panic!("window has an area"),
        };
        assert!(matches!(err, FrameError::SwapChain(SwapChainError::Creation(_))));
    }

    #[test]
    fn surface_reporting_zero_extent_defers_rebuild() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        r.backend_mut().surface_zero = true;
        r.backend_mut().acquire_script.push_back(ScriptedAcquire::OutOfDate);
        assert!(r.begin_frame(&mut w).unwrap().is_none());
        assert_eq!(r.state(), FrameState::Idle);

        r.backend_mut().surface_zero = false;
        assert!(draw_frame(&mut r, &mut w));
        assert_eq!(r.rebuild_count(), 1);
    }

    #[test]
    fn acquire_failure_is_fatal() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        r.backend_mut().acquire_script.push_back(ScriptedAcquire::Fail);
        assert!(matches!(r.begin_frame(&mut w), Err(FrameError::Acquire(_))));
    }

    #[test]
    fn present_failure_is_fatal() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        r.backend_mut().present_script.push_back(ScriptedPresent::Fail);
        r.begin_frame(&mut w).unwrap().unwrap();
        drop(r.begin_render_pass().unwrap());
        assert!(matches!(r.end_frame(&mut w), Err(FrameError::Present(_))));
    }

    #[test]
    fn format_change_is_reported_once() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        r.backend_mut().next_format = Some(crate::SurfaceFormat {
            format: crate::ColorFormat::Rgba16Float,
            color_space: crate::ColorSpace::Other(1_000_104_002),
        });
        w.resize(800, 601);
        assert!(draw_frame(&mut r, &mut w));
        assert!(r.take_target_changed());
        assert!(!r.take_target_changed());
    }

    #[test]
    fn unchanged_rebuild_keeps_count_and_format() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        let before = r.swapchain();
        r.request_rebuild();
        assert!(draw_frame(&mut r, &mut w));
        assert_eq!(r.swapchain(), before);
        assert!(!r.take_target_changed());
    }

    #[test]
    fn render_pass_scope_ends_pass_on_early_exit() {
        fn record(r: &mut Renderer<MockBackend>) -> FrameResult<()> {
            let _pass = r.begin_render_pass()?;
            Err(FrameError::Recording("mesh missing".into()))
        }

        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        r.begin_frame(&mut w).unwrap().unwrap();
        assert!(record(&mut r).is_err());
        assert_eq!(r.backend().events.last(), Some(&Event::EndPass { slot: 0 }));
        r.end_frame(&mut w).unwrap();
    }

    #[test]
    fn render_system_records_inside_the_pass() {
        let mut r = renderer(2);
        let mut w = TestWindow::new(800, 600);
        let objects = vec![
            GameObject::new(0, Arc::new("cube")),
            GameObject::new(1, Arc::new("triangle")),
        ];
        let mut system = RenderSystem::new();

        r.begin_frame(&mut w).unwrap().unwrap();
        {
            let mut pass = r.begin_render_pass().unwrap();
            system.render_objects(&mut *pass, &"simple", &objects);
        }
        r.end_frame(&mut w).unwrap();

        let slot0 = r.backend().events_for_slot(0);
        let begin = slot0.iter().position(|e| matches!(e, Event::BeginPass { .. })).unwrap();
        let end = slot0.iter().position(|e| matches!(e, Event::EndPass { .. })).unwrap();
        assert_eq!(
            &slot0[begin + 1..end],
            &[
                Event::Bind { slot: 0 },
                Event::Draw { slot: 0, mesh: "cube" },
                Event::Draw { slot: 0, mesh: "triangle" },
            ]
        );
    }
}
