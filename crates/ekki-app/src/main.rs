// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use ekki_core::init_tracing;
use ekki_platform::AppWindow;
use ekki_render::{FrameResult, GameObject, PipelineConfig, SurfaceWindow, SwapchainPreferences};
use ekki_render_vk::{create_renderer, Geometry, Mesh, SimpleRenderSystem, VkRenderer};
use glam::{Mat4, Vec3, Vec4};
use tracing::{debug, error, info, warn};

use ekki_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::WindowId,
};

use config::{AppCfg, PresentModeCfg};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file
    #[arg(long, default_value = "ekki.toml")]
    config: PathBuf,

    /// Frames the CPU may record ahead of the GPU
    #[arg(long)]
    frames_in_flight: Option<usize>,

    /// Present mode, highest preference first; repeat to list several
    #[arg(long = "present-mode", value_enum)]
    present_mode: Vec<PresentModeCfg>,
}

fn camera(aspect: f32) -> Mat4 {
    let mut proj = Mat4::perspective_rh(50f32.to_radians(), aspect, 0.1, 100.0);
    // Vulkan clip space has +Y pointing down.
    proj.y_axis.y *= -1.0;
    let view = Mat4::look_at_rh(Vec3::new(0.0, 1.5, 4.0), Vec3::ZERO, Vec3::Y);
    proj * view
}

/// Field order is drop order: pipeline, then swap chain and frame slots,
/// then meshes. The device goes with the last `Arc`.
struct Scene {
    system: SimpleRenderSystem,
    renderer: VkRenderer,
    objects: Vec<GameObject<Mesh>>,
}

impl Scene {
    fn new(window: &AppWindow, cfg: &AppCfg) -> Result<Self> {
        let mut renderer = create_renderer(
            window,
            window.extent(),
            cfg.frame_settings(),
            cfg.swapchain_preferences(),
            &cfg.window.title,
        )?;
        renderer.set_clear_color(cfg.render.clear_color);

        let device = Arc::clone(renderer.backend().device());
        let cube = Arc::new(Mesh::new(&device, &Geometry::cube()).context("cube mesh")?);
        let triangle = Arc::new(Mesh::new(&device, &Geometry::triangle()).context("triangle mesh")?);

        let mut cube = GameObject::new(0, cube);
        cube.transform.translation = Vec3::new(0.6, 0.0, 0.0);

        let mut tri = GameObject::new(1, triangle);
        tri.transform.translation = Vec3::new(-1.4, 0.0, 0.0);
        tri.color = Vec4::new(1.0, 1.0, 1.0, 1.0);

        let system = SimpleRenderSystem::new(&renderer, PipelineConfig::default())
            .context("simple pipeline")?;

        Ok(Self {
            system,
            renderer,
            objects: vec![cube, tri],
        })
    }

    fn update(&mut self, t: f32) {
        if let Some(cube) = self.objects.first_mut() {
            cube.transform.rotation = Vec3::new(t * 0.5, t, 0.0);
        }
    }

    /// Returns whether a frame was presented.
    fn draw(&mut self, window: &mut AppWindow) -> FrameResult<bool> {
        if self.renderer.begin_frame(window)?.is_none() {
            return Ok(false);
        }
        self.system.sync_target(&mut self.renderer)?;
        self.system.set_projection_view(camera(self.renderer.aspect_ratio()));
        {
            let mut pass = self.renderer.begin_render_pass()?;
            self.system.render(&mut pass, &self.objects);
        }
        self.renderer.end_frame(window)?;
        Ok(true)
    }

    /// Applied at the next frame through a swap chain rebuild.
    fn set_preferences(&mut self, prefs: SwapchainPreferences) {
        self.renderer.backend_mut().set_preferences(prefs);
        self.renderer.request_rebuild();
    }

    /// Drain the GPU, then release in order.
    fn teardown(self) {
        let Scene {
            system,
            mut renderer,
            objects,
        } = self;
        if let Err(e) = renderer.shutdown() {
            warn!("shutdown wait failed: {e}");
        }
        let (frames, rebuilds) = (renderer.frame_count(), renderer.rebuild_count());
        drop(system);
        drop(renderer);
        drop(objects);
        info!("released after {frames} frames, {rebuilds} swap chain rebuilds");
    }
}

struct App {
    cfg: AppCfg,
    // Scene before window: the surface must not outlive the window.
    scene: Option<Scene>,
    window: Option<AppWindow>,
    fatal: Option<anyhow::Error>,
    focused: bool,

    started: Instant,
    frames: u32,
    last_fps_instant: Instant,
    exiting: bool,
}

impl App {
    fn new(cfg: AppCfg) -> Self {
        let now = Instant::now();
        Self {
            cfg,
            scene: None,
            window: None,
            fatal: None,
            focused: true,
            started: now,
            frames: 0,
            last_fps_instant: now,
            exiting: false,
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        if let Some(scene) = self.scene.take() {
            scene.teardown();
        }
        self.window = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.fatal = Some(err);
        self.shutdown(event_loop);
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = AppWindow::create(event_loop, &self.cfg.window.title, self.cfg.window_size())?;
        let scene = Scene::new(&window, &self.cfg)?;
        self.scene = Some(scene);
        self.window = Some(window);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.exiting {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e.context("renderer init"));
            return;
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = &mut self.window else {
            return;
        };
        if window_id != window.id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(new_size) => window.on_resized(new_size),

            WindowEvent::ScaleFactorChanged { .. } => window.on_scale_factor_changed(),

            WindowEvent::Focused(focused) => {
                if self.focused == focused {
                    return;
                }
                self.focused = focused;
                info!("Focused({focused})");
                if let (Some(scene), Some(prefs)) = (&mut self.scene, self.cfg.focus_preferences(focused)) {
                    debug!("present modes now {:?}", prefs.present_modes);
                    scene.set_preferences(prefs);
                }
            }

            WindowEvent::RedrawRequested => {
                if self.exiting {
                    return;
                }
                let Some(scene) = &mut self.scene else {
                    return;
                };
                scene.update(self.started.elapsed().as_secs_f32());
                match scene.draw(window) {
                    Ok(true) => self.frames = self.frames.saturating_add(1),
                    Ok(false) => {}
                    Err(e) => self.fail(event_loop, anyhow::Error::new(e).context("frame")),
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        let Some(window) = &self.window else {
            return;
        };

        if window.is_minimized() {
            event_loop.set_control_flow(ControlFlow::Wait);
        } else {
            event_loop.set_control_flow(ControlFlow::Poll);
            window.request_redraw();
        }

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            if let Some(scene) = &self.scene {
                info!(
                    "fps ~ {} ({} frames, {} rebuilds)",
                    self.frames,
                    scene.renderer.frame_count(),
                    scene.renderer.rebuild_count()
                );
            }
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (mut cfg, problem) = config::load_cfg(&args.config);
    init_tracing(cfg.log_level.as_deref());
    if let Some(problem) = problem {
        warn!("{problem}; using defaults");
    }
    cfg.apply_cli(args.frames_in_flight, &args.present_mode);
    for note in cfg.normalize() {
        warn!("{note}");
    }
    info!(
        "{} frames in flight, present modes {:?}",
        cfg.render.frames_in_flight,
        cfg.present_modes()
    );

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
