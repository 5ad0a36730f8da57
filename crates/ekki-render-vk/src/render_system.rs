// SPDX-License-Identifier: CEPL-1.0
use ekki_render::{
    Drawable, FrameError, FrameResult, PipelineConfig, PipelineError, RenderPassScope, RenderSystem,
    Renderer,
};
use glam::Mat4;
use tracing::info;

use crate::backend::VkFrameBackend;
use crate::model::Mesh;
use crate::pipeline::{simple_shaders, Pipeline};

/// The flat-colored mesh pass: one pipeline, one push constant block per
/// object.
pub struct SimpleRenderSystem {
    system: RenderSystem,
    config: PipelineConfig,
    pipeline: Pipeline,
}

fn build(backend: &VkFrameBackend, config: &PipelineConfig) -> Result<Pipeline, PipelineError> {
    let render_pass = backend
        .render_pass()
        .ok_or_else(|| PipelineError::Creation("no live swap chain render pass".into()))?;
    Pipeline::new(backend.device(), render_pass, simple_shaders(), config)
}

impl SimpleRenderSystem {
    pub fn new(renderer: &Renderer<VkFrameBackend>, config: PipelineConfig) -> Result<Self, PipelineError> {
        let pipeline = build(renderer.backend(), &config)?;
        Ok(Self {
            system: RenderSystem::new(),
            config,
            pipeline,
        })
    }

    /// Rebuild the pipeline if the last swap chain rebuild changed the color
    /// format. Call after `begin_frame`, before opening the render pass.
    pub fn sync_target(&mut self, renderer: &mut Renderer<VkFrameBackend>) -> FrameResult<()> {
        if !renderer.take_target_changed() {
            return Ok(());
        }
        // The renderer drained the device before rebuilding, so the old
        // pipeline is not referenced by any pending submission.
        let pipeline = build(renderer.backend(), &self.config).map_err(FrameError::from)?;
        self.pipeline = pipeline;
        info!("pipeline rebuilt for the new render target");
        Ok(())
    }

    pub fn set_projection_view(&mut self, projection_view: Mat4) {
        self.system.set_projection_view(projection_view);
    }

    pub fn render<D>(&mut self, pass: &mut RenderPassScope<'_, VkFrameBackend>, objects: &[D])
    where
        D: Drawable<Mesh = Mesh>,
    {
        self.system.render_objects(&mut **pass, &self.pipeline, objects);
    }

    pub fn last_draw_count(&self) -> usize {
        self.system.last_draw_count()
    }
}
