// SPDX-License-Identifier: CEPL-1.0
use std::io::Cursor;
use std::sync::Arc;

use ash::util::read_spv;
use ash::vk;
use ekki_render::{PipelineConfig, PipelineError, PushConstants, ShaderStages};
use tracing::info;

use crate::conv;
use crate::device::GraphicsDevice;
use crate::model::Vertex;

/// SPIR-V compiled by the build script.
pub const SIMPLE_VERT_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/simple.vert.spv"));
pub const SIMPLE_FRAG_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/simple.frag.spv"));

pub fn simple_shaders() -> ShaderStages<'static> {
    ShaderStages {
        vertex: SIMPLE_VERT_SPV,
        fragment: SIMPLE_FRAG_SPV,
    }
}

pub const PUSH_CONSTANT_STAGES: vk::ShaderStageFlags =
    vk::ShaderStageFlags::from_raw(vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw());

pub fn push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: PUSH_CONSTANT_STAGES,
        offset: 0,
        size: PushConstants::SIZE,
    }
}

/// Immutable graphics pipeline and its layout.
pub struct Pipeline {
    device: Arc<GraphicsDevice>,
    layout: vk::PipelineLayout,
    handle: vk::Pipeline,
}

fn failed(what: &str) -> impl Fn(vk::Result) -> PipelineError + '_ {
    move |e| PipelineError::Creation(format!("{what}: {e:?}"))
}

unsafe fn create_module(d: &ash::Device, stage: &'static str, code: &[u8]) -> Result<vk::ShaderModule, PipelineError> {
    let words = read_spv(&mut Cursor::new(code)).map_err(|_| PipelineError::InvalidShader {
        stage,
        reason: "unreadable SPIR-V",
    })?;
    let ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: words.as_ptr(),
        code_size: words.len() * 4,
        ..Default::default()
    };
    d.create_shader_module(&ci, None)
        .map_err(failed("create_shader_module"))
}

impl Pipeline {
    /// Build a pipeline for subpass `config.subpass` of `render_pass`.
    /// Viewport and scissor are dynamic, so the pipeline survives swap chain
    /// rebuilds that only change the extent.
    pub fn new(
        device: &Arc<GraphicsDevice>,
        render_pass: vk::RenderPass,
        stages: ShaderStages<'_>,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        stages.validate()?;
        let d = device.raw();

        let layout = {
            let ranges = [push_constant_range()];
            let layout_info = vk::PipelineLayoutCreateInfo {
                s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
                push_constant_range_count: ranges.len() as u32,
                p_push_constant_ranges: ranges.as_ptr(),
                ..Default::default()
            };
            unsafe { d.create_pipeline_layout(&layout_info, None) }
                .map_err(failed("create_pipeline_layout"))?
        };

        let built = unsafe { build(d, layout, render_pass, stages, config) };
        match built {
            Ok(handle) => {
                info!(
                    "pipeline ready: {:?}, cull {:?}, depth test {}",
                    config.topology, config.cull_mode, config.depth_test
                );
                Ok(Self {
                    device: Arc::clone(device),
                    layout,
                    handle,
                })
            }
            Err(e) => {
                unsafe { d.destroy_pipeline_layout(layout, None) };
                Err(e)
            }
        }
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

/// Modules are destroyed before returning, whatever the outcome.
unsafe fn build(
    d: &ash::Device,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    stages: ShaderStages<'_>,
    config: &PipelineConfig,
) -> Result<vk::Pipeline, PipelineError> {
    let vs = create_module(d, "vertex", stages.vertex)?;
    let fs = match create_module(d, "fragment", stages.fragment) {
        Ok(fs) => fs,
        Err(e) => {
            d.destroy_shader_module(vs, None);
            return Err(e);
        }
    };

    let result = build_with_modules(d, layout, render_pass, vs, fs, config);
    d.destroy_shader_module(vs, None);
    d.destroy_shader_module(fs, None);
    result
}

unsafe fn build_with_modules(
    d: &ash::Device,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    vs: vk::ShaderModule,
    fs: vk::ShaderModule,
    config: &PipelineConfig,
) -> Result<vk::Pipeline, PipelineError> {
    let entry = c"main";
    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: vs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::FRAGMENT,
            module: fs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
    ];

    let bindings = Vertex::binding_descriptions();
    let attributes = Vertex::attribute_descriptions();
    let vertex_input = vk::PipelineVertexInputStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
        vertex_binding_description_count: bindings.len() as u32,
        p_vertex_binding_descriptions: bindings.as_ptr(),
        vertex_attribute_description_count: attributes.len() as u32,
        p_vertex_attribute_descriptions: attributes.as_ptr(),
        ..Default::default()
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        topology: conv::topology_to_vk(config.topology),
        ..Default::default()
    };

    let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
        dynamic_state_count: dyn_states.len() as u32,
        p_dynamic_states: dyn_states.as_ptr(),
        ..Default::default()
    };
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        viewport_count: 1,
        scissor_count: 1,
        ..Default::default()
    };

    let raster = vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        polygon_mode: conv::polygon_mode_to_vk(config.polygon_mode),
        cull_mode: conv::cull_mode_to_vk(config.cull_mode),
        front_face: conv::front_face_to_vk(config.front_face),
        line_width: config.line_width,
        ..Default::default()
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        rasterization_samples: vk::SampleCountFlags::TYPE_1,
        ..Default::default()
    };
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
        depth_test_enable: conv::bool32(config.depth_test),
        depth_write_enable: conv::bool32(config.depth_write),
        depth_compare_op: vk::CompareOp::LESS,
        ..Default::default()
    };

    let write_all = vk::ColorComponentFlags::R
        | vk::ColorComponentFlags::G
        | vk::ColorComponentFlags::B
        | vk::ColorComponentFlags::A;
    let color_blend_att = if config.alpha_blend {
        vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::TRUE,
            src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
            dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: write_all,
        }
    } else {
        vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::FALSE,
            color_write_mask: write_all,
            ..Default::default()
        }
    };
    let color_blend = vk::PipelineColorBlendStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_blend_att,
        ..Default::default()
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input,
        p_input_assembly_state: &input_assembly,
        p_viewport_state: &viewport_state,
        p_rasterization_state: &raster,
        p_multisample_state: &multisample,
        p_depth_stencil_state: &depth_stencil,
        p_color_blend_state: &color_blend,
        p_dynamic_state: &dynamic_state,
        layout,
        render_pass,
        subpass: config.subpass,
        ..Default::default()
    };

    match d.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None) {
        Ok(p) => Ok(p[0]),
        Err((_, err)) => Err(PipelineError::Creation(format!(
            "create_graphics_pipelines: {err:?}"
        ))),
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        let d = self.device.raw();
        unsafe {
            d.destroy_pipeline(self.handle, None);
            d.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_constants_reach_both_stages() {
        let range = push_constant_range();
        assert_eq!(range.size, 80);
        assert!(range.stage_flags.contains(vk::ShaderStageFlags::VERTEX));
        assert!(range.stage_flags.contains(vk::ShaderStageFlags::FRAGMENT));
    }

    #[test]
    fn built_in_shaders_are_valid_spirv() {
        assert!(simple_shaders().validate().is_ok());
    }
}
