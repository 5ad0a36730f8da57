// SPDX-License-Identifier: CEPL-1.0
use crate::error::PipelineError;

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrontFace {
    Clockwise,
    CounterClockwise,
}

/// Fixed-function state baked into a pipeline. Viewport and scissor are
/// always dynamic and therefore not part of it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig {
    pub topology: Topology,
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub line_width: f32,
    pub depth_test: bool,
    pub depth_write: bool,
    pub alpha_blend: bool,
    pub subpass: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topology: Topology::TriangleList,
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::None,
            front_face: FrontFace::Clockwise,
            line_width: 1.0,
            depth_test: true,
            depth_write: true,
            alpha_blend: false,
            subpass: 0,
        }
    }
}

/// SPIR-V for the two programmable stages.
#[derive(Clone, Copy, Debug)]
pub struct ShaderStages<'a> {
    pub vertex: &'a [u8],
    pub fragment: &'a [u8],
}

impl ShaderStages<'_> {
    pub fn validate(&self) -> Result<(), PipelineError> {
        check_spirv("vertex", self.vertex)?;
        check_spirv("fragment", self.fragment)
    }
}

fn check_spirv(stage: &'static str, code: &[u8]) -> Result<(), PipelineError> {
    let invalid = |reason| PipelineError::InvalidShader { stage, reason };
    if code.is_empty() {
        return Err(invalid("empty bytecode"));
    }
    if code.len() % 4 != 0 {
        return Err(invalid("bytecode length is not a multiple of 4"));
    }
    let magic = u32::from_le_bytes([code[0], code[1], code[2], code[3]]);
    if magic != SPIRV_MAGIC && magic.swap_bytes() != SPIRV_MAGIC {
        return Err(invalid("missing SPIR-V magic number"));
    }
    Ok(())
}
