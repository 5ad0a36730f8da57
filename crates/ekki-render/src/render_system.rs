// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{EulerRot, Mat4, Quat, Vec3, Vec4};

/// Per-draw block pushed inline with the draw call.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PushConstants {
    pub transform: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl PushConstants {
    pub const SIZE: u32 = std::mem::size_of::<PushConstants>() as u32;

    pub fn new(transform: Mat4, color: Vec4) -> Self {
        Self {
            transform: transform.to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    /// Euler angles in radians, applied Y, then X, then Z.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z);
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.translation)
    }
}

pub trait Drawable {
    type Mesh;

    fn transform(&self) -> Mat4;
    fn color(&self) -> Vec4;
    fn mesh(&self) -> &Self::Mesh;
}

#[derive(Debug)]
pub struct GameObject<M> {
    pub id: u32,
    pub mesh: Arc<M>,
    pub transform: Transform,
    pub color: Vec4,
}

impl<M> GameObject<M> {
    pub fn new(id: u32, mesh: Arc<M>) -> Self {
        Self {
            id,
            mesh,
            transform: Transform::default(),
            color: Vec4::ONE,
        }
    }
}

impl<M> Drawable for GameObject<M> {
    type Mesh = M;

    fn transform(&self) -> Mat4 {
        self.transform.matrix()
    }

    fn color(&self) -> Vec4 {
        self.color
    }

    fn mesh(&self) -> &M {
        &self.mesh
    }
}

/// Records into whatever command buffer is currently open.
pub trait DrawRecorder {
    type Pipeline;
    type Mesh;

    fn bind_pipeline(&mut self, pipeline: &Self::Pipeline);
    fn push_constants(&mut self, constants: &PushConstants);
    fn draw_mesh(&mut self, mesh: &Self::Mesh);
}

#[derive(Debug)]
pub struct RenderSystem {
    projection_view: Mat4,
    last_draw_count: usize,
}

impl Default for RenderSystem {
    fn default() -> Self {
        Self {
            projection_view: Mat4::IDENTITY,
            last_draw_count: 0,
        }
    }
}

impl RenderSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_projection_view(&mut self, projection_view: Mat4) {
        self.projection_view = projection_view;
    }

    pub fn last_draw_count(&self) -> usize {
        self.last_draw_count
    }

    /// Bind `pipeline` once, then push constants and draw for every object in
    /// slice order.
    pub fn render_objects<R, D>(&mut self, recorder: &mut R, pipeline: &R::Pipeline, objects: &[D])
    where
        R: DrawRecorder,
        D: Drawable<Mesh = R::Mesh>,
    {
        recorder.bind_pipeline(pipeline);
        for object in objects {
            let constants = PushConstants::new(self.projection_view * object.transform(), object.color());
            recorder.push_constants(&constants);
            recorder.draw_mesh(object.mesh());
        }
        self.last_draw_count = objects.len();
    }
}
