// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use ekki_render::DeviceError;
use tracing::debug;

use crate::device::GraphicsDevice;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex {
    pub const fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self { position, color }
    }

    pub fn binding_descriptions() -> [vk::VertexInputBindingDescription; 1] {
        [vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, color) as u32,
            },
        ]
    }
}

/// CPU-side mesh data before upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    /// Unit triangle facing +Z, red/green/blue corners.
    pub fn triangle() -> Self {
        Self {
            vertices: vec![
                Vertex::new([0.0, -0.5, 0.0], [1.0, 0.0, 0.0]),
                Vertex::new([0.5, 0.5, 0.0], [0.0, 1.0, 0.0]),
                Vertex::new([-0.5, 0.5, 0.0], [0.0, 0.0, 1.0]),
            ],
            indices: Vec::new(),
        }
    }

    /// Cube of edge 1 centred on the origin, one flat color per face, four
    /// vertices per face.
    pub fn cube() -> Self {
        const FACES: [([f32; 3], [[f32; 3]; 4]); 6] = [
            // -X, +X, -Y, +Y, +Z, -Z
            (
                [0.9, 0.9, 0.9],
                [[-0.5, -0.5, -0.5], [-0.5, 0.5, 0.5], [-0.5, -0.5, 0.5], [-0.5, 0.5, -0.5]],
            ),
            (
                [0.8, 0.8, 0.1],
                [[0.5, -0.5, -0.5], [0.5, 0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, -0.5]],
            ),
            (
                [0.9, 0.6, 0.1],
                [[-0.5, -0.5, -0.5], [0.5, -0.5, 0.5], [-0.5, -0.5, 0.5], [0.5, -0.5, -0.5]],
            ),
            (
                [0.8, 0.1, 0.1],
                [[-0.5, 0.5, -0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5], [0.5, 0.5, -0.5]],
            ),
            (
                [0.1, 0.1, 0.8],
                [[-0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5], [0.5, -0.5, 0.5]],
            ),
            (
                [0.1, 0.8, 0.1],
                [[-0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [-0.5, 0.5, -0.5], [0.5, -0.5, -0.5]],
            ),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (color, corners) in FACES {
            let base = vertices.len() as u32;
            vertices.extend(corners.iter().map(|&p| Vertex::new(p, color)));
            indices.extend([0, 1, 2, 0, 3, 1].map(|i| base + i));
        }
        Self { vertices, indices }
    }

    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }
}

struct GpuBuffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    count: u32,
}

/// Device-local vertex buffer and optional index buffer.
pub struct Mesh {
    device: Arc<GraphicsDevice>,
    vertices: GpuBuffer,
    indices: Option<GpuBuffer>,
}

fn upload(
    device: &GraphicsDevice,
    bytes: &[u8],
    count: u32,
    usage: vk::BufferUsageFlags,
) -> Result<GpuBuffer, DeviceError> {
    let (buffer, memory) = device.create_buffer(
        bytes.len() as vk::DeviceSize,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    if let Err(e) = device.upload_via_staging(buffer, bytes) {
        unsafe {
            device.raw().destroy_buffer(buffer, None);
            device.raw().free_memory(memory, None);
        }
        return Err(e);
    }
    Ok(GpuBuffer {
        buffer,
        memory,
        count,
    })
}

impl Mesh {
    pub fn new(device: &Arc<GraphicsDevice>, geometry: &Geometry) -> Result<Self, DeviceError> {
        if geometry.vertices.is_empty() {
            return Err(DeviceError::Creation("mesh has no vertices".into()));
        }
        let vertices = upload(
            device,
            bytemuck::cast_slice(&geometry.vertices),
            geometry.vertices.len() as u32,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let mut mesh = Mesh {
            device: Arc::clone(device),
            vertices,
            indices: None,
        };
        if geometry.is_indexed() {
            mesh.indices = Some(upload(
                device,
                bytemuck::cast_slice(&geometry.indices),
                geometry.indices.len() as u32,
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?);
        }
        debug!(
            "mesh uploaded: {} vertices, {} indices",
            geometry.vertices.len(),
            geometry.indices.len()
        );
        Ok(mesh)
    }

    /// Bind the buffers and issue the draw into `cmd`.
    pub fn record_draw(&self, cmd: vk::CommandBuffer) {
        let d = self.device.raw();
        unsafe {
            d.cmd_bind_vertex_buffers(cmd, 0, &[self.vertices.buffer], &[0]);
            match &self.indices {
                Some(idx) => {
                    d.cmd_bind_index_buffer(cmd, idx.buffer, 0, vk::IndexType::UINT32);
                    d.cmd_draw_indexed(cmd, idx.count, 1, 0, 0, 0);
                }
                None => d.cmd_draw(cmd, self.vertices.count, 1, 0, 0),
            }
        }
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        let d = self.device.raw();
        unsafe {
            for b in std::iter::once(&self.vertices).chain(self.indices.as_ref()) {
                d.destroy_buffer(b.buffer, None);
                d.free_memory(b.memory, None);
            }
        }
    }
}
