// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use ash::vk;
use ekki_render::SwapChainError;

use crate::device::GraphicsDevice;

/// Depth attachment sized to the swap chain; rebuilt with it.
pub struct DepthResource {
    device: Arc<GraphicsDevice>,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl DepthResource {
    pub fn new(device: &Arc<GraphicsDevice>, extent: vk::Extent2D) -> Result<Self, SwapChainError> {
        let d = device.raw();
        let format = device.depth_format();
        let fail = |what: &str, e: vk::Result| SwapChainError::Creation(format!("depth {what}: {e:?}"));

        let img_ci = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };

        // Filled in step by step; Drop releases whatever exists if a later
        // step fails.
        let mut depth = DepthResource {
            device: Arc::clone(device),
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
        };

        unsafe {
            depth.image = d.create_image(&img_ci, None).map_err(|e| fail("image", e))?;

            let req = d.get_image_memory_requirements(depth.image);
            let memory_type_index = device
                .find_memory_type(req.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)
                .map_err(|e| SwapChainError::Creation(e.to_string()))?;
            let alloc = vk::MemoryAllocateInfo {
                s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                allocation_size: req.size,
                memory_type_index,
                ..Default::default()
            };
            depth.memory = d.allocate_memory(&alloc, None).map_err(|e| fail("memory", e))?;
            d.bind_image_memory(depth.image, depth.memory, 0)
                .map_err(|e| fail("bind", e))?;

            let view_ci = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image: depth.image,
                view_type: vk::ImageViewType::TYPE_2D,
                format,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::DEPTH,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            };
            depth.view = d.create_image_view(&view_ci, None).map_err(|e| fail("view", e))?;
        }
        Ok(depth)
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for DepthResource {
    fn drop(&mut self) {
        let d = self.device.raw();
        unsafe {
            if self.view != vk::ImageView::null() {
                d.destroy_image_view(self.view, None);
            }
            if self.image != vk::Image::null() {
                d.destroy_image(self.image, None);
            }
            if self.memory != vk::DeviceMemory::null() {
                d.free_memory(self.memory, None);
            }
        }
    }
}
