// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use ash::khr::swapchain;
use ash::vk;
use ekki_render::{
    plan_swapchain, RenderSize, SwapChainError, SwapchainPlan, SwapchainPreferences,
    SwapchainSummary,
};
use tracing::{debug, info};

use crate::conv;
use crate::depth::DepthResource;
use crate::device::GraphicsDevice;

/// Presentable images with their views and framebuffers, the render pass they
/// were built for, and the shared depth attachment.
pub struct SwapChain {
    device: Arc<GraphicsDevice>,
    loader: swapchain::Device,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    /// Attached to every framebuffer; dropped with the chain.
    _depth: DepthResource,
    plan: SwapchainPlan,
}

/// Everything created so far for a chain under construction. Dropping it
/// releases those handles; a finished build moves them out first.
struct Partial<'a> {
    device: &'a GraphicsDevice,
    loader: &'a swapchain::Device,
    handle: vk::SwapchainKHR,
    views: Vec<vk::ImageView>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
}

impl Drop for Partial<'_> {
    fn drop(&mut self) {
        let d = self.device.raw();
        unsafe {
            for &fb in &self.framebuffers {
                d.destroy_framebuffer(fb, None);
            }
            if self.render_pass != vk::RenderPass::null() {
                d.destroy_render_pass(self.render_pass, None);
            }
            for &iv in &self.views {
                d.destroy_image_view(iv, None);
            }
            if self.handle != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.handle, None);
            }
        }
    }
}

fn creation(what: &str) -> impl Fn(vk::Result) -> SwapChainError + '_ {
    move |e| SwapChainError::Creation(format!("{what}: {e:?}"))
}

unsafe fn create_render_pass(
    d: &ash::Device,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> Result<vk::RenderPass, vk::Result> {
    let attachments = [
        vk::AttachmentDescription {
            format: color_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        },
        vk::AttachmentDescription {
            format: depth_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        },
    ];
    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &color_ref,
        p_depth_stencil_attachment: &depth_ref,
        ..Default::default()
    };

    // The acquire semaphore is waited at COLOR_ATTACHMENT_OUTPUT; the depth
    // image is shared between frames in flight.
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        src_access_mask: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ..Default::default()
    };

    let rp_info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: attachments.len() as u32,
        p_attachments: attachments.as_ptr(),
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    d.create_render_pass(&rp_info, None)
}

impl SwapChain {
    /// Query the surface and decide the parameters for a chain of `window`
    /// size. Creates nothing, so a `ZeroExtent` here leaves any live chain
    /// untouched.
    pub fn plan(
        device: &GraphicsDevice,
        prefs: &SwapchainPreferences,
        window: RenderSize,
        frames_in_flight: usize,
    ) -> Result<SwapchainPlan, SwapChainError> {
        let support = device.instance().surface_support(device.physical())?;
        plan_swapchain(&support, prefs, window, frames_in_flight)
    }

    /// Create the chain described by `plan`. `previous` is handed to the
    /// driver as the old swap chain; the caller destroys it afterwards, also
    /// when this fails, because the driver retires it either way.
    pub fn create(
        device: &Arc<GraphicsDevice>,
        plan: &SwapchainPlan,
        previous: Option<&SwapChain>,
    ) -> Result<Self, SwapChainError> {
        let d = device.raw();
        let loader = device.swapchain_loader();
        let extent = conv::extent_to_vk(plan.extent);
        let surface_format = conv::surface_format_to_vk(plan.format);

        let caps = unsafe {
            device
                .instance()
                .surface_loader()
                .get_physical_device_surface_capabilities(device.physical(), device.instance().surface())
        }
        .map_err(|e| SwapChainError::SurfaceQuery(format!("capabilities: {e:?}")))?;
        let pre_transform = if caps
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            caps.current_transform
        };

        let queues = device.queues();
        let families = [queues.graphics, queues.present];
        let (sharing_mode, family_count) = if queues.is_shared() {
            (vk::SharingMode::EXCLUSIVE, 0)
        } else {
            (vk::SharingMode::CONCURRENT, families.len() as u32)
        };

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: device.instance().surface(),
            min_image_count: plan.image_count,
            image_format: surface_format.format,
            image_color_space: surface_format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: family_count,
            p_queue_family_indices: families.as_ptr(),
            pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: conv::present_mode_to_vk(plan.present_mode),
            clipped: vk::TRUE,
            old_swapchain: previous.map_or(vk::SwapchainKHR::null(), |p| p.handle),
            ..Default::default()
        };

        let mut partial = Partial {
            device: &**device,
            loader: &loader,
            handle: vk::SwapchainKHR::null(),
            views: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
        };

        let images;
        unsafe {
            partial.handle = loader
                .create_swapchain(&swap_info, None)
                .map_err(creation("create_swapchain"))?;
            images = loader
                .get_swapchain_images(partial.handle)
                .map_err(creation("get_swapchain_images"))?;

            for &image in &images {
                let iv_info = vk::ImageViewCreateInfo {
                    s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                    image,
                    view_type: vk::ImageViewType::TYPE_2D,
                    format: surface_format.format,
                    subresource_range: vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    },
                    ..Default::default()
                };
                let view = d
                    .create_image_view(&iv_info, None)
                    .map_err(creation("create_image_view"))?;
                partial.views.push(view);
            }

            partial.render_pass = create_render_pass(d, surface_format.format, device.depth_format())
                .map_err(creation("create_render_pass"))?;
        }

        let depth = DepthResource::new(device, extent)?;

        unsafe {
            for &view in &partial.views {
                let attachments = [view, depth.view()];
                let fb_info = vk::FramebufferCreateInfo {
                    s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                    render_pass: partial.render_pass,
                    attachment_count: attachments.len() as u32,
                    p_attachments: attachments.as_ptr(),
                    width: extent.width,
                    height: extent.height,
                    layers: 1,
                    ..Default::default()
                };
                let fb = d
                    .create_framebuffer(&fb_info, None)
                    .map_err(creation("create_framebuffer"))?;
                partial.framebuffers.push(fb);
            }
        }

        let handle = std::mem::replace(&mut partial.handle, vk::SwapchainKHR::null());
        let views = std::mem::take(&mut partial.views);
        let render_pass = std::mem::replace(&mut partial.render_pass, vk::RenderPass::null());
        let framebuffers = std::mem::take(&mut partial.framebuffers);
        drop(partial);

        debug!(
            "swap chain created with {} images (requested {})",
            images.len(),
            plan.image_count
        );

        Ok(Self {
            device: Arc::clone(device),
            loader,
            handle,
            images,
            views,
            render_pass,
            framebuffers,
            _depth: depth,
            plan: *plan,
        })
    }

    /// Plan and create in one step.
    pub fn new(
        device: &Arc<GraphicsDevice>,
        prefs: &SwapchainPreferences,
        window: RenderSize,
        frames_in_flight: usize,
        previous: Option<&SwapChain>,
    ) -> Result<Self, SwapChainError> {
        let plan = Self::plan(device, prefs, window, frames_in_flight)?;
        let chain = Self::create(device, &plan, previous)?;
        info!(
            "swap chain ready: {}x{}, {} images, {:?}",
            plan.extent.width,
            plan.extent.height,
            chain.images.len(),
            plan.present_mode
        );
        Ok(chain)
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn loader(&self) -> &swapchain::Device {
        &self.loader
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    pub fn extent(&self) -> vk::Extent2D {
        conv::extent_to_vk(self.plan.extent)
    }

    pub fn summary(&self) -> SwapchainSummary {
        SwapchainSummary {
            image_count: self.images.len() as u32,
            format: self.plan.format,
            present_mode: self.plan.present_mode,
            extent: self.plan.extent,
        }
    }
}

// Framebuffers and views before the chain; the depth resource drops after.
impl Drop for SwapChain {
    fn drop(&mut self) {
        let d = self.device.raw();
        unsafe {
            for &fb in &self.framebuffers {
                d.destroy_framebuffer(fb, None);
            }
            d.destroy_render_pass(self.render_pass, None);
            for &iv in &self.views {
                d.destroy_image_view(iv, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        }
    }
}
