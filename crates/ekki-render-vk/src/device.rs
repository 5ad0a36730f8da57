// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CStr;
use std::sync::Arc;

use ash::khr::swapchain;
use ash::vk;
use ekki_render::{
    select_adapter, AdapterProfile, DeviceError, QueueFamilyIndices, QueueFamilyProfile,
};
use tracing::{debug, info};

use crate::conv;
use crate::instance::VulkanInstance;

/// Physical adapter, logical device and its queues.
///
/// Shared by `Arc` with every object that owns device resources, so the last
/// of them to drop releases it. Owns the [`VulkanInstance`], which therefore
/// outlives the device.
pub struct GraphicsDevice {
    phys: vk::PhysicalDevice,
    device: ash::Device,
    queues: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    /// One per distinct queue family, same order as `queues.unique()`.
    command_pools: Vec<(u32, vk::CommandPool)>,
    depth_format: vk::Format,
    name: String,
    instance: VulkanInstance,
}

fn device_err(what: &str) -> impl Fn(vk::Result) -> DeviceError + '_ {
    move |e| DeviceError::Creation(format!("{what}: {e:?}"))
}

unsafe fn profile_adapter(instance: &VulkanInstance, phys: vk::PhysicalDevice) -> AdapterProfile {
    let raw = instance.raw();
    let props = raw.get_physical_device_properties(phys);
    let name = CStr::from_ptr(props.device_name.as_ptr())
        .to_string_lossy()
        .into_owned();

    let queue_families = raw
        .get_physical_device_queue_family_properties(phys)
        .iter()
        .enumerate()
        .map(|(i, q)| QueueFamilyProfile {
            caps: conv::queue_caps_from_vk(q.queue_flags),
            supports_present: instance.supports_present(phys, i as u32),
        })
        .collect();

    let extensions = raw
        .enumerate_device_extension_properties(phys)
        .unwrap_or_default()
        .iter()
        .map(|e| {
            CStr::from_ptr(e.extension_name.as_ptr())
                .to_string_lossy()
                .into_owned()
        })
        .collect();

    AdapterProfile {
        name,
        kind: conv::adapter_kind_from_vk(props.device_type),
        queue_families,
        extensions,
    }
}

unsafe fn pick_depth_format(instance: &ash::Instance, phys: vk::PhysicalDevice) -> vk::Format {
    // Prefer 32f → 32f+S8 → 24+S8 → 16
    let candidates = [
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
        vk::Format::D16_UNORM,
    ];
    for &fmt in &candidates {
        let props = instance.get_physical_device_format_properties(phys, fmt);
        if props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        {
            return fmt;
        }
    }
    vk::Format::D32_SFLOAT
}

impl GraphicsDevice {
    /// Choose an adapter that can draw to and present on the instance's
    /// surface, then create the logical device, its queues and command pools.
    pub fn new(instance: VulkanInstance) -> Result<Arc<Self>, DeviceError> {
        let raw = instance.raw();
        let physical = unsafe { raw.enumerate_physical_devices() }
            .map_err(|e| DeviceError::Query(format!("enumerate_physical_devices: {e:?}")))?;
        let profiles: Vec<AdapterProfile> = physical
            .iter()
            .map(|&phys| unsafe { profile_adapter(&instance, phys) })
            .collect();

        let required = [swapchain::NAME.to_string_lossy()];
        let required: Vec<&str> = required.iter().map(|s| s.as_ref()).collect();
        let choice = select_adapter(&profiles, &required)?;
        let phys = physical[choice.index];
        let queues = choice.queues;
        let name = profiles[choice.index].name.clone();

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queues
            .unique()
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();

        let device_exts = [swapchain::NAME.as_ptr()];
        let dinfo = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_extension_count: device_exts.len() as u32,
            pp_enabled_extension_names: device_exts.as_ptr(),
            ..Default::default()
        };

        unsafe {
            let device = raw
                .create_device(phys, &dinfo, None)
                .map_err(device_err("create_device"))?;
            let graphics_queue = device.get_device_queue(queues.graphics, 0);
            let present_queue = device.get_device_queue(queues.present, 0);

            let mut command_pools = Vec::with_capacity(2);
            for family in queues.unique() {
                let pool_info = vk::CommandPoolCreateInfo {
                    s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
                    queue_family_index: family,
                    flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
                    ..Default::default()
                };
                match device.create_command_pool(&pool_info, None) {
                    Ok(pool) => command_pools.push((family, pool)),
                    Err(e) => {
                        for (_, pool) in command_pools {
                            device.destroy_command_pool(pool, None);
                        }
                        device.destroy_device(None);
                        return Err(device_err("create_command_pool")(e));
                    }
                }
            }

            let depth_format = pick_depth_format(raw, phys);
            info!(
                "device '{}': graphics family {}, present family {}{}, depth {:?}",
                name,
                queues.graphics,
                queues.present,
                if queues.is_shared() { " (shared)" } else { "" },
                depth_format
            );

            Ok(Arc::new(Self {
                phys,
                device,
                queues,
                graphics_queue,
                present_queue,
                command_pools,
                depth_format,
                name,
                instance,
            }))
        }
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &VulkanInstance {
        &self.instance
    }

    pub fn physical(&self) -> vk::PhysicalDevice {
        self.phys
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queues(&self) -> QueueFamilyIndices {
        self.queues
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Pool for the graphics family; frame command buffers come from here.
    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pools[0].1
    }

    pub fn swapchain_loader(&self) -> swapchain::Device {
        swapchain::Device::new(self.instance.raw(), &self.device)
    }

    pub fn wait_idle(&self) -> Result<(), vk::Result> {
        unsafe { self.device.device_wait_idle() }
    }

    pub fn find_memory_type(
        &self,
        type_bits: u32,
        req: vk::MemoryPropertyFlags,
    ) -> Result<u32, DeviceError> {
        let mem = unsafe {
            self.instance
                .raw()
                .get_physical_device_memory_properties(self.phys)
        };
        (0..mem.memory_type_count)
            .find(|&i| {
                (type_bits & (1 << i)) != 0
                    && mem.memory_types[i as usize].property_flags.contains(req)
            })
            .ok_or_else(|| DeviceError::Query(format!("no memory type with {req:?}")))
    }

    /// Buffer with bound memory. Nothing is left allocated on failure.
    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        props: vk::MemoryPropertyFlags,
    ) -> Result<(vk::Buffer, vk::DeviceMemory), DeviceError> {
        let bci = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        unsafe {
            let buf = self
                .device
                .create_buffer(&bci, None)
                .map_err(device_err("create_buffer"))?;
            let req = self.device.get_buffer_memory_requirements(buf);
            let mem = self
                .find_memory_type(req.memory_type_bits, props)
                .and_then(|memory_type_index| {
                    let mai = vk::MemoryAllocateInfo {
                        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                        allocation_size: req.size,
                        memory_type_index,
                        ..Default::default()
                    };
                    self.device
                        .allocate_memory(&mai, None)
                        .map_err(device_err("allocate_memory"))
                });
            let mem = match mem {
                Ok(m) => m,
                Err(e) => {
                    self.device.destroy_buffer(buf, None);
                    return Err(e);
                }
            };
            if let Err(e) = self.device.bind_buffer_memory(buf, mem, 0) {
                self.device.destroy_buffer(buf, None);
                self.device.free_memory(mem, None);
                return Err(device_err("bind_buffer_memory")(e));
            }
            Ok((buf, mem))
        }
    }

    /// One-shot copy of `bytes` into the device-local `dst` through a host
    /// visible staging buffer on the graphics queue. Blocks until done.
    pub fn upload_via_staging(&self, dst: vk::Buffer, bytes: &[u8]) -> Result<(), DeviceError> {
        let size = bytes.len() as vk::DeviceSize;
        let (staging, staging_mem) = self.create_buffer(
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        let result = unsafe { self.copy_through(staging, staging_mem, dst, bytes) };
        unsafe {
            self.device.destroy_buffer(staging, None);
            self.device.free_memory(staging_mem, None);
        }
        result
    }

    unsafe fn copy_through(
        &self,
        staging: vk::Buffer,
        staging_mem: vk::DeviceMemory,
        dst: vk::Buffer,
        bytes: &[u8],
    ) -> Result<(), DeviceError> {
        let size = bytes.len() as vk::DeviceSize;
        let ptr = self
            .device
            .map_memory(staging_mem, 0, size, vk::MemoryMapFlags::empty())
            .map_err(device_err("map_memory"))?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, bytes.len());
        self.device.unmap_memory(staging_mem);

        let ai = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.command_pool(),
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let cmd = self
            .device
            .allocate_command_buffers(&ai)
            .map_err(device_err("allocate_command_buffers"))?[0];

        let submitted = (|| {
            let bi = vk::CommandBufferBeginInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                ..Default::default()
            };
            self.device.begin_command_buffer(cmd, &bi)?;
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            self.device
                .cmd_copy_buffer(cmd, staging, dst, std::slice::from_ref(&region));
            self.device.end_command_buffer(cmd)?;

            let si = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                ..Default::default()
            };
            self.device
                .queue_submit(self.graphics_queue, std::slice::from_ref(&si), vk::Fence::null())?;
            self.device.queue_wait_idle(self.graphics_queue)
        })();

        self.device
            .free_command_buffers(self.command_pool(), std::slice::from_ref(&cmd));
        submitted.map_err(device_err("staging upload"))
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("name", &self.name)
            .field("queues", &self.queues)
            .finish_non_exhaustive()
    }
}

// Every resource holder keeps an `Arc` to this device, so by now they are
// all gone. Pools, then device; the instance and surface drop afterwards.
impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            for &(family, pool) in &self.command_pools {
                debug!("destroying command pool for family {family}");
                self.device.destroy_command_pool(pool, None);
            }
            self.device.destroy_device(None);
        }
    }
}
