// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use ash::vk;
use ekki_render::DeviceError;

use crate::device::GraphicsDevice;

/// Per-frame-in-flight resources, reused every K-th frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameSlot {
    pub command_buffer: vk::CommandBuffer,
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    /// Created signaled so the first wait on each slot returns at once.
    pub in_flight: vk::Fence,
}

pub struct FrameSlots {
    device: Arc<GraphicsDevice>,
    slots: Vec<FrameSlot>,
}

impl FrameSlots {
    pub fn new(device: &Arc<GraphicsDevice>, count: usize) -> Result<Self, DeviceError> {
        let d = device.raw();
        let fail = |what: &str, e: vk::Result| DeviceError::Creation(format!("frame slot {what}: {e:?}"));

        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: device.command_pool(),
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count as u32,
            ..Default::default()
        };
        let command_buffers =
            unsafe { d.allocate_command_buffers(&alloc_info) }.map_err(|e| fail("command buffers", e))?;

        // Slots pushed so far are released by Drop if a later one fails.
        let mut slots = FrameSlots {
            device: Arc::clone(device),
            slots: Vec::with_capacity(count),
        };
        let sem_ci = vk::SemaphoreCreateInfo::default();
        let fence_ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };

        for (i, &command_buffer) in command_buffers.iter().enumerate() {
            let created = unsafe {
                let image_available = d.create_semaphore(&sem_ci, None);
                let render_finished = d.create_semaphore(&sem_ci, None);
                let in_flight = d.create_fence(&fence_ci, None);
                match (image_available, render_finished, in_flight) {
                    (Ok(a), Ok(r), Ok(f)) => Ok(FrameSlot {
                        command_buffer,
                        image_available: a,
                        render_finished: r,
                        in_flight: f,
                    }),
                    (a, r, f) => {
                        let mut err = vk::Result::ERROR_INITIALIZATION_FAILED;
                        for s in [a, r] {
                            match s {
                                Ok(s) => d.destroy_semaphore(s, None),
                                Err(e) => err = e,
                            }
                        }
                        match f {
                            Ok(f) => d.destroy_fence(f, None),
                            Err(e) => err = e,
                        }
                        Err(err)
                    }
                }
            };
            match created {
                Ok(slot) => slots.slots.push(slot),
                Err(e) => {
                    unsafe { d.free_command_buffers(device.command_pool(), &command_buffers[i..]) };
                    return Err(fail("sync objects", e));
                }
            }
        }
        Ok(slots)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: usize) -> &FrameSlot {
        &self.slots[slot]
    }
}

// Drain the device so nothing still executes the command buffers being freed.
impl Drop for FrameSlots {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        let d = self.device.raw();
        self.device.wait_idle().ok();
        unsafe {
            let cmds: Vec<vk::CommandBuffer> = self.slots.iter().map(|s| s.command_buffer).collect();
            d.free_command_buffers(self.device.command_pool(), &cmds);
            for s in &self.slots {
                d.destroy_fence(s.in_flight, None);
                d.destroy_semaphore(s.render_finished, None);
                d.destroy_semaphore(s.image_available, None);
            }
        }
    }
}
