// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{CStr, CString};

use anyhow::{Context, Result};
#[cfg(debug_assertions)]
use ash::ext::debug_utils as ext_debug;
use ash::khr::surface;
use ash::{vk, Entry};
use ekki_render::{SurfaceSupport, SwapChainError};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use tracing::{debug, info, warn};

use crate::conv;

#[cfg(debug_assertions)]
const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

#[cfg(debug_assertions)]
type DebugState = Option<(ext_debug::Instance, vk::DebugUtilsMessengerEXT)>;
#[cfg(not(debug_assertions))]
type DebugState = ();

/// Vulkan instance plus the window surface created from it.
///
/// The surface belongs to the window side; device and swap chain only borrow
/// it through here.
pub struct VulkanInstance {
    _entry: Entry,
    instance: ash::Instance,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
    debug: DebugState,
}

#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::error!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::warn!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        tracing::debug!(target: "vulkan", "{msg}");
    } else {
        tracing::trace!(target: "vulkan", "{msg}");
    }
    vk::FALSE
}

#[cfg(debug_assertions)]
unsafe fn create_debug_messenger(entry: &Entry, instance: &ash::Instance, enabled: bool) -> DebugState {
    if !enabled {
        return None;
    }
    let loader = ext_debug::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    match loader.create_debug_utils_messenger(&ci, None) {
        Ok(messenger) => Some((loader, messenger)),
        Err(e) => {
            warn!("debug messenger unavailable: {e:?}");
            None
        }
    }
}

#[cfg(not(debug_assertions))]
unsafe fn create_debug_messenger(_entry: &Entry, _instance: &ash::Instance, _enabled: bool) -> DebugState {}

#[cfg(debug_assertions)]
fn has_layer(entry: &Entry, name: &CStr) -> bool {
    unsafe { entry.enumerate_instance_layer_properties() }
        .unwrap_or_default()
        .iter()
        .any(|l| unsafe { CStr::from_ptr(l.layer_name.as_ptr()) } == name)
}

unsafe fn create_instance(entry: &Entry, display_raw: RawDisplayHandle, app_name: &str) -> Result<(ash::Instance, bool)> {
    let app = CString::new(app_name).unwrap_or_else(|_| c"ekki".to_owned());
    let engine = c"ekki";

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: 0,
        p_engine_name: engine.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    #[cfg_attr(not(debug_assertions), allow(unused_mut))]
    let mut extensions = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?
        .to_vec();
    #[cfg_attr(not(debug_assertions), allow(unused_mut))]
    let mut layers: Vec<*const std::os::raw::c_char> = Vec::new();

    #[cfg(debug_assertions)]
    let validation = {
        let available = has_layer(entry, VALIDATION_LAYER);
        if available {
            layers.push(VALIDATION_LAYER.as_ptr());
            extensions.push(ext_debug::NAME.as_ptr());
        } else {
            warn!("validation layer not installed; running without it");
        }
        available
    };
    #[cfg(not(debug_assertions))]
    let validation = false;

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    let instance = entry
        .create_instance(&create_info, None)
        .context("create_instance")?;
    Ok((instance, validation))
}

impl VulkanInstance {
    /// Instance first, then the surface from that instance. Devices are
    /// queried against this surface afterwards.
    pub fn new(window: &dyn HasWindowHandle, display: &dyn HasDisplayHandle, app_name: &str) -> Result<Self> {
        let dh = display
            .display_handle()
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .as_raw();

        let entry = Entry::linked();
        unsafe {
            let (instance, validation) = create_instance(&entry, dh, app_name)?;
            let debug = create_debug_messenger(&entry, &instance, validation);
            let surface_loader = surface::Instance::new(&entry, &instance);
            let surface = match ash_window::create_surface(&entry, &instance, dh, wh, None) {
                Ok(s) => s,
                Err(e) => {
                    destroy_debug(debug);
                    instance.destroy_instance(None);
                    return Err(anyhow::anyhow!("ash_window::create_surface: {e:?}"));
                }
            };
            info!("vulkan instance ready (validation: {validation})");

            Ok(Self {
                _entry: entry,
                instance,
                surface_loader,
                surface,
                debug,
            })
        }
    }

    pub fn raw(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn surface_loader(&self) -> &surface::Instance {
        &self.surface_loader
    }

    pub fn supports_present(&self, phys: vk::PhysicalDevice, family: u32) -> bool {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(phys, family, self.surface)
                .unwrap_or(false)
        }
    }

    /// Capabilities, formats and present modes of the surface on `phys`.
    pub fn surface_support(&self, phys: vk::PhysicalDevice) -> Result<SurfaceSupport, SwapChainError> {
        let query = |what: &str, e: vk::Result| SwapChainError::SurfaceQuery(format!("{what}: {e:?}"));
        unsafe {
            let caps = self
                .surface_loader
                .get_physical_device_surface_capabilities(phys, self.surface)
                .map_err(|e| query("capabilities", e))?;
            let formats = self
                .surface_loader
                .get_physical_device_surface_formats(phys, self.surface)
                .map_err(|e| query("formats", e))?;
            let modes = self
                .surface_loader
                .get_physical_device_surface_present_modes(phys, self.surface)
                .map_err(|e| query("present modes", e))?;
            debug!(
                "surface offers {} format(s), present modes {:?}",
                formats.len(),
                modes
            );

            Ok(SurfaceSupport {
                caps: conv::surface_caps_from_vk(&caps),
                formats: formats.into_iter().map(conv::surface_format_from_vk).collect(),
                present_modes: modes.into_iter().filter_map(conv::present_mode_from_vk).collect(),
            })
        }
    }
}

#[cfg(debug_assertions)]
unsafe fn destroy_debug(debug: DebugState) {
    if let Some((loader, messenger)) = debug {
        loader.destroy_debug_utils_messenger(messenger, None);
    }
}

#[cfg(not(debug_assertions))]
unsafe fn destroy_debug(_debug: DebugState) {}

// Surface before instance; the device is already gone by the time this runs.
impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
            #[cfg(debug_assertions)]
            destroy_debug(self.debug.take());
            self.instance.destroy_instance(None);
        }
    }
}
