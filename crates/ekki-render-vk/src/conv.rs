// SPDX-License-Identifier: CEPL-1.0
//! Mapping between `ash::vk` values and the backend-neutral types.

use ash::vk;
use ekki_render::{
    AdapterKind, ColorFormat, ColorSpace, CullMode, FrontFace, PolygonMode, PresentMode,
    QueueCaps, RenderSize, SurfaceCaps, SurfaceFormat, Topology,
};

pub fn color_format_from_vk(f: vk::Format) -> ColorFormat {
    match f {
        vk::Format::B8G8R8A8_SRGB => ColorFormat::Bgra8Srgb,
        vk::Format::B8G8R8A8_UNORM => ColorFormat::Bgra8Unorm,
        vk::Format::R8G8B8A8_SRGB => ColorFormat::Rgba8Srgb,
        vk::Format::R8G8B8A8_UNORM => ColorFormat::Rgba8Unorm,
        vk::Format::A2B10G10R10_UNORM_PACK32 => ColorFormat::A2b10g10r10Unorm,
        vk::Format::R16G16B16A16_SFLOAT => ColorFormat::Rgba16Float,
        other => ColorFormat::Other(other.as_raw()),
    }
}

pub fn color_format_to_vk(f: ColorFormat) -> vk::Format {
    match f {
        ColorFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        ColorFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        ColorFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        ColorFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        ColorFormat::A2b10g10r10Unorm => vk::Format::A2B10G10R10_UNORM_PACK32,
        ColorFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        ColorFormat::Other(raw) => vk::Format::from_raw(raw),
    }
}

pub fn color_space_from_vk(cs: vk::ColorSpaceKHR) -> ColorSpace {
    match cs {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => ColorSpace::SrgbNonlinear,
        other => ColorSpace::Other(other.as_raw()),
    }
}

pub fn color_space_to_vk(cs: ColorSpace) -> vk::ColorSpaceKHR {
    match cs {
        ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ColorSpace::Other(raw) => vk::ColorSpaceKHR::from_raw(raw),
    }
}

pub fn surface_format_from_vk(f: vk::SurfaceFormatKHR) -> SurfaceFormat {
    SurfaceFormat {
        format: color_format_from_vk(f.format),
        color_space: color_space_from_vk(f.color_space),
    }
}

pub fn surface_format_to_vk(f: SurfaceFormat) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
        format: color_format_to_vk(f.format),
        color_space: color_space_to_vk(f.color_space),
    }
}

/// Modes without a neutral name (shared refresh and friends) are dropped.
pub fn present_mode_from_vk(m: vk::PresentModeKHR) -> Option<PresentMode> {
    match m {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

pub fn present_mode_to_vk(m: PresentMode) -> vk::PresentModeKHR {
    match m {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

pub fn extent_to_vk(e: RenderSize) -> vk::Extent2D {
    vk::Extent2D {
        width: e.width,
        height: e.height,
    }
}

fn extent_from_vk(e: vk::Extent2D) -> RenderSize {
    RenderSize::new(e.width, e.height)
}

/// `current_extent` of `u32::MAX` means the swap chain decides the size.
pub fn surface_caps_from_vk(caps: &vk::SurfaceCapabilitiesKHR) -> SurfaceCaps {
    let current_extent = if caps.current_extent.width == u32::MAX {
        None
    } else {
        Some(extent_from_vk(caps.current_extent))
    };
    SurfaceCaps {
        min_image_count: caps.min_image_count,
        max_image_count: caps.max_image_count,
        current_extent,
        min_extent: extent_from_vk(caps.min_image_extent),
        max_extent: extent_from_vk(caps.max_image_extent),
    }
}

pub fn adapter_kind_from_vk(t: vk::PhysicalDeviceType) -> AdapterKind {
    match t {
        vk::PhysicalDeviceType::DISCRETE_GPU => AdapterKind::Discrete,
        vk::PhysicalDeviceType::INTEGRATED_GPU => AdapterKind::Integrated,
        vk::PhysicalDeviceType::VIRTUAL_GPU => AdapterKind::Virtual,
        vk::PhysicalDeviceType::CPU => AdapterKind::Cpu,
        _ => AdapterKind::Other,
    }
}

pub fn queue_caps_from_vk(flags: vk::QueueFlags) -> QueueCaps {
    let mut caps = QueueCaps::empty();
    if flags.contains(vk::QueueFlags::GRAPHICS) {
        caps |= QueueCaps::GRAPHICS;
    }
    if flags.contains(vk::QueueFlags::COMPUTE) {
        caps |= QueueCaps::COMPUTE;
    }
    if flags.contains(vk::QueueFlags::TRANSFER) {
        caps |= QueueCaps::TRANSFER;
    }
    caps
}

pub fn topology_to_vk(t: Topology) -> vk::PrimitiveTopology {
    match t {
        Topology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        Topology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        Topology::LineList => vk::PrimitiveTopology::LINE_LIST,
        Topology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

pub fn polygon_mode_to_vk(m: PolygonMode) -> vk::PolygonMode {
    match m {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
    }
}

pub fn cull_mode_to_vk(m: CullMode) -> vk::CullModeFlags {
    match m {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub fn front_face_to_vk(f: FrontFace) -> vk::FrontFace {
    match f {
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
    }
}

pub fn bool32(b: bool) -> vk::Bool32 {
    if b {
        vk::TRUE
    } else {
        vk::FALSE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_formats_map_both_ways() {
        for f in [
            ColorFormat::Bgra8Srgb,
            ColorFormat::Bgra8Unorm,
            ColorFormat::Rgba8Srgb,
            ColorFormat::Rgba8Unorm,
            ColorFormat::A2b10g10r10Unorm,
            ColorFormat::Rgba16Float,
        ] {
            assert_eq!(color_format_from_vk(color_format_to_vk(f)), f);
        }
    }

    #[test]
    fn unnamed_format_keeps_raw_value() {
        let f = color_format_from_vk(vk::Format::A2R10G10B10_UNORM_PACK32);
        assert_eq!(f, ColorFormat::Other(vk::Format::A2R10G10B10_UNORM_PACK32.as_raw()));
        assert_eq!(color_format_to_vk(f), vk::Format::A2R10G10B10_UNORM_PACK32);

        let hdr = color_space_from_vk(vk::ColorSpaceKHR::HDR10_ST2084_EXT);
        assert_eq!(color_space_to_vk(hdr), vk::ColorSpaceKHR::HDR10_ST2084_EXT);
    }

    #[test]
    fn unknown_present_modes_are_dropped() {
        assert_eq!(present_mode_from_vk(vk::PresentModeKHR::MAILBOX), Some(PresentMode::Mailbox));
        assert_eq!(present_mode_from_vk(vk::PresentModeKHR::SHARED_DEMAND_REFRESH), None);
        assert_eq!(present_mode_to_vk(PresentMode::FifoRelaxed), vk::PresentModeKHR::FIFO_RELAXED);
    }

    #[test]
    fn free_size_surface_has_no_current_extent() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 16384,
                height: 16384,
            },
            ..Default::default()
        };
        let c = surface_caps_from_vk(&caps);
        assert_eq!(c.current_extent, None);
        assert_eq!(c.max_image_count, 0);
        assert_eq!(c.max_extent, RenderSize::new(16384, 16384));
    }

    #[test]
    fn queue_flags_keep_only_known_bits() {
        let caps = queue_caps_from_vk(
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER | vk::QueueFlags::SPARSE_BINDING,
        );
        assert_eq!(caps, QueueCaps::GRAPHICS | QueueCaps::TRANSFER);
    }
}
