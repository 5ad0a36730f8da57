// SPDX-License-Identifier: CEPL-1.0
use tracing::info;

use crate::error::SwapChainError;
use crate::RenderSize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    Bgra8Srgb,
    Bgra8Unorm,
    Rgba8Srgb,
    Rgba8Unorm,
    A2b10g10r10Unorm,
    Rgba16Float,
    /// Raw backend value for anything the core has no name for.
    Other(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
    Other(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: ColorFormat,
    pub color_space: ColorSpace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceCaps {
    pub min_image_count: u32,
    /// Zero means the surface sets no upper bound.
    pub max_image_count: u32,
    /// `None` when the surface lets the swap chain pick its size.
    pub current_extent: Option<RenderSize>,
    pub min_extent: RenderSize,
    pub max_extent: RenderSize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceSupport {
    pub caps: SurfaceCaps,
    pub formats: Vec<SurfaceFormat>,
    pub present_modes: Vec<PresentMode>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapchainPreferences {
    pub format: SurfaceFormat,
    /// Tried in order; FIFO is the final fallback whether listed or not.
    pub present_modes: Vec<PresentMode>,
}

impl Default for SwapchainPreferences {
    fn default() -> Self {
        Self {
            format: SurfaceFormat {
                format: ColorFormat::Bgra8Srgb,
                color_space: ColorSpace::SrgbNonlinear,
            },
            present_modes: vec![PresentMode::Mailbox, PresentMode::Fifo],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainPlan {
    pub image_count: u32,
    pub format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub extent: RenderSize,
}

/// One image more than frames in flight, kept inside the surface limits.
pub fn choose_image_count(caps: &SurfaceCaps, frames_in_flight: usize) -> u32 {
    let desired = frames_in_flight as u32 + 1;
    let max = if caps.max_image_count == 0 {
        u32::MAX
    } else {
        caps.max_image_count.max(caps.min_image_count)
    };
    desired.clamp(caps.min_image_count, max)
}

pub fn choose_surface_format(
    formats: &[SurfaceFormat],
    preferred: SurfaceFormat,
) -> Option<SurfaceFormat> {
    formats
        .iter()
        .copied()
        .find(|f| *f == preferred)
        .or_else(|| formats.first().copied())
}

pub fn choose_present_mode(supported: &[PresentMode], order: &[PresentMode]) -> PresentMode {
    order
        .iter()
        .copied()
        .find(|m| supported.contains(m))
        .unwrap_or(PresentMode::Fifo)
}

pub fn choose_extent(caps: &SurfaceCaps, window: RenderSize) -> RenderSize {
    match caps.current_extent {
        Some(fixed) => fixed,
        None => window.clamp(caps.min_extent, caps.max_extent),
    }
}

/// Decide every swap chain parameter from what the surface supports.
pub fn plan_swapchain(
    support: &SurfaceSupport,
    prefs: &SwapchainPreferences,
    window: RenderSize,
    frames_in_flight: usize,
) -> Result<SwapchainPlan, SwapChainError> {
    let format =
        choose_surface_format(&support.formats, prefs.format).ok_or(SwapChainError::NoSurfaceFormats)?;
    let extent = choose_extent(&support.caps, window);
    if extent.is_zero() {
        return Err(SwapChainError::ZeroExtent {
            width: extent.width,
            height: extent.height,
        });
    }
    let present_mode = choose_present_mode(&support.present_modes, &prefs.present_modes);
    let image_count = choose_image_count(&support.caps, frames_in_flight);

    info!(
        "swap chain plan: format {:?} / {:?}, present_mode {:?}, extent {}x{}, images(min={} → picked={})",
        format.format,
        format.color_space,
        present_mode,
        extent.width,
        extent.height,
        support.caps.min_image_count,
        image_count
    );

    Ok(SwapchainPlan {
        image_count,
        format,
        present_mode,
        extent,
    })
}
