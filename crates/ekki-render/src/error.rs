// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

use crate::frame::FrameState;

/// Startup failures while picking an adapter or creating the logical device.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no suitable graphics device ({inspected} adapter(s) inspected)")]
    NoSuitableDevice { inspected: usize },

    #[error("logical device creation failed: {0}")]
    Creation(String),

    #[error("device query failed: {0}")]
    Query(String),
}

#[derive(Error, Debug)]
pub enum SwapChainError {
    #[error("surface reports no supported formats")]
    NoSurfaceFormats,

    #[error("swap chain extent is zero ({width}x{height})")]
    ZeroExtent { width: u32, height: u32 },

    #[error("swap chain creation rejected: {0}")]
    Creation(String),

    #[error("surface query failed: {0}")]
    SurfaceQuery(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid {stage} shader: {reason}")]
    InvalidShader { stage: &'static str, reason: &'static str },

    #[error("pipeline creation failed: {0}")]
    Creation(String),
}

/// Everything the frame loop can hit. Out-of-date and suboptimal surfaces are
/// not errors; they are reported through [`crate::Acquire`] and
/// [`crate::PresentOutcome`] and handled by a rebuild.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    SwapChain(#[from] SwapChainError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("image acquisition failed: {0}")]
    Acquire(String),

    #[error("present failed: {0}")]
    Present(String),

    #[error("queue submit failed: {0}")]
    Submit(String),

    #[error("command recording failed: {0}")]
    Recording(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("frame call out of order: expected {expected:?}, renderer is {found:?}")]
    InvalidState { expected: FrameState, found: FrameState },

    #[error("backend failure: {0}")]
    Backend(String),
}

pub type FrameResult<T> = std::result::Result<T, FrameError>;
