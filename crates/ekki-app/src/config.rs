// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::Path;
use std::time::Duration;

use ekki_render::{FrameSettings, PresentMode, RenderSize, SwapchainPreferences};
use serde::Deserialize;

pub const MAX_FRAMES_IN_FLIGHT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    Immediate,
    Mailbox,
    Fifo,
    #[value(alias = "fifo_relaxed")]
    FifoRelaxed,
}

impl From<PresentModeCfg> for PresentMode {
    fn from(m: PresentModeCfg) -> Self {
        match m {
            PresentModeCfg::Immediate => PresentMode::Immediate,
            PresentModeCfg::Mailbox => PresentMode::Mailbox,
            PresentModeCfg::Fifo => PresentMode::Fifo,
            PresentModeCfg::FifoRelaxed => PresentMode::FifoRelaxed,
        }
    }
}

/// What the swap chain does while the window is in the background.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnfocusedPolicy {
    None,
    /// Present with FIFO until focus returns.
    #[default]
    VsyncOn,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            title: "ekki".into(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub vsync: bool,
    pub present_mode: Vec<PresentModeCfg>,
    pub unfocused: UnfocusedPolicy,
    pub frames_in_flight: usize,
    pub fence_timeout_ms: u64,
    pub max_rebuild_attempts: u32,
}

impl Default for RenderCfg {
    fn default() -> Self {
        Self {
            clear_color: [0.01, 0.01, 0.01, 1.0],
            vsync: true,
            present_mode: vec![PresentModeCfg::Mailbox, PresentModeCfg::Fifo],
            unfocused: UnfocusedPolicy::default(),
            frames_in_flight: 2,
            fence_timeout_ms: 2000,
            max_rebuild_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub log_level: Option<String>,
    pub window: WindowCfg,
    pub render: RenderCfg,
}

/// Read `path`, falling back to defaults. The second value describes why the
/// file was not used; logging is not up yet when this runs, so the caller
/// reports it.
pub fn load_cfg(path: &Path) -> (AppCfg, Option<String>) {
    match fs::read_to_string(path) {
        Ok(s) => match toml::from_str::<AppCfg>(&s) {
            Ok(cfg) => (cfg, None),
            Err(e) => (AppCfg::default(), Some(format!("{} is malformed: {e}", path.display()))),
        },
        Err(e) => (AppCfg::default(), Some(format!("cannot read {}: {e}", path.display()))),
    }
}

impl AppCfg {
    /// Command line values replace the file's.
    pub fn apply_cli(&mut self, frames_in_flight: Option<usize>, present_modes: &[PresentModeCfg]) {
        if let Some(k) = frames_in_flight {
            self.render.frames_in_flight = k;
        }
        if !present_modes.is_empty() {
            self.render.present_mode = present_modes.to_vec();
        }
    }

    /// Clamp values the renderer cannot run with. Returns one note per
    /// adjustment.
    pub fn normalize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();
        let r = &mut self.render;
        let k = r.frames_in_flight.clamp(1, MAX_FRAMES_IN_FLIGHT);
        if k != r.frames_in_flight {
            notes.push(format!("frames_in_flight {} out of range, using {k}", r.frames_in_flight));
            r.frames_in_flight = k;
        }
        if r.max_rebuild_attempts == 0 {
            notes.push("max_rebuild_attempts 0 out of range, using 1".into());
            r.max_rebuild_attempts = 1;
        }
        if r.fence_timeout_ms == 0 {
            notes.push("fence_timeout_ms 0 out of range, using 2000".into());
            r.fence_timeout_ms = RenderCfg::default().fence_timeout_ms;
        }
        notes
    }

    pub fn window_size(&self) -> RenderSize {
        RenderSize::new(self.window.width.max(1), self.window.height.max(1))
    }

    /// Configured order with duplicates dropped; `vsync = false` moves
    /// immediate to the front.
    pub fn present_modes(&self) -> Vec<PresentMode> {
        let mut order = Vec::new();
        if !self.render.vsync {
            order.push(PresentMode::Immediate);
        }
        for &m in &self.render.present_mode {
            let m = PresentMode::from(m);
            if !order.contains(&m) {
                order.push(m);
            }
        }
        order
    }

    pub fn swapchain_preferences(&self) -> SwapchainPreferences {
        SwapchainPreferences {
            present_modes: self.present_modes(),
            ..SwapchainPreferences::default()
        }
    }

    /// Preferences for the next rebuild after a focus change, or `None` when
    /// focus does not affect presentation.
    pub fn focus_preferences(&self, focused: bool) -> Option<SwapchainPreferences> {
        match self.render.unfocused {
            UnfocusedPolicy::None => None,
            UnfocusedPolicy::VsyncOn if focused => Some(self.swapchain_preferences()),
            UnfocusedPolicy::VsyncOn => Some(SwapchainPreferences {
                present_modes: vec![PresentMode::Fifo],
                ..SwapchainPreferences::default()
            }),
        }
    }

    pub fn frame_settings(&self) -> FrameSettings {
        let timeout = Duration::from_millis(self.render.fence_timeout_ms);
        FrameSettings {
            frames_in_flight: self.render.frames_in_flight,
            fence_timeout: timeout,
            acquire_timeout: timeout,
            max_rebuild_attempts: self.render.max_rebuild_attempts,
        }
    }
}
