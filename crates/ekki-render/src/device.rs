// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use tracing::{debug, info};

use crate::error::DeviceError;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct QueueCaps: u32 {
        const GRAPHICS = 1 << 0;
        const COMPUTE = 1 << 1;
        const TRANSFER = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterKind {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

impl AdapterKind {
    fn score(self) -> u32 {
        match self {
            AdapterKind::Discrete => 1000,
            AdapterKind::Integrated => 500,
            AdapterKind::Virtual => 100,
            AdapterKind::Cpu => 10,
            AdapterKind::Other => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyProfile {
    pub caps: QueueCaps,
    /// Can present to the surface the device is being chosen for.
    pub supports_present: bool,
}

/// What the backend found out about one physical adapter.
#[derive(Clone, Debug)]
pub struct AdapterProfile {
    pub name: String,
    pub kind: AdapterKind,
    pub queue_families: Vec<QueueFamilyProfile>,
    pub extensions: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct families, graphics first. One queue and one command pool is
    /// created per entry.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdapterChoice {
    /// Position of the chosen adapter in the slice passed to [`select_adapter`].
    pub index: usize,
    pub queues: QueueFamilyIndices,
    pub score: u32,
}

fn find_queue_families(families: &[QueueFamilyProfile]) -> Option<QueueFamilyIndices> {
    let shared = families
        .iter()
        .position(|f| f.caps.contains(QueueCaps::GRAPHICS) && f.supports_present);
    if let Some(i) = shared {
        return Some(QueueFamilyIndices {
            graphics: i as u32,
            present: i as u32,
        });
    }

    let graphics = families
        .iter()
        .position(|f| f.caps.contains(QueueCaps::GRAPHICS))?;
    let present = families.iter().position(|f| f.supports_present)?;
    Some(QueueFamilyIndices {
        graphics: graphics as u32,
        present: present as u32,
    })
}

fn rate_adapter(profile: &AdapterProfile, required_extensions: &[&str]) -> Option<(u32, QueueFamilyIndices)> {
    if let Some(missing) = required_extensions
        .iter()
        .find(|ext| !profile.extensions.iter().any(|have| have == *ext))
    {
        debug!("adapter '{}' rejected: missing extension {missing}", profile.name);
        return None;
    }

    let Some(queues) = find_queue_families(&profile.queue_families) else {
        debug!(
            "adapter '{}' rejected: needs a graphics queue and a present queue",
            profile.name
        );
        return None;
    };

    let mut score = profile.kind.score();
    if queues.is_shared() {
        score += 50;
    }
    debug!("adapter '{}' ({:?}) scored {score}", profile.name, profile.kind);
    Some((score, queues))
}

/// Pick the best adapter that can draw and present.
///
/// Adapters missing a required extension, a graphics family or a
/// present-capable family are skipped. Equal scores keep enumeration order.
pub fn select_adapter(
    adapters: &[AdapterProfile],
    required_extensions: &[&str],
) -> Result<AdapterChoice, DeviceError> {
    let mut best: Option<AdapterChoice> = None;

    for (index, profile) in adapters.iter().enumerate() {
        let Some((score, queues)) = rate_adapter(profile, required_extensions) else {
            continue;
        };
        if best.map_or(true, |b| score > b.score) {
            best = Some(AdapterChoice { index, queues, score });
        }
    }

    let choice = best.ok_or(DeviceError::NoSuitableDevice {
        inspected: adapters.len(),
    })?;
    info!(
        "selected adapter '{}' (graphics family {}, present family {})",
        adapters[choice.index].name, choice.queues.graphics, choice.queues.present
    );
    Ok(choice)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWAPCHAIN_EXT: &str = "VK_KHR_swapchain";

    fn family(caps: QueueCaps, present: bool) -> QueueFamilyProfile {
        QueueFamilyProfile {
            caps,
            supports_present: present,
        }
    }

    fn adapter(name: &str, kind: AdapterKind, families: Vec<QueueFamilyProfile>) -> AdapterProfile {
        AdapterProfile {
            name: name.into(),
            kind,
            queue_families: families,
            extensions: vec![SWAPCHAIN_EXT.into()],
        }
    }

    #[test]
    fn empty_enumeration_is_no_suitable_device() {
        let err = select_adapter(&[], &[SWAPCHAIN_EXT]).unwrap_err();
        assert!(matches!(err, DeviceError::NoSuitableDevice { inspected: 0 }));
    }

    #[test]
    fn adapters_without_present_support_are_rejected() {
        let adapters = vec![
            adapter("headless", AdapterKind::Discrete, vec![family(QueueCaps::GRAPHICS, false)]),
            adapter("compute", AdapterKind::Integrated, vec![family(QueueCaps::COMPUTE, false)]),
        ];
        let err = select_adapter(&adapters, &[SWAPCHAIN_EXT]).unwrap_err();
        assert!(matches!(err, DeviceError::NoSuitableDevice { inspected: 2 }));
    }

    #[test]
    fn missing_swapchain_extension_rejects_adapter() {
        let mut a = adapter("old", AdapterKind::Discrete, vec![family(QueueCaps::GRAPHICS, true)]);
        a.extensions.clear();
        assert!(select_adapter(&[a], &[SWAPCHAIN_EXT]).is_err());
    }

    #[test]
    fn discrete_beats_integrated() {
        let adapters = vec![
            adapter("igpu", AdapterKind::Integrated, vec![family(QueueCaps::GRAPHICS, true)]),
            adapter("dgpu", AdapterKind::Discrete, vec![family(QueueCaps::GRAPHICS, true)]),
        ];
        let choice = select_adapter(&adapters, &[SWAPCHAIN_EXT]).unwrap();
        assert_eq!(choice.index, 1);
        assert!(choice.queues.is_shared());
    }

    #[test]
    fn split_families_are_found_and_deduplicated_only_when_equal() {
        let adapters = vec![adapter(
            "split",
            AdapterKind::Discrete,
            vec![
                family(QueueCaps::TRANSFER, false),
                family(QueueCaps::GRAPHICS | QueueCaps::COMPUTE, false),
                family(QueueCaps::empty(), true),
            ],
        )];
        let choice = select_adapter(&adapters, &[SWAPCHAIN_EXT]).unwrap();
        assert_eq!(choice.queues, QueueFamilyIndices { graphics: 1, present: 2 });
        assert_eq!(choice.queues.unique(), vec![1, 2]);
    }

    #[test]
    fn shared_family_preferred_over_first_graphics_family() {
        let adapters = vec![adapter(
            "mixed",
            AdapterKind::Integrated,
            vec![family(QueueCaps::GRAPHICS, false), family(QueueCaps::GRAPHICS, true)],
        )];
        let choice = select_adapter(&adapters, &[SWAPCHAIN_EXT]).unwrap();
        assert_eq!(choice.queues, QueueFamilyIndices { graphics: 1, present: 1 });
        assert_eq!(choice.queues.unique(), vec![1]);
    }

    #[test]
    fn ties_keep_enumeration_order() {
        let adapters = vec![
            adapter("first", AdapterKind::Discrete, vec![family(QueueCaps::GRAPHICS, true)]),
            adapter("second", AdapterKind::Discrete, vec![family(QueueCaps::GRAPHICS, true)]),
        ];
        assert_eq!(select_adapter(&adapters, &[SWAPCHAIN_EXT]).unwrap().index, 0);
    }
}
