//! Physical device (GPU) selection.
//!
//! Devices are checked in enumeration order and the first one that passes
//! every requirement is used:
//! 1. Graphics and present queue families (same or different)
//! 2. `VK_KHR_swapchain` support
//! 3. An adequate swapchain (at least one format and one present mode)
//! 4. Sampler anisotropy
//!
//! Queue family indices are resolved once here and carried unchanged into
//! the logical device.
//!
//! # Example
//!
//! ```no_run
//! use jvsc_rhi::instance::Instance;
//! use jvsc_rhi::physical_device::select_physical_device;
//! use jvsc_rhi::surface::Surface;
//!
//! # fn example(instance: &Instance, surface: &Surface) -> jvsc_rhi::RhiResult<()> {
//! let info = select_physical_device(instance.handle(), surface)?;
//! println!("Using {} ({})", info.device_name(), info.device_type_name());
//!
//! // One queue is created per distinct family
//! let families = info.queue_families.unique_families();
//! assert!(!families.is_empty());
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};
use crate::surface::Surface;
use crate::swapchain::SwapchainSupportDetails;

/// Device extensions every candidate must expose.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Queue family indices used by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that can present to the surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both graphics and present families are known.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Distinct family indices, one queue is created per entry.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }
        families
    }
}

/// Information about the selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Name, type, limits and API version.
    pub properties: vk::PhysicalDeviceProperties,
    /// Optional features the device supports.
    pub features: vk::PhysicalDeviceFeatures,
    /// Resolved graphics and present families, both present.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{major}.{minor}.{patch}"))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Picks the first physical device that can render to `surface`.
///
/// A failing present-support query for one family is logged and treated
/// as "cannot present" for that family.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no device passes every check,
/// and any error from enumerating devices or their extensions.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: &Surface,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }
    info!("Found {} GPU(s)", devices.len());

    for device in devices {
        if let Some(selected) = check_device_suitability(instance, device, surface)? {
            let (major, minor, patch) = selected.api_version();
            info!(
                "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}",
                selected.device_name(),
                selected.device_type_name(),
                major,
                minor,
                patch
            );
            return Ok(selected);
        }
    }

    warn!("No suitable GPU found with required capabilities");
    Err(RhiError::NoSuitableGpu)
}

fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: &Surface,
) -> RhiResult<Option<PhysicalDeviceInfo>> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let name = properties
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let family_properties = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let queue_families = resolve_queue_families(&family_properties, |index| {
        present_support_or_log(surface.supports_present(device, index), &name, index)
    });
    if !queue_families.is_complete() {
        debug!(
            "GPU '{}' skipped: missing queue families (graphics={}, present={})",
            name,
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some()
        );
        return Ok(None);
    }

    let available = unsafe { instance.enumerate_device_extension_properties(device)? };
    let missing = missing_extensions(&available, REQUIRED_DEVICE_EXTENSIONS);
    if !missing.is_empty() {
        debug!("GPU '{}' skipped: missing extensions {:?}", name, missing);
        return Ok(None);
    }

    // Only meaningful once the swapchain extension is known to exist.
    let support = SwapchainSupportDetails::query(surface, device)?;
    if !support.is_adequate() {
        debug!("GPU '{}' skipped: no surface formats or present modes", name);
        return Ok(None);
    }

    if features.sampler_anisotropy == vk::FALSE {
        debug!("GPU '{}' skipped: sampler anisotropy not supported", name);
        return Ok(None);
    }

    Ok(Some(PhysicalDeviceInfo {
        device,
        properties,
        features,
        queue_families,
    }))
}

/// Resolves graphics and present family indices.
///
/// The first family with graphics support is used for graphics. Present
/// uses that same family when it can present, else the first family that can.
pub fn resolve_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: impl Fn(u32) -> bool,
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let can_present = present_support(i);

        if has_graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
            if can_present {
                indices.present_family = Some(i);
            }
        }
        if can_present && indices.present_family.is_none() {
            indices.present_family = Some(i);
        }

        if indices.is_complete() && indices.graphics_family == indices.present_family {
            break;
        }
    }

    indices
}

/// A failed present-support query counts as "cannot present" and is logged.
fn present_support_or_log(result: RhiResult<bool>, gpu_name: &str, family_index: u32) -> bool {
    result.unwrap_or_else(|e| {
        debug!(
            "GPU '{}': present support query for family {} failed: {}",
            gpu_name, family_index, e
        );
        false
    })
}

/// Returns the entries of `required` that `available` does not list.
pub fn missing_extensions<'a>(
    available: &[vk::ExtensionProperties],
    required: &[&'a CStr],
) -> Vec<&'a CStr> {
    required
        .iter()
        .copied()
        .filter(|wanted| {
            !available
                .iter()
                .any(|ext| ext.extension_name_as_c_str().is_ok_and(|name| name == *wanted))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        vk::ExtensionProperties::default()
            .extension_name(name)
            .expect("extension name fits")
    }

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(indices.graphics_family.is_none());
        assert!(indices.present_family.is_none());
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_unique_families() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(split.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_resolve_shared_family() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 4)];
        let indices = resolve_queue_families(&families, |_| true);
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(0));
    }

    #[test]
    fn test_resolve_separate_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::TRANSFER, 1),
        ];
        let indices = resolve_queue_families(&families, |i| i == 1);
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(1));
        assert_eq!(indices.unique_families().len(), 2);
    }

    #[test]
    fn test_resolve_prefers_shared_present_family() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        // Family 0 can present, but family 1 does both and wins.
        let indices = resolve_queue_families(&families, |_| true);
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, Some(1));

        let indices = resolve_queue_families(&families, |i| i == 0);
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, Some(0));
    }

    #[test]
    fn test_resolve_skips_empty_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        let indices = resolve_queue_families(&families, |_| true);
        assert_eq!(indices.graphics_family, Some(1));
    }

    #[test]
    fn test_failed_present_query_falls_through_to_next_family() {
        assert!(!present_support_or_log(
            Err(RhiError::VulkanError(vk::Result::ERROR_SURFACE_LOST_KHR)),
            "test gpu",
            0
        ));
        assert!(present_support_or_log(Ok(true), "test gpu", 1));

        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::TRANSFER, 1),
        ];
        let indices = resolve_queue_families(&families, |i| {
            let result = if i == 0 {
                Err(RhiError::VulkanError(vk::Result::ERROR_SURFACE_LOST_KHR))
            } else {
                Ok(true)
            };
            present_support_or_log(result, "test gpu", i)
        });
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(1));
    }

    #[test]
    fn test_resolve_incomplete_without_present() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        let indices = resolve_queue_families(&families, |_| false);
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_missing_extensions() {
        let available = [extension(ash::khr::swapchain::NAME)];
        assert!(missing_extensions(&available, REQUIRED_DEVICE_EXTENSIONS).is_empty());

        let missing = missing_extensions(&[], REQUIRED_DEVICE_EXTENSIONS);
        assert_eq!(missing, vec![ash::khr::swapchain::NAME]);
    }
}
