//! Swapchain creation, image acquisition and presentation.
//!
//! The swapchain is never patched in place: a resize destroys the old one
//! (see [`Swapchain::destroy`]) and builds a fresh one. The pure selection
//! helpers ([`plan_swapchain`] and friends) decide format, present mode,
//! extent and image count from the surface's reported support.
//!
//! # Overview
//!
//! | Choice       | Rule                                                        |
//! |--------------|-------------------------------------------------------------|
//! | Format       | `B8G8R8A8_SRGB` + `SRGB_NONLINEAR`, else the first offered  |
//! | Present mode | `MAILBOX` when offered, else `FIFO`                         |
//! | Extent       | surface's current extent, else the hint clamped to limits   |
//! | Image count  | `min + 1`, capped at `max` unless `max` is 0                |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use jvsc_rhi::device::Device;
//! use jvsc_rhi::surface::Surface;
//! use jvsc_rhi::swapchain::Swapchain;
//!
//! # fn example(
//! #     instance: &ash::Instance,
//! #     device: Arc<Device>,
//! #     surface: &Surface,
//! #     image_available: vk::Semaphore,
//! #     render_finished: vk::Semaphore,
//! # ) -> jvsc_rhi::RhiResult<()> {
//! let hint = vk::Extent2D { width: 1000, height: 800 };
//! let swapchain = Swapchain::new(instance, device.clone(), surface, hint)?;
//!
//! match swapchain.acquire_next_image(image_available) {
//!     Ok((image_index, _suboptimal)) => {
//!         // ... record and submit, signaling render_finished ...
//!         let _ = swapchain.present(device.present_queue(), image_index, render_finished);
//!     }
//!     Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => { /* rebuild */ }
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::surface::Surface;

/// What a surface supports for swapchain creation.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Image count, extent and transform limits.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format and color space pairs.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported presentation modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the three surface queries fails.
    pub fn query(surface: &Surface, physical_device: vk::PhysicalDevice) -> RhiResult<Self> {
        let loader = surface.loader();
        let handle = surface.handle();
        let capabilities =
            unsafe { loader.get_physical_device_surface_capabilities(physical_device, handle)? };
        let formats = unsafe { loader.get_physical_device_surface_formats(physical_device, handle)? };
        let present_modes =
            unsafe { loader.get_physical_device_surface_present_modes(physical_device, handle)? };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// At least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Every choice needed to create a swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainPlan {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

/// Resolve format, present mode, extent and image count.
///
/// # Errors
///
/// Returns [`RhiError::SwapchainError`] when the surface offers no formats
/// or no present modes.
pub fn plan_swapchain(
    support: &SwapchainSupportDetails,
    extent_hint: vk::Extent2D,
) -> RhiResult<SwapchainPlan> {
    if !support.is_adequate() {
        return Err(RhiError::SwapchainError(
            "Inadequate swapchain support (no formats or present modes)".to_string(),
        ));
    }
    let surface_format = choose_surface_format(&support.formats)
        .ok_or_else(|| RhiError::SwapchainError("surface reports no formats".to_string()))?;

    Ok(SwapchainPlan {
        surface_format,
        present_mode: choose_present_mode(&support.present_modes),
        extent: choose_extent(&support.capabilities, extent_hint),
        image_count: determine_image_count(&support.capabilities),
        pre_transform: support.capabilities.current_transform,
    })
}

/// Prefers B8G8R8A8_SRGB with SRGB_NONLINEAR, else the first format offered.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });
    if let Some(&format) = preferred {
        return Some(format);
    }

    let first = formats.first().copied();
    if let Some(format) = first {
        warn!(
            "Preferred surface format unavailable, using {:?} / {:?}",
            format.format, format.color_space
        );
    }
    first
}

/// MAILBOX when offered, otherwise FIFO (always supported).
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent when defined, else `hint` clamped to limits.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, hint: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: hint.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: hint.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// `min + 1`, capped at `max` unless `max` is 0 (no limit).
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

/// Vulkan swapchain plus one color view per image.
///
/// Teardown is explicit: the owner calls [`Swapchain::destroy_image_views`]
/// and [`Swapchain::destroy`] in its own order. `Drop` only cleans up
/// whatever is still alive.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Creates a swapchain sized to `extent_hint` (or the surface's own extent).
    ///
    /// Images are shared concurrently when graphics and present families
    /// differ, exclusively otherwise.
    ///
    /// # Arguments
    ///
    /// * `instance` - Instance used to load the swapchain extension
    /// * `device` - Logical device with resolved graphics and present families
    /// * `surface` - Surface to present to
    /// * `extent_hint` - Used only when the surface leaves the extent to us
    ///
    /// # Errors
    ///
    /// Returns an error if the surface offers no formats or present modes,
    /// the device lacks a queue family, or any creation call fails.
    pub fn new(
        instance: &ash::Instance,
        device: Arc<Device>,
        surface: &Surface,
        extent_hint: vk::Extent2D,
    ) -> RhiResult<Self> {
        let support = SwapchainSupportDetails::query(surface, device.physical_device())?;
        let plan = plan_swapchain(&support, extent_hint)?;

        let queue_families = device.queue_families();
        let (Some(graphics_family), Some(present_family)) =
            (queue_families.graphics_family, queue_families.present_family)
        else {
            return Err(RhiError::SwapchainError(
                "device has no graphics/present family".to_string(),
            ));
        };
        let family_indices = [graphics_family, present_family];
        let (sharing_mode, shared_families) = if graphics_family != present_family {
            (vk::SharingMode::CONCURRENT, family_indices.as_slice())
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(plan.image_count)
            .image_format(plan.surface_format.format)
            .image_color_space(plan.surface_format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(shared_families)
            .pre_transform(plan.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(plan.present_mode)
            .clipped(true);

        let loader = ash::khr::swapchain::Device::new(instance, device.handle());
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };

        let mut this = Self {
            device,
            loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format: plan.surface_format.format,
            extent: plan.extent,
            present_mode: plan.present_mode,
        };
        // From here on `this` owns the handle, so errors clean up through Drop.
        this.images = unsafe { this.loader.get_swapchain_images(swapchain)? };
        this.image_views = create_image_views(&this.device, &this.images, this.format)?;

        info!(
            "Swapchain created: {}x{}, {:?}, {:?}, {} images",
            plan.extent.width,
            plan.extent.height,
            plan.surface_format.format,
            plan.present_mode,
            this.images.len()
        );
        Ok(this)
    }

    /// Acquire the next image, waiting without timeout.
    ///
    /// Returns `(image_index, suboptimal)`. `ERROR_OUT_OF_DATE_KHR` comes
    /// back as the error so the caller can rebuild.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    /// Queue `image_index` for presentation after `wait_semaphore`.
    ///
    /// Returns `true` when the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    /// Returns the Vulkan swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Number of images the driver actually created, which may exceed the
    /// requested count.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// One color view per image, index-aligned with the images.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Destroy the per-image color views. Idempotent.
    pub fn destroy_image_views(&mut self) {
        for image_view in self.image_views.drain(..) {
            unsafe {
                self.device.handle().destroy_image_view(image_view, None);
            }
        }
    }

    /// Destroy the swapchain object itself. Idempotent.
    ///
    /// Views must already be gone; any left over are destroyed first.
    pub fn destroy(&mut self) {
        self.destroy_image_views();
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
            self.swapchain = vk::SwapchainKHR::null();
            self.images.clear();
            debug!(
                "Swapchain destroyed (was {}x{})",
                self.extent.width, self.extent.height
            );
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for view in image_views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::SwapchainError(format!(
                    "Failed to create image view {i}: {e:?}"
                )));
            }
        }
    }

    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_choose_surface_format_prefers_bgra_srgb() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_SRGB),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];
        let selected = choose_surface_format(&formats).unwrap();
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];
        let selected = choose_surface_format(&formats).unwrap();
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn test_srgb_format_with_other_color_space_is_not_preferred() {
        let formats = [
            surface_format(vk::Format::R16G16B16A16_SFLOAT),
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            },
        ];
        let selected = choose_surface_format(&formats).unwrap();
        assert_eq!(selected.format, vk::Format::R16G16B16A16_SFLOAT);
    }

    #[test]
    fn test_choose_present_mode() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);

        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(1920, 1080),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        };
        assert_eq!(choose_extent(&capabilities, extent(800, 600)), extent(1920, 1080));
    }

    #[test]
    fn test_choose_extent_clamps_hint() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(100, 100),
            max_image_extent: extent(2000, 2000),
            ..Default::default()
        };
        assert_eq!(choose_extent(&capabilities, extent(3000, 3000)), extent(2000, 2000));
        assert_eq!(choose_extent(&capabilities, extent(50, 50)), extent(100, 100));
        assert_eq!(choose_extent(&capabilities, extent(800, 600)), extent(800, 600));
    }

    #[test]
    fn test_determine_image_count_within_bounds() {
        for (min, max) in [(1, 1), (2, 3), (2, 8), (3, 3), (2, 0), (4, 0)] {
            let capabilities = vk::SurfaceCapabilitiesKHR {
                min_image_count: min,
                max_image_count: max,
                ..Default::default()
            };
            let count = determine_image_count(&capabilities);
            assert!(count >= min, "count {count} below min {min}");
            if max > 0 {
                assert!(count <= max, "count {count} above max {max}");
            } else {
                assert_eq!(count, min + 1);
            }
        }
    }

    #[test]
    fn test_plan_for_fifo_only_bgra_surface() {
        let support = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 3,
                current_extent: extent(800, 600),
                ..Default::default()
            },
            formats: vec![surface_format(vk::Format::B8G8R8A8_SRGB)],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };

        let plan = plan_swapchain(&support, extent(1000, 800)).unwrap();
        assert_eq!(plan.surface_format.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(
            plan.surface_format.color_space,
            vk::ColorSpaceKHR::SRGB_NONLINEAR
        );
        assert_eq!(plan.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(plan.image_count, 3);
        assert_eq!(plan.extent, extent(800, 600));
    }

    #[test]
    fn test_plan_rejects_inadequate_support() {
        let support = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(matches!(
            plan_swapchain(&support, extent(800, 600)),
            Err(RhiError::SwapchainError(_))
        ));
    }
}
