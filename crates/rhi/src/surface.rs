//! Presentation surface boundary.
//!
//! The engine never talks to a window system directly. Anything that can
//! hand out a `VkSurfaceKHR` and report its drawable size implements
//! [`SurfaceProvider`]; [`Surface`] then owns the created handle.
//!
//! # Overview
//!
//! - [`SurfaceProvider`] is the only window-system dependency of the engine
//! - [`Surface`] destroys the handle on drop, before the instance goes
//! - [`wait_for_nonzero_extent`] blocks while a window is minimized
//!
//! # Example
//!
//! ```no_run
//! use jvsc_rhi::instance::Instance;
//! use jvsc_rhi::surface::{Surface, SurfaceProvider, wait_for_nonzero_extent};
//!
//! # fn example(window: &dyn SurfaceProvider) -> jvsc_rhi::RhiResult<()> {
//! let instance = Instance::new(window.required_instance_extensions()?, false)?;
//! let surface = Surface::new(&instance, window)?;
//!
//! // Before (re)building a swapchain, make sure there is something to draw into
//! let (extent, _zero_polls) = wait_for_nonzero_extent(window);
//! assert!(extent.width > 0 && extent.height > 0);
//! # Ok(())
//! # }
//! ```

use std::ffi::c_char;
use std::time::Duration;

use ash::vk;
use tracing::debug;

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Something that owns a native window and can present through Vulkan.
///
/// Implemented by the platform window; tests implement it with scripted
/// drawable sizes.
pub trait SurfaceProvider {
    /// Instance extensions the window system needs for surface creation.
    fn required_instance_extensions(&self) -> RhiResult<&'static [*const c_char]>;

    /// Create a surface for `instance`. Failure is fatal for startup.
    ///
    /// # Safety contract
    ///
    /// The returned handle must be destroyed before `instance`; [`Surface`]
    /// takes care of that when created through [`Surface::new`].
    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> RhiResult<vk::SurfaceKHR>;

    /// Current drawable size in pixels. `(0, 0)` while minimized.
    fn drawable_extent(&self) -> vk::Extent2D;

    /// Give the window system a chance to run while the surface is unusable.
    ///
    /// Called between polls of [`drawable_extent`](Self::drawable_extent)
    /// that reported zero. Defaults to a 10 ms sleep.
    fn wait_events(&self) {
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// RAII owner of a `vk::SurfaceKHR` plus the surface extension loader.
///
/// The caller must keep the [`Instance`] alive for as long as this exists.
pub struct Surface {
    /// Vulkan surface handle.
    handle: vk::SurfaceKHR,
    /// `VK_KHR_surface` function table.
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Ask `provider` for a surface on `instance`.
    ///
    /// # Errors
    ///
    /// Whatever the provider reports, or [`RhiError::SurfaceError`] if it
    /// returns a null handle.
    pub fn new(instance: &Instance, provider: &dyn SurfaceProvider) -> RhiResult<Self> {
        let handle = provider.create_surface(instance.entry(), instance.handle())?;
        if handle == vk::SurfaceKHR::null() {
            return Err(RhiError::SurfaceError(
                "surface provider returned a null surface".to_string(),
            ));
        }
        let loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
        debug!("Vulkan surface created");
        Ok(Self { handle, loader })
    }

    /// Get the raw Vulkan surface handle.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Get a reference to the surface loader.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }

    /// Whether queue family `family_index` of `device` can present here.
    ///
    /// # Errors
    ///
    /// Returns an error if the support query itself fails.
    pub fn supports_present(
        &self,
        device: vk::PhysicalDevice,
        family_index: u32,
    ) -> RhiResult<bool> {
        Ok(unsafe {
            self.loader
                .get_physical_device_surface_support(device, family_index, self.handle)?
        })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        debug!("Vulkan surface destroyed");
    }
}

/// Poll `provider` until it reports a non-zero drawable size.
///
/// Blocks for as long as the window stays minimized. Returns the first
/// usable extent together with the number of polls that saw zero. The
/// count saturates instead of wrapping.
pub fn wait_for_nonzero_extent(provider: &dyn SurfaceProvider) -> (vk::Extent2D, u32) {
    let mut zero_polls = 0;
    loop {
        let extent = provider.drawable_extent();
        if extent.width != 0 && extent.height != 0 {
            return (extent, zero_polls);
        }
        zero_polls = zero_polls.saturating_add(1);
        provider.wait_events();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Reports a scripted sequence of extents, repeating the last one.
    pub(crate) struct ScriptedProvider {
        extents: RefCell<Vec<vk::Extent2D>>,
        pub(crate) polls: RefCell<u32>,
    }

    impl ScriptedProvider {
        pub(crate) fn new(extents: &[(u32, u32)]) -> Self {
            Self {
                extents: RefCell::new(
                    extents
                        .iter()
                        .rev()
                        .map(|&(width, height)| vk::Extent2D { width, height })
                        .collect(),
                ),
                polls: RefCell::new(0),
            }
        }
    }

    impl SurfaceProvider for ScriptedProvider {
        fn required_instance_extensions(&self) -> RhiResult<&'static [*const c_char]> {
            Ok(&[])
        }

        fn create_surface(
            &self,
            _entry: &ash::Entry,
            _instance: &ash::Instance,
        ) -> RhiResult<vk::SurfaceKHR> {
            Err(RhiError::SurfaceError("scripted provider has no window".into()))
        }

        fn drawable_extent(&self) -> vk::Extent2D {
            *self.polls.borrow_mut() += 1;
            let mut extents = self.extents.borrow_mut();
            if extents.len() > 1 {
                extents.pop().unwrap_or_default()
            } else {
                extents.last().copied().unwrap_or_default()
            }
        }

        fn wait_events(&self) {}
    }

    #[test]
    fn test_wait_returns_immediately_when_visible() {
        let provider = ScriptedProvider::new(&[(800, 600)]);
        let (extent, zero_polls) = wait_for_nonzero_extent(&provider);
        assert_eq!((extent.width, extent.height), (800, 600));
        assert_eq!(zero_polls, 0);
    }

    #[test]
    fn test_wait_polls_through_minimized_window() {
        let provider = ScriptedProvider::new(&[(0, 0), (0, 0), (0, 0), (800, 600)]);
        let (extent, zero_polls) = wait_for_nonzero_extent(&provider);
        assert_eq!((extent.width, extent.height), (800, 600));
        assert_eq!(zero_polls, 3);
        assert_eq!(*provider.polls.borrow(), 4);
    }

    #[test]
    fn test_wait_treats_single_zero_dimension_as_minimized() {
        let provider = ScriptedProvider::new(&[(1024, 0), (0, 768), (1024, 768)]);
        let (extent, zero_polls) = wait_for_nonzero_extent(&provider);
        assert_eq!((extent.width, extent.height), (1024, 768));
        assert_eq!(zero_polls, 2);
    }
}
