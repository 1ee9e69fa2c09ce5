//! Window management using winit.
//!
//! [`Window`] is the engine's Surface Provider: it reports the instance
//! extensions the display needs, creates the `VkSurfaceKHR` through
//! `ash-window`, and reports the live drawable size.

use std::ffi::c_char;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use jvsc_core::{Error, Result, WindowConfig};
use jvsc_rhi::surface::SurfaceProvider;
use jvsc_rhi::{RhiError, RhiResult};

/// The application's single window.
///
/// Owned by the application and passed by reference to the renderer; there
/// is no global instance.
pub struct Window {
    window: Arc<WinitWindow>,
}

impl Window {
    /// Create a resizable window from `config`.
    pub fn new(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        tracing::info!("Window created: {}x{}", config.width, config.height);

        Ok(Self {
            window: Arc::new(window),
        })
    }

    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// True while the window has no drawable area.
    pub fn is_minimized(&self) -> bool {
        let size = self.window.inner_size();
        size.width == 0 || size.height == 0
    }
}

impl SurfaceProvider for Window {
    fn required_instance_extensions(&self) -> RhiResult<&'static [*const c_char]> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get display handle: {e}")))?;

        let extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())?;

        tracing::debug!(
            "Required Vulkan extensions for surface: {:?}",
            extensions
                .iter()
                // SAFETY: ash-window returns pointers to static, null-terminated names.
                .map(|&ext| unsafe { std::ffi::CStr::from_ptr(ext) })
                .collect::<Vec<_>>()
        );

        Ok(extensions)
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> RhiResult<vk::SurfaceKHR> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get display handle: {e}")))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get window handle: {e}")))?;

        // SAFETY: both handles come from a live winit window; the caller
        // wraps the result in an owner that destroys it before the instance.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| RhiError::SurfaceError(format!("Failed to create Vulkan surface: {e}")))?
        };

        tracing::info!("Vulkan surface created");
        Ok(handle)
    }

    fn drawable_extent(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }
}
