//! Renderer facade.
//!
//! [`Renderer`] owns the Vulkan instance, the presentation surface, the
//! logical device and the [`FrameEngine`], and exposes the draw-call
//! boundary used by the application and its render systems.
//!
//! # Example
//!
//! ```no_run
//! use jvsc_core::RendererConfig;
//! use jvsc_rhi::SurfaceProvider;
//! use jvsc_renderer::Renderer;
//!
//! # fn example(window: &dyn SurfaceProvider) -> jvsc_rhi::RhiResult<()> {
//! let mut renderer = Renderer::new(window, &RendererConfig::default())?;
//!
//! if let Some(cmd) = renderer.begin_frame(window)? {
//!     renderer.begin_render_pass(&cmd)?;
//!     // render systems record draws here
//!     renderer.end_render_pass(&cmd)?;
//!     renderer.end_frame(&cmd, window)?;
//! }
//!
//! renderer.wait_idle()?;
//! # Ok(())
//! # }
//! ```

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use tracing::{error, info};

use jvsc_core::RendererConfig;
use jvsc_rhi::RhiResult;
use jvsc_rhi::command::CommandBuffer;
use jvsc_rhi::device::Device;
use jvsc_rhi::instance::Instance;
use jvsc_rhi::physical_device::select_physical_device;
use jvsc_rhi::surface::{Surface, SurfaceProvider};

use crate::frame_engine::{FrameEngine, PresentTarget};

/// Everything between the window and the draw calls.
///
/// # Resource Destruction Order
///
/// 1. Wait for the device to go idle
/// 2. Frame engine (framebuffers, depth, views, render pass, swapchain, sync, commands)
/// 3. Surface
/// 4. Device
/// 5. Instance
///
/// Meshes and render systems hold their own device references and must be
/// destroyed and dropped before the renderer. If any are still alive when
/// the renderer drops, the instance is leaked rather than destroyed under
/// a live device.
///
/// # Thread Safety
///
/// Frame calls take `&mut self` and must come from the thread that owns the
/// window's event loop.
pub struct Renderer {
    engine: ManuallyDrop<FrameEngine>,
    device: ManuallyDrop<Arc<Device>>,
    surface: ManuallyDrop<Surface>,
    instance: ManuallyDrop<Instance>,
}

impl Renderer {
    /// Bring up Vulkan for the surface `provider` supplies.
    ///
    /// # Arguments
    ///
    /// * `provider` - Window or other surface source; it is only borrowed
    /// * `config` - Validation toggle and related renderer settings
    ///
    /// # Errors
    ///
    /// All failures here are fatal startup errors: no Vulkan loader, no
    /// surface, no suitable GPU, or any failing creation call.
    pub fn new(provider: &dyn SurfaceProvider, config: &RendererConfig) -> RhiResult<Self> {
        let extent = provider.drawable_extent();
        info!(
            "Initializing Vulkan renderer ({}x{})",
            extent.width, extent.height
        );

        let instance = Instance::new(provider.required_instance_extensions()?, config.validation)?;
        let surface = Surface::new(&instance, provider)?;
        let physical_device_info = select_physical_device(instance.handle(), &surface)?;
        let device = Device::new(&instance, &physical_device_info)?;

        let engine = FrameEngine::new(
            device.clone(),
            &PresentTarget {
                instance: instance.handle(),
                surface: &surface,
                provider,
            },
        )?;

        info!(
            "Renderer initialized on {} ({} swapchain images)",
            physical_device_info.device_name(),
            engine.image_count()
        );

        Ok(Self {
            engine: ManuallyDrop::new(engine),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
        })
    }

    /// See [`FrameEngine::begin_frame`]. `None` means skip this frame.
    pub fn begin_frame(
        &mut self,
        provider: &dyn SurfaceProvider,
    ) -> RhiResult<Option<CommandBuffer>> {
        let target = PresentTarget {
            instance: self.instance.handle(),
            surface: &self.surface,
            provider,
        };
        self.engine.begin_frame(&target)
    }

    /// Begin the swapchain render pass on the acquired image's framebuffer.
    pub fn begin_render_pass(&self, cmd: &CommandBuffer) -> RhiResult<()> {
        self.engine.begin_render_pass(cmd)
    }

    pub fn end_render_pass(&self, cmd: &CommandBuffer) -> RhiResult<()> {
        self.engine.end_render_pass(cmd)
    }

    /// Submit and present. See [`FrameEngine::end_frame`].
    pub fn end_frame(&mut self, cmd: &CommandBuffer, provider: &dyn SurfaceProvider) -> RhiResult<()> {
        let target = PresentTarget {
            instance: self.instance.handle(),
            surface: &self.surface,
            provider,
        };
        self.engine.end_frame(cmd, &target)
    }

    /// The window changed size; rebuild after the next present.
    pub fn notify_resized(&mut self) {
        self.engine.request_resize();
    }

    /// Shared logical device, for creating meshes and pipelines.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    #[inline]
    pub fn device_handle(&self) -> &ash::Device {
        self.device.handle()
    }

    /// Render pass pipelines must be compatible with. Stable across rebuilds.
    #[inline]
    pub fn render_pass_handle(&self) -> vk::RenderPass {
        self.engine.render_pass()
    }

    /// Extent of the current swapchain images.
    #[inline]
    pub fn drawable_extent(&self) -> vk::Extent2D {
        self.engine.extent()
    }

    /// Width over height of the drawable; a zero height counts as 1.
    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.drawable_extent();
        extent.width as f32 / extent.height.max(1) as f32
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.engine.image_count()
    }

    /// Index of the frame slot the next `begin_frame` will use.
    #[inline]
    pub fn frame_slot(&self) -> usize {
        self.engine.frame_slot()
    }

    /// Block until the GPU is idle. Call before destroying meshes.
    ///
    /// # Errors
    ///
    /// Returns an error if `vkDeviceWaitIdle` fails, usually device loss.
    pub fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {}", e);
        }

        unsafe {
            ManuallyDrop::drop(&mut self.engine);
            ManuallyDrop::drop(&mut self.surface);
        }

        // Counted after the engine is gone: it holds clones of its own.
        let outstanding = Arc::strong_count(&self.device).saturating_sub(1);
        unsafe {
            ManuallyDrop::drop(&mut self.device);
        }

        if outstanding > 0 {
            error!(
                "{} device reference(s) outlive the renderer; leaking the Vulkan instance",
                outstanding
            );
            return;
        }

        unsafe {
            ManuallyDrop::drop(&mut self.instance);
        }
        info!("Renderer destroyed");
    }
}
