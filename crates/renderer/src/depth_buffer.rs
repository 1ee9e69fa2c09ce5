//! Depth buffer management.
//!
//! One [`DepthBuffer`] is created per swapchain image: a GPU-only image in
//! the chosen depth format plus a depth-aspect view. The swapchain manager
//! owns them and tears them down between framebuffers and color views.
//!
//! # Overview
//!
//! - 2D, one mip level, one layer, single-sampled, optimal tiling
//! - Usage `DEPTH_STENCIL_ATTACHMENT` only; never sampled or read back
//! - Memory from `gpu-allocator` in `GpuOnly` memory
//! - Format picked by [`find_depth_format`](jvsc_rhi::render_pass::find_depth_format)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use jvsc_rhi::device::Device;
//! use jvsc_rhi::render_pass::find_depth_format;
//! use jvsc_renderer::depth_buffer::DepthBuffer;
//!
//! # fn example(device: Arc<Device>) -> jvsc_rhi::RhiResult<()> {
//! let format = find_depth_format(&device)?;
//! let extent = vk::Extent2D { width: 800, height: 600 };
//! let depth = DepthBuffer::new(device, extent, format)?;
//! let view = depth.image_view();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use jvsc_rhi::device::Device;
use jvsc_rhi::{RhiError, RhiResult};

/// Depth image, its memory and its view.
///
/// # Resource Destruction
///
/// [`DepthBuffer::destroy`] releases, in order:
/// 1. Image view
/// 2. Image
/// 3. Memory allocation
pub struct DepthBuffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan image handle.
    image: vk::Image,
    /// Depth-aspect view used as the framebuffer attachment.
    image_view: vk::ImageView,
    /// Backing memory; `None` once freed.
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl DepthBuffer {
    /// Creates a depth buffer of `extent` in `format`.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `extent` - Must match the swapchain extent
    /// * `format` - A depth format the device supports as an attachment
    ///
    /// # Errors
    ///
    /// Returns an error for a zero-sized extent, or if image creation,
    /// memory allocation or view creation fails. Partially created
    /// resources are released before returning.
    pub fn new(device: Arc<Device>, extent: vk::Extent2D, format: vk::Format) -> RhiResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::SwapchainError(
                "depth buffer dimensions must be greater than 0".to_string(),
            ));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let mut depth = Self {
            device,
            image,
            image_view: vk::ImageView::null(),
            allocation: None,
            format,
            extent,
        };
        // `depth` owns the image now; any early return cleans up through Drop.

        let requirements = unsafe {
            depth
                .device
                .handle()
                .get_image_memory_requirements(depth.image)
        };
        let allocation = depth.device.allocator()?.allocate(&AllocationCreateDesc {
            name: "depth_buffer",
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        unsafe {
            depth.device.handle().bind_image_memory(
                depth.image,
                allocation.memory(),
                allocation.offset(),
            )?;
        }
        depth.allocation = Some(allocation);

        let view_info = vk::ImageViewCreateInfo::default()
            .image(depth.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        depth.image_view = unsafe { depth.device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created depth buffer: {}x{} ({:?})",
            extent.width, extent.height, format
        );
        Ok(depth)
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Returns the depth-aspect image view.
    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Release the view, image and memory. Idempotent.
    pub fn destroy(&mut self) {
        if self.image_view != vk::ImageView::null() {
            unsafe {
                self.device
                    .handle()
                    .destroy_image_view(self.image_view, None);
            }
            self.image_view = vk::ImageView::null();
        }

        if self.image != vk::Image::null() {
            unsafe {
                self.device.handle().destroy_image(self.image, None);
            }
            self.image = vk::Image::null();
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free depth buffer allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking depth buffer allocation: {}", e),
            }
            debug!(
                "Destroyed depth buffer: {}x{}",
                self.extent.width, self.extent.height
            );
        }
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<DepthBuffer>();
    }
}
