//! Swapchain and everything sized to it.
//!
//! [`SwapchainManager`] owns, per swapchain image, a color view, a depth
//! buffer and a framebuffer, plus the single render pass they share. All of
//! it is built in one go and torn down in one go; there is no partial
//! patching on resize.
//!
//! # Overview
//!
//! | Per image            | Shared              |
//! |----------------------|---------------------|
//! | swapchain image      | render pass         |
//! | color view           | depth format        |
//! | [`DepthBuffer`]      |                     |
//! | framebuffer          |                     |
//!
//! Teardown order is fixed: framebuffers, depth buffers, color views,
//! render pass, swapchain.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use jvsc_rhi::device::Device;
//! use jvsc_rhi::surface::Surface;
//! use jvsc_renderer::SwapchainManager;
//!
//! # fn example(instance: &ash::Instance, device: Arc<Device>, surface: &Surface) -> jvsc_rhi::RhiResult<()> {
//! let extent = vk::Extent2D { width: 800, height: 600 };
//! let mut swapchain = SwapchainManager::build(instance, device.clone(), surface, extent)?;
//!
//! // window resized, device idle
//! device.wait_idle()?;
//! swapchain.rebuild(instance, surface, vk::Extent2D { width: 1024, height: 768 })?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use jvsc_rhi::device::Device;
use jvsc_rhi::render_pass::{Framebuffer, RenderPass, find_depth_format};
use jvsc_rhi::surface::Surface;
use jvsc_rhi::swapchain::Swapchain;
use jvsc_rhi::{RhiError, RhiResult};

use crate::depth_buffer::DepthBuffer;

/// Swapchain images with their index-aligned attachments and framebuffers.
///
/// Framebuffer `i` always binds color view `i` and depth view `i`.
pub struct SwapchainManager {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Swapchain with its images and color views.
    swapchain: Swapchain,
    /// One per swapchain image.
    depth_buffers: Vec<DepthBuffer>,
    render_pass: RenderPass,
    /// One per swapchain image, same index as the color view it binds.
    framebuffers: Vec<Framebuffer>,
    depth_format: vk::Format,
}

impl SwapchainManager {
    /// Build the swapchain and all per-image resources for `extent_hint`.
    ///
    /// # Arguments
    ///
    /// * `instance` - Instance the surface was created from
    /// * `device` - The logical device
    /// * `surface` - Presentation surface
    /// * `extent_hint` - Drawable size, used when the surface leaves it open
    ///
    /// # Errors
    ///
    /// Any failing native call is returned as is. Whatever was already
    /// created is released on the way out.
    pub fn build(
        instance: &ash::Instance,
        device: Arc<Device>,
        surface: &Surface,
        extent_hint: vk::Extent2D,
    ) -> RhiResult<Self> {
        let swapchain = Swapchain::new(instance, device.clone(), surface, extent_hint)?;
        let extent = swapchain.extent();

        let depth_format = find_depth_format(&device)?;
        let depth_buffers = (0..swapchain.image_count())
            .map(|_| DepthBuffer::new(device.clone(), extent, depth_format))
            .collect::<RhiResult<Vec<_>>>()?;

        let render_pass = RenderPass::new(device.clone(), swapchain.format(), depth_format)?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .zip(&depth_buffers)
            .map(|(&color_view, depth)| {
                Framebuffer::new(
                    device.clone(),
                    &render_pass,
                    color_view,
                    depth.image_view(),
                    extent,
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let manager = Self {
            device,
            swapchain,
            depth_buffers,
            render_pass,
            framebuffers,
            depth_format,
        };
        manager.check_index_alignment()?;

        info!(
            "Swapchain resources built: {}x{}, color {:?}, depth {:?}, {} images",
            extent.width,
            extent.height,
            manager.swapchain.format(),
            depth_format,
            manager.image_count()
        );
        Ok(manager)
    }

    /// Tear everything down and build again for `extent_hint`.
    ///
    /// The caller must ensure the device is idle. The new swapchain must
    /// keep the same color and depth formats, since pipelines were built
    /// against the old render pass.
    ///
    /// # Errors
    ///
    /// Any build failure, or [`RhiError::SwapchainError`] if the attachment
    /// formats changed.
    pub fn rebuild(
        &mut self,
        instance: &ash::Instance,
        surface: &Surface,
        extent_hint: vk::Extent2D,
    ) -> RhiResult<()> {
        let old_color = self.swapchain.format();
        let old_depth = self.depth_format;

        self.destroy();
        *self = Self::build(instance, self.device.clone(), surface, extent_hint)?;

        if self.swapchain.format() != old_color || self.depth_format != old_depth {
            return Err(RhiError::SwapchainError(format!(
                "attachment formats changed on rebuild: color {:?} -> {:?}, depth {:?} -> {:?}",
                old_color,
                self.swapchain.format(),
                old_depth,
                self.depth_format
            )));
        }
        Ok(())
    }

    /// Destroy all resources in reverse dependency order. Idempotent.
    pub fn destroy(&mut self) {
        for framebuffer in &mut self.framebuffers {
            framebuffer.destroy();
        }
        self.framebuffers.clear();

        for depth in &mut self.depth_buffers {
            depth.destroy();
        }
        self.depth_buffers.clear();

        self.swapchain.destroy_image_views();
        self.render_pass.destroy();
        self.swapchain.destroy();
        debug!("Swapchain resources destroyed");
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Returns the shared render pass handle.
    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// Framebuffer for swapchain image `image_index`.
    pub fn framebuffer(&self, image_index: u32) -> RhiResult<vk::Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .map(Framebuffer::handle)
            .ok_or_else(|| {
                RhiError::SwapchainError(format!(
                    "image index {image_index} out of range ({} framebuffers)",
                    self.framebuffers.len()
                ))
            })
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Number of swapchain images, which may differ from the frames in flight.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.swapchain.format()
    }

    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Lengths of the per-image arrays owned here: images, color views,
    /// depth buffers, framebuffers.
    pub(crate) fn per_image_lengths(&self) -> [usize; 4] {
        [
            self.swapchain.image_count(),
            self.swapchain.image_views().len(),
            self.depth_buffers.len(),
            self.framebuffers.len(),
        ]
    }

    fn check_index_alignment(&self) -> RhiResult<()> {
        let lengths = self.per_image_lengths();
        uniform_length(&lengths).map(|_| ()).ok_or_else(|| {
            RhiError::SwapchainError(format!("per-image arrays out of step: {lengths:?}"))
        })
    }
}

impl Drop for SwapchainManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// The shared length if every entry is equal and non-zero.
pub(crate) fn uniform_length(lengths: &[usize]) -> Option<usize> {
    let (&first, rest) = lengths.split_first()?;
    (first > 0 && rest.iter().all(|&len| len == first)).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_length_accepts_equal_arrays() {
        assert_eq!(uniform_length(&[3, 3, 3, 3]), Some(3));
        assert_eq!(uniform_length(&[2]), Some(2));
    }

    #[test]
    fn test_uniform_length_rejects_mismatch() {
        assert_eq!(uniform_length(&[3, 3, 2, 3]), None);
        assert_eq!(uniform_length(&[0, 0, 0, 0]), None);
        assert_eq!(uniform_length(&[]), None);
    }

    #[test]
    fn test_manager_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<SwapchainManager>();
    }
}
