//! Render pass and framebuffer wrappers, plus depth format selection.
//!
//! The engine uses a single render pass: one color attachment that ends up
//! presentable and one depth attachment, cleared on load, in one subpass.
//!
//! # Overview
//!
//! - [`find_depth_format`] picks the first of [`DEPTH_FORMAT_CANDIDATES`]
//!   usable as an optimally tiled depth-stencil attachment
//! - [`RenderPass`] describes the two attachments and the external
//!   dependency that orders this frame's writes after the previous frame's
//! - [`Framebuffer`] binds one swapchain color view and one depth view
//!
//! | Attachment | Load  | Store     | Final layout                         |
//! |------------|-------|-----------|--------------------------------------|
//! | 0 color    | clear | store     | `PRESENT_SRC_KHR`                    |
//! | 1 depth    | clear | don't care| `DEPTH_STENCIL_ATTACHMENT_OPTIMAL`   |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use jvsc_rhi::device::Device;
//! use jvsc_rhi::render_pass::{Framebuffer, RenderPass, find_depth_format};
//!
//! # fn example(
//! #     device: Arc<Device>,
//! #     color_view: vk::ImageView,
//! #     depth_view: vk::ImageView,
//! # ) -> jvsc_rhi::RhiResult<()> {
//! let depth_format = find_depth_format(&device)?;
//! let render_pass = RenderPass::new(device.clone(), vk::Format::B8G8R8A8_SRGB, depth_format)?;
//!
//! let extent = vk::Extent2D { width: 1000, height: 800 };
//! let framebuffer = Framebuffer::new(device, &render_pass, color_view, depth_view, extent)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Depth formats in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// First candidate whose `tiling` features include `features`.
///
/// `properties_of` queries the format properties, which keeps the choice
/// testable without a device.
///
/// # Arguments
///
/// * `candidates` - Formats in order of preference
/// * `tiling` - `LINEAR` or `OPTIMAL`; anything else matches nothing
/// * `features` - Features the format must support for that tiling
/// * `properties_of` - Format property lookup
pub fn find_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    properties_of: impl Fn(vk::Format) -> vk::FormatProperties,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| {
        let props = properties_of(format);
        match tiling {
            vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
            vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
            _ => false,
        }
    })
}

/// Pick the depth format for `device` from [`DEPTH_FORMAT_CANDIDATES`].
///
/// # Errors
///
/// [`RhiError::SwapchainError`] if no candidate is supported.
pub fn find_depth_format(device: &Device) -> RhiResult<vk::Format> {
    find_supported_format(
        &DEPTH_FORMAT_CANDIDATES,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        |format| device.format_properties(format),
    )
    .ok_or_else(|| RhiError::SwapchainError("no supported depth format".to_string()))
}

/// Color + depth render pass with a single subpass.
///
/// Pipelines are created against a render pass and stay valid for any
/// compatible one, i.e. one with the same attachment formats. A swapchain
/// rebuild therefore keeps both formats unchanged.
pub struct RenderPass {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan render pass handle; null once destroyed.
    render_pass: vk::RenderPass,
}

impl RenderPass {
    /// Build the render pass for a swapchain of `color_format` and a depth
    /// attachment of `depth_format`.
    ///
    /// # Errors
    ///
    /// Returns an error if render pass creation fails.
    pub fn new(
        device: Arc<Device>,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> RhiResult<Self> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            vk::AttachmentDescription::default()
                .format(depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)];

        let dependencies = [external_dependency()];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.handle().create_render_pass(&create_info, None)? };
        debug!(
            "Render pass created (color {:?}, depth {:?})",
            color_format, depth_format
        );

        Ok(Self {
            device,
            render_pass,
        })
    }

    /// Returns the Vulkan render pass handle.
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Destroy the render pass. Idempotent; also called on drop.
    ///
    /// Every framebuffer built from it must already be destroyed.
    pub fn destroy(&mut self) {
        if self.render_pass != vk::RenderPass::null() {
            unsafe {
                self.device
                    .handle()
                    .destroy_render_pass(self.render_pass, None);
            }
            self.render_pass = vk::RenderPass::null();
        }
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Color and depth writes of subpass 0 wait for earlier color output and
/// early fragment tests.
fn external_dependency() -> vk::SubpassDependency {
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(stages)
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
}

/// Framebuffer binding one color view and one depth view.
pub struct Framebuffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan framebuffer handle; null once destroyed.
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Creates a single-layer framebuffer for `render_pass`.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `render_pass` - Render pass the framebuffer must be compatible with
    /// * `color_view` - Swapchain image view for attachment 0
    /// * `depth_view` - Depth image view for attachment 1
    /// * `extent` - Size of both views
    ///
    /// # Errors
    ///
    /// Returns an error if framebuffer creation fails.
    pub fn new(
        device: Arc<Device>,
        render_pass: &RenderPass,
        color_view: vk::ImageView,
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let attachments = [color_view, depth_view];
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };
        Ok(Self {
            device,
            framebuffer,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    /// Destroy the framebuffer. Idempotent; also called on drop.
    pub fn destroy(&mut self) {
        if self.framebuffer != vk::Framebuffer::null() {
            unsafe {
                self.device
                    .handle()
                    .destroy_framebuffer(self.framebuffer, None);
            }
            self.framebuffer = vk::Framebuffer::null();
        }
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimal(features: vk::FormatFeatureFlags) -> vk::FormatProperties {
        vk::FormatProperties {
            optimal_tiling_features: features,
            ..Default::default()
        }
    }

    #[test]
    fn test_depth_format_takes_first_supported() {
        let chosen = find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| optimal(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT),
        );
        assert_eq!(chosen, Some(vk::Format::D32_SFLOAT));
    }

    #[test]
    fn test_depth_format_skips_unsupported() {
        let chosen = find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |format| {
                if format == vk::Format::D24_UNORM_S8_UINT {
                    optimal(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
                } else {
                    optimal(vk::FormatFeatureFlags::SAMPLED_IMAGE)
                }
            },
        );
        assert_eq!(chosen, Some(vk::Format::D24_UNORM_S8_UINT));
    }

    #[test]
    fn test_depth_format_checks_requested_tiling() {
        // Linear support alone does not satisfy an optimal-tiling request.
        let chosen = find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| vk::FormatProperties {
                linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
                ..Default::default()
            },
        );
        assert_eq!(chosen, None);
    }

    #[test]
    fn test_external_dependency_orders_attachment_writes() {
        let dep = external_dependency();
        assert_eq!(dep.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dep.dst_subpass, 0);
        assert!(dep
            .dst_stage_mask
            .contains(vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS));
        assert!(dep
            .dst_access_mask
            .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
        assert!(dep.src_access_mask.is_empty());
    }
}
