//! Draws every entity that has a mesh, one push-constant block per entity.
//!
//! # Overview
//!
//! - One pipeline layout with a single push constant range, no descriptor sets
//! - One graphics pipeline with dynamic viewport and scissor
//! - Per entity: push [`SimplePushConstantData`], bind the mesh, draw
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use jvsc_rhi::command::CommandBuffer;
//! use jvsc_renderer::{Mesh, Renderer, SimpleRenderSystem};
//! use jvsc_scene::EntityTable;
//!
//! # fn example(renderer: &Renderer, cmd: &CommandBuffer, table: &EntityTable, meshes: &[Mesh]) -> jvsc_rhi::RhiResult<()> {
//! let system = SimpleRenderSystem::new(
//!     renderer.device().clone(),
//!     renderer.render_pass_handle(),
//!     Path::new("simple_shader.vert.spv"),
//!     Path::new("simple_shader.frag.spv"),
//! )?;
//!
//! system.render(cmd, renderer.drawable_extent(), table, meshes);
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat2, Vec2, Vec3};
use tracing::{debug, warn};

use jvsc_rhi::RhiResult;
use jvsc_rhi::command::CommandBuffer;
use jvsc_rhi::device::Device;
use jvsc_rhi::pipeline::{GraphicsPipeline, PipelineConfig, PipelineLayout};
use jvsc_scene::EntityTable;

use crate::mesh::Mesh;

/// Push constant block shared by both shader stages.
///
/// Matches the std430 layout of
///
/// ```glsl
/// layout(push_constant) uniform Push {
///     mat2 transform;   // offset 0
///     vec2 offset;      // offset 16
///     vec3 color;       // offset 32
/// } push;
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SimplePushConstantData {
    /// Column-major.
    pub transform: [f32; 4],
    /// Translation in normalized device coordinates.
    pub offset: [f32; 2],
    _pad0: [f32; 2],
    /// Linear RGB.
    pub color: [f32; 3],
    _pad1: f32,
}

impl SimplePushConstantData {
    /// Pack the block; padding stays zeroed.
    pub fn new(transform: Mat2, offset: Vec2, color: Vec3) -> Self {
        Self {
            transform: transform.to_cols_array(),
            offset: offset.to_array(),
            color: color.to_array(),
            ..Self::default()
        }
    }

    /// Size in bytes of the push constant range.
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;
}

const PUSH_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

/// Pipeline and layout for flat-colored 2D meshes.
///
/// # Resource Destruction
///
/// [`SimpleRenderSystem::destroy`] (or drop) destroys the pipeline before
/// its layout. The device must be idle.
pub struct SimpleRenderSystem {
    /// Graphics pipeline; destroyed first.
    pipeline: GraphicsPipeline,
    /// Layout holding the push constant range.
    layout: PipelineLayout,
}

impl SimpleRenderSystem {
    /// Build the layout and pipeline for `render_pass` from the two SPIR-V files.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `render_pass` - Swapchain render pass; see [`Renderer::render_pass_handle`](crate::Renderer::render_pass_handle)
    /// * `vertex_shader` - Compiled vertex stage
    /// * `fragment_shader` - Compiled fragment stage
    ///
    /// # Errors
    ///
    /// Returns an error if a shader file is missing or malformed, or if
    /// layout or pipeline creation fails.
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        vertex_shader: &Path,
        fragment_shader: &Path,
    ) -> RhiResult<Self> {
        let push_range = vk::PushConstantRange::default()
            .stage_flags(PUSH_STAGES)
            .offset(0)
            .size(SimplePushConstantData::SIZE);
        let layout = PipelineLayout::new(device.clone(), &[], &[push_range])?;

        let config = PipelineConfig {
            render_pass,
            layout: layout.handle(),
            ..PipelineConfig::default()
        };
        let pipeline = GraphicsPipeline::new(device, vertex_shader, fragment_shader, &config)?;

        Ok(Self { pipeline, layout })
    }

    /// Record draws for every renderable entity in `table`.
    ///
    /// Mesh ids index into `meshes`; entities pointing past the end are
    /// skipped.
    pub fn render(
        &self,
        cmd: &CommandBuffer,
        extent: vk::Extent2D,
        table: &EntityTable,
        meshes: &[Mesh],
    ) {
        self.pipeline.bind(cmd);

        cmd.set_viewport(&vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        cmd.set_scissor(&vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        });

        for (id, transform, color, mesh_id) in table.renderables() {
            let Some(mesh) = meshes.get(mesh_id.0) else {
                warn!("Entity {:?} refers to missing mesh {:?}", id, mesh_id);
                continue;
            };

            let push =
                SimplePushConstantData::new(transform.mat2(), transform.translation, color);
            cmd.push_constants(self.layout.handle(), PUSH_STAGES, 0, &push);

            mesh.bind(cmd);
            mesh.draw(cmd);
        }
    }

    /// Destroy the pipeline, then its layout.
    pub fn destroy(&mut self) {
        self.pipeline.destroy();
        self.layout.destroy();
        debug!("Simple render system destroyed");
    }
}

impl Drop for SimpleRenderSystem {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use std::mem::{offset_of, size_of};

    use super::*;

    #[test]
    fn test_push_constant_layout() {
        assert_eq!(size_of::<SimplePushConstantData>(), 48);
        assert_eq!(offset_of!(SimplePushConstantData, transform), 0);
        assert_eq!(offset_of!(SimplePushConstantData, offset), 16);
        assert_eq!(offset_of!(SimplePushConstantData, color), 32);
    }

    #[test]
    fn test_push_constant_values() {
        let push = SimplePushConstantData::new(
            Mat2::from_cols(Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0)),
            Vec2::new(0.5, -0.5),
            Vec3::new(0.1, 0.2, 0.3),
        );
        assert_eq!(push.transform, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(push.offset, [0.5, -0.5]);
        assert_eq!(push.color, [0.1, 0.2, 0.3]);
        assert_eq!(bytemuck::bytes_of(&push).len(), 48);
    }

    #[test]
    fn test_push_stages_cover_both_shaders() {
        assert!(PUSH_STAGES.contains(vk::ShaderStageFlags::VERTEX));
        assert!(PUSH_STAGES.contains(vk::ShaderStageFlags::FRAGMENT));
    }
}
