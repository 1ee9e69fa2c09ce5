//! Pipeline layout and graphics pipeline creation.
//!
//! # Overview
//!
//! - [`PipelineLayout`] wraps VkPipelineLayout (push constant ranges only in practice)
//! - [`PipelineConfig`] holds every fixed-function setting with documented defaults
//! - [`GraphicsPipeline`] compiles a vertex + fragment pair against one render pass
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use jvsc_rhi::device::Device;
//! use jvsc_rhi::pipeline::{GraphicsPipeline, PipelineConfig, PipelineLayout};
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>, render_pass: vk::RenderPass) -> jvsc_rhi::RhiResult<()> {
//! let layout = PipelineLayout::new(device.clone(), &[], &[])?;
//! let config = PipelineConfig {
//!     render_pass,
//!     layout: layout.handle(),
//!     ..PipelineConfig::default()
//! };
//! let pipeline = GraphicsPipeline::new(
//!     device,
//!     Path::new("simple_shader.vert.spv"),
//!     Path::new("simple_shader.frag.spv"),
//!     &config,
//! )?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::command::CommandBuffer;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::{Shader, ShaderStage};
use crate::vertex::Vertex2D;

/// Vulkan pipeline layout wrapper.
///
/// # Resource Destruction
///
/// The layout is destroyed on drop. It may be destroyed as soon as every
/// pipeline created against it is gone.
pub struct PipelineLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan pipeline layout handle.
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a pipeline layout.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `descriptor_set_layouts` - Set layouts, empty for the 2D path
    /// * `push_constant_ranges` - Push constant ranges visible to the shaders
    ///
    /// # Errors
    ///
    /// Returns an error if `vkCreatePipelineLayout` fails.
    pub fn new(
        device: Arc<Device>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Created pipeline layout with {} set layout(s) and {} push constant range(s)",
            descriptor_set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan pipeline layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Idempotent.
    pub fn destroy(&mut self) {
        if self.layout != vk::PipelineLayout::null() {
            unsafe {
                self.device
                    .handle()
                    .destroy_pipeline_layout(self.layout, None);
            }
            self.layout = vk::PipelineLayout::null();
        }
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Primitive topology for input assembly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

impl PrimitiveTopology {
    /// Converts to the Vulkan enum.
    pub fn to_vk(self) -> vk::PrimitiveTopology {
        match self {
            PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
            PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
            PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
            PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        }
    }
}

/// Rasterization fill mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

impl PolygonMode {
    pub fn to_vk(self) -> vk::PolygonMode {
        match self {
            PolygonMode::Fill => vk::PolygonMode::FILL,
            PolygonMode::Line => vk::PolygonMode::LINE,
            PolygonMode::Point => vk::PolygonMode::POINT,
        }
    }
}

/// Face culling. 2D meshes are drawn from both sides, so none by default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

impl CullMode {
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Winding order that counts as front-facing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrontFace {
    #[default]
    Clockwise,
    CounterClockwise,
}

impl FrontFace {
    pub fn to_vk(self) -> vk::FrontFace {
        match self {
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        }
    }
}

/// Depth comparison operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    #[default]
    Less,
    Equal,
    LessOrEqual,
    Greater,
    Always,
}

impl CompareOp {
    pub fn to_vk(self) -> vk::CompareOp {
        match self {
            CompareOp::Never => vk::CompareOp::NEVER,
            CompareOp::Less => vk::CompareOp::LESS,
            CompareOp::Equal => vk::CompareOp::EQUAL,
            CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
            CompareOp::Greater => vk::CompareOp::GREATER,
            CompareOp::Always => vk::CompareOp::ALWAYS,
        }
    }
}

/// Color blend state for the single color attachment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorBlendAttachment {
    /// Enables `SRC_ALPHA` / `ONE_MINUS_SRC_ALPHA` blending.
    pub blend_enable: bool,
    /// Channels written to the attachment.
    pub color_write_mask: vk::ColorComponentFlags,
}

impl Default for ColorBlendAttachment {
    fn default() -> Self {
        Self {
            blend_enable: false,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        }
    }
}

impl ColorBlendAttachment {
    /// Standard alpha blending when enabled, pass-through otherwise.
    pub fn to_vk(&self) -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState {
            blend_enable: self.blend_enable.into(),
            src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
            dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: self.color_write_mask,
        }
    }
}

/// Fixed-function configuration for a graphics pipeline.
///
/// Start from [`PipelineConfig::default`] and override fields. Defaults:
///
/// - Triangle list, no primitive restart
/// - Fill, no culling, clockwise front face, line width 1, no depth bias
/// - 1 sample
/// - Depth test and write on, `Less`; no stencil
/// - Blending off, RGBA write mask
/// - [`Vertex2D`] input layout
/// - Subpass 0
///
/// `render_pass` and `layout` start null and must be supplied. `viewport`
/// and `scissor` are optional: when absent, that state is dynamic and must
/// be set on the command buffer before drawing.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Input assembly topology.
    pub topology: PrimitiveTopology,
    /// Primitive restart for strip topologies.
    pub primitive_restart: bool,
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    /// Only values of 1.0 are portable without the `wideLines` feature.
    pub line_width: f32,
    /// Rasterization sample count. Must match the render pass attachments.
    pub samples: vk::SampleCountFlags,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
    /// Blend state of the single color attachment.
    pub color_blend: ColorBlendAttachment,
    /// Vertex buffer bindings.
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    /// Vertex attributes read by the vertex shader.
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Static viewport; `None` makes it dynamic.
    pub viewport: Option<vk::Viewport>,
    /// Static scissor; `None` makes it dynamic.
    pub scissor: Option<vk::Rect2D>,
    /// Render pass the pipeline will be used with. Required.
    pub render_pass: vk::RenderPass,
    /// Pipeline layout. Required.
    pub layout: vk::PipelineLayout,
    /// Subpass index within `render_pass`.
    pub subpass: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            primitive_restart: false,
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::None,
            front_face: FrontFace::Clockwise,
            line_width: 1.0,
            samples: vk::SampleCountFlags::TYPE_1,
            depth_test: true,
            depth_write: true,
            depth_compare: CompareOp::Less,
            color_blend: ColorBlendAttachment::default(),
            vertex_bindings: vec![Vertex2D::binding_description()],
            vertex_attributes: Vertex2D::attribute_descriptions().to_vec(),
            viewport: None,
            scissor: None,
            render_pass: vk::RenderPass::null(),
            layout: vk::PipelineLayout::null(),
            subpass: 0,
        }
    }
}

impl PipelineConfig {
    /// Check the fields the caller is responsible for.
    pub fn validate(&self) -> RhiResult<()> {
        if self.render_pass == vk::RenderPass::null() {
            return Err(RhiError::PipelineError("render pass is required".to_string()));
        }
        if self.layout == vk::PipelineLayout::null() {
            return Err(RhiError::PipelineError(
                "pipeline layout is required".to_string(),
            ));
        }
        if self.line_width.is_nan() || self.line_width <= 0.0 {
            return Err(RhiError::PipelineError(format!(
                "line width must be positive, got {}",
                self.line_width
            )));
        }
        Ok(())
    }

    /// States left to the command buffer because no static value was given.
    pub fn dynamic_states(&self) -> Vec<vk::DynamicState> {
        let mut states = Vec::with_capacity(2);
        if self.viewport.is_none() {
            states.push(vk::DynamicState::VIEWPORT);
        }
        if self.scissor.is_none() {
            states.push(vk::DynamicState::SCISSOR);
        }
        states
    }
}

/// A compiled graphics pipeline bound to one render pass and layout.
///
/// # Resource Destruction
///
/// Destroy it (explicitly or by dropping) before the device goes away.
/// The pipeline keeps an `Arc<Device>`, so the device cannot be destroyed
/// first through the normal drop path.
///
/// # Thread Safety
///
/// The handle is immutable after creation. Binding it on different command
/// buffers from different threads is fine; destruction needs `&mut self`.
pub struct GraphicsPipeline {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan pipeline handle.
    pipeline: vk::Pipeline,
}

impl GraphicsPipeline {
    /// Load both shader stages from disk and create the pipeline.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `vertex_path` - SPIR-V binary for the vertex stage
    /// * `fragment_path` - SPIR-V binary for the fragment stage
    /// * `config` - Fixed-function state; see [`PipelineConfig`]
    ///
    /// # Errors
    ///
    /// Fails on an invalid config, a missing or malformed shader file (the
    /// error names the path), or any Vulkan creation failure.
    pub fn new(
        device: Arc<Device>,
        vertex_path: &Path,
        fragment_path: &Path,
        config: &PipelineConfig,
    ) -> RhiResult<Self> {
        config.validate()?;

        let vertex = Shader::from_spirv_file(device.clone(), vertex_path, ShaderStage::Vertex)?;
        let fragment =
            Shader::from_spirv_file(device.clone(), fragment_path, ShaderStage::Fragment)?;
        let stages = [vertex.stage_create_info(), fragment.stage_create_info()];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&config.vertex_bindings)
            .vertex_attribute_descriptions(&config.vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(config.topology.to_vk())
            .primitive_restart_enable(config.primitive_restart);

        let viewports: Vec<vk::Viewport> = config.viewport.into_iter().collect();
        let scissors: Vec<vk::Rect2D> = config.scissor.into_iter().collect();
        let mut viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        if !viewports.is_empty() {
            viewport_state = viewport_state.viewports(&viewports);
        }
        if !scissors.is_empty() {
            viewport_state = viewport_state.scissors(&scissors);
        }

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(config.polygon_mode.to_vk())
            .line_width(config.line_width)
            .cull_mode(config.cull_mode.to_vk())
            .front_face(config.front_face.to_vk())
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(config.samples)
            .min_sample_shading(1.0);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(config.depth_test)
            .depth_write_enable(config.depth_write)
            .depth_compare_op(config.depth_compare.to_vk())
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false);

        let color_blend_attachments = [config.color_blend.to_vk()];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let dynamic_states = config.dynamic_states();
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(config.layout)
            .render_pass(config.render_pass)
            .subpass(config.subpass);

        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(
                    vk::PipelineCache::null(),
                    std::slice::from_ref(&pipeline_info),
                    None,
                )
                .map_err(|(_, result)| {
                    RhiError::PipelineError(format!("graphics pipeline creation failed: {result}"))
                })?
        };
        let pipeline = pipelines.into_iter().next().ok_or_else(|| {
            RhiError::PipelineError("driver returned no pipeline".to_string())
        })?;

        info!(
            "Graphics pipeline created from {:?} and {:?}",
            vertex_path, fragment_path
        );
        // Shader modules are dropped here; the pipeline no longer needs them.
        Ok(Self { device, pipeline })
    }

    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Binds the pipeline on the graphics bind point of `cmd`.
    pub fn bind(&self, cmd: &CommandBuffer) {
        cmd.bind_graphics_pipeline(self.pipeline);
    }

    /// Idempotent.
    pub fn destroy(&mut self) {
        if self.pipeline != vk::Pipeline::null() {
            unsafe {
                self.device.handle().destroy_pipeline(self.pipeline, None);
            }
            self.pipeline = vk::Pipeline::null();
            debug!("Graphics pipeline destroyed");
        }
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;

    fn bound_config() -> PipelineConfig {
        PipelineConfig {
            render_pass: vk::RenderPass::from_raw(1),
            layout: vk::PipelineLayout::from_raw(2),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_enum_mappings() {
        assert_eq!(
            PrimitiveTopology::TriangleStrip.to_vk(),
            vk::PrimitiveTopology::TRIANGLE_STRIP
        );
        assert_eq!(PolygonMode::Line.to_vk(), vk::PolygonMode::LINE);
        assert_eq!(CullMode::Back.to_vk(), vk::CullModeFlags::BACK);
        assert_eq!(
            FrontFace::CounterClockwise.to_vk(),
            vk::FrontFace::COUNTER_CLOCKWISE
        );
        assert_eq!(CompareOp::LessOrEqual.to_vk(), vk::CompareOp::LESS_OR_EQUAL);
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.topology, PrimitiveTopology::TriangleList);
        assert_eq!(config.cull_mode, CullMode::None);
        assert_eq!(config.front_face, FrontFace::Clockwise);
        assert_eq!(config.depth_compare, CompareOp::Less);
        assert!(config.depth_test && config.depth_write);
        assert!(!config.color_blend.blend_enable);
        assert_eq!(config.color_blend.color_write_mask, vk::ColorComponentFlags::RGBA);
        assert_eq!(config.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(config.vertex_bindings.len(), 1);
        assert_eq!(config.vertex_attributes.len(), 2);
        assert_eq!(config.subpass, 0);
    }

    #[test]
    fn test_default_config_requires_pass_and_layout() {
        let config = PipelineConfig::default();
        assert!(matches!(config.validate(), Err(RhiError::PipelineError(_))));

        let only_pass = PipelineConfig {
            render_pass: vk::RenderPass::from_raw(1),
            ..PipelineConfig::default()
        };
        assert!(only_pass.validate().is_err());

        assert!(bound_config().validate().is_ok());
    }

    #[test]
    fn test_dynamic_states_follow_static_values() {
        let config = bound_config();
        assert_eq!(
            config.dynamic_states(),
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );

        let fixed = PipelineConfig {
            viewport: Some(vk::Viewport {
                width: 800.0,
                height: 600.0,
                max_depth: 1.0,
                ..Default::default()
            }),
            scissor: Some(vk::Rect2D {
                extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                ..Default::default()
            }),
            ..bound_config()
        };
        assert!(fixed.dynamic_states().is_empty());
    }

    #[test]
    fn test_blend_attachment_to_vk() {
        let state = ColorBlendAttachment::default().to_vk();
        assert_eq!(state.blend_enable, vk::FALSE);
        assert_eq!(state.color_write_mask, vk::ColorComponentFlags::RGBA);
    }
}
