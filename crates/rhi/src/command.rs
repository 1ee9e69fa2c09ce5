//! Command pool and command buffer recording.
//!
//! [`CommandBuffer`] is a cheap handle (device + raw buffer) handed out by the
//! frame engine for the duration of one frame. All recording goes through
//! its methods so draw-time code never touches `ash::Device` directly.
//!
//! # Overview
//!
//! - [`CommandPool`] owns a VkCommandPool for one queue family and hands out
//!   primary buffers in batches
//! - [`CommandBuffer`] records render passes, pipeline and vertex bindings,
//!   dynamic viewport/scissor, draws and push constants
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use jvsc_rhi::device::Device;
//! use jvsc_rhi::command::CommandPool;
//!
//! # fn example(device: Arc<Device>, pipeline: vk::Pipeline) -> jvsc_rhi::RhiResult<()> {
//! let family = device.queue_families().graphics_family.unwrap_or(0);
//! let pool = CommandPool::new(device.clone(), family)?;
//!
//! // One buffer per swapchain image
//! let mut buffers = pool.allocate(3)?;
//!
//! let cmd = &buffers[0];
//! cmd.begin()?;
//! cmd.bind_graphics_pipeline(pipeline);
//! cmd.draw(3, 1, 0, 0);
//! cmd.end()?;
//!
//! pool.free(&mut buffers);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan command pool wrapper.
///
/// Created with `TRANSIENT | RESET_COMMAND_BUFFER`: buffers are short-lived
/// per frame and individually reset before re-recording.
///
/// # Thread Safety
///
/// Not thread-safe. Allocation, freeing and recording into buffers from
/// this pool must happen on one thread at a time.
pub struct CommandPool {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan command pool handle.
    pool: vk::CommandPool,
    /// Queue family the allocated buffers are submitted to.
    queue_family_index: u32,
}

impl CommandPool {
    /// Creates a command pool for `queue_family_index`.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `queue_family_index` - Family of the queue the buffers will be submitted to
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(
                vk::CommandPoolCreateFlags::TRANSIENT
                    | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            );

        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };
        debug!(
            "Command pool created for queue family {}",
            queue_family_index
        );

        Ok(Self {
            device,
            pool,
            queue_family_index,
        })
    }

    /// Returns the Vulkan command pool handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Allocate `count` primary command buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver cannot allocate the buffers.
    pub fn allocate(&self, count: u32) -> RhiResult<Vec<CommandBuffer>> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe { self.device.handle().allocate_command_buffers(&allocate_info)? };
        Ok(buffers
            .into_iter()
            .map(|buffer| CommandBuffer {
                device: self.device.clone(),
                buffer,
            })
            .collect())
    }

    /// Return buffers to the pool and empty `buffers`.
    ///
    /// The buffers must not be pending execution; callers wait for the
    /// device to go idle first.
    pub fn free(&self, buffers: &mut Vec<CommandBuffer>) {
        if buffers.is_empty() {
            return;
        }
        let handles: Vec<vk::CommandBuffer> = buffers.drain(..).map(|b| b.buffer).collect();
        unsafe {
            self.device
                .handle()
                .free_command_buffers(self.pool, &handles);
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        debug!("Command pool destroyed");
    }
}

/// A primary command buffer allocated from a [`CommandPool`].
///
/// Cloning copies the handle; the pool owns the underlying buffer and
/// frees it through [`CommandPool::free`]. A clone must not be used after
/// that.
///
/// Recording methods other than `begin`/`end`/`reset` do not report errors;
/// Vulkan defines no failure for `vkCmd*` calls.
#[derive(Clone)]
pub struct CommandBuffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan command buffer handle.
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    /// Returns the Vulkan command buffer handle, as needed for submission.
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    // =========================================================================
    // Recording Control
    // =========================================================================

    /// Begin recording for a single submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer cannot enter the recording state.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)?;
        }
        Ok(())
    }

    /// Finish recording.
    ///
    /// # Errors
    ///
    /// Returns an error if recording failed; the buffer must not be submitted.
    pub fn end(&self) -> RhiResult<()> {
        unsafe {
            self.device.handle().end_command_buffer(self.buffer)?;
        }
        Ok(())
    }

    /// Discard previous contents so the buffer can be recorded again.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }

    // =========================================================================
    // Render Pass
    // =========================================================================

    /// Begin a render pass with inline subpass contents.
    pub fn begin_render_pass(&self, begin_info: &vk::RenderPassBeginInfo<'_>) {
        unsafe {
            self.device.handle().cmd_begin_render_pass(
                self.buffer,
                begin_info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    pub fn end_render_pass(&self) {
        unsafe {
            self.device.handle().cmd_end_render_pass(self.buffer);
        }
    }

    // =========================================================================
    // State and Draw
    // =========================================================================

    /// Bind a graphics pipeline for subsequent draws.
    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Bind vertex buffers starting at `first_binding`.
    ///
    /// # Arguments
    ///
    /// * `first_binding` - First vertex input binding to update
    /// * `buffers` - Buffers to bind, one per binding
    /// * `offsets` - Byte offset into each buffer, same length as `buffers`
    pub fn bind_vertex_buffers(
        &self,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        unsafe {
            self.device.handle().cmd_bind_vertex_buffers(
                self.buffer,
                first_binding,
                buffers,
                offsets,
            );
        }
    }

    /// Set dynamic viewport 0.
    pub fn set_viewport(&self, viewport: &vk::Viewport) {
        unsafe {
            self.device
                .handle()
                .cmd_set_viewport(self.buffer, 0, std::slice::from_ref(viewport));
        }
    }

    pub fn set_scissor(&self, scissor: &vk::Rect2D) {
        unsafe {
            self.device
                .handle()
                .cmd_set_scissor(self.buffer, 0, std::slice::from_ref(scissor));
        }
    }

    /// Issues a non-indexed draw command.
    ///
    /// # Arguments
    ///
    /// * `vertex_count` - Number of vertices to draw
    /// * `instance_count` - Number of instances to draw
    /// * `first_vertex` - Index of the first vertex
    /// * `first_instance` - Index of the first instance
    pub fn draw(
        &self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.handle().cmd_draw(
                self.buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }

    /// Push a plain-data value into the pipeline layout's push constant range.
    ///
    /// `T` must match the shader's push block layout byte for byte, and
    /// `offset + size_of::<T>()` must lie inside a range of `layout` that
    /// covers `stages`.
    pub fn push_constants<T: bytemuck::Pod>(
        &self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &T,
    ) {
        unsafe {
            self.device.handle().cmd_push_constants(
                self.buffer,
                layout,
                stages,
                offset,
                bytemuck::bytes_of(data),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandBuffer>();
        assert_send::<CommandPool>();
    }
}
