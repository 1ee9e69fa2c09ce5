//! Host-visible GPU buffers.
//!
//! Buffers here live in `CpuToGpu` memory so the CPU can fill them through
//! a persistent mapping. That covers vertex data, which is written once at
//! mesh creation and never touched again.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use jvsc_rhi::buffer::Buffer;
//! use jvsc_rhi::device::Device;
//! use jvsc_rhi::vertex::Vertex2D;
//!
//! # fn example(device: Arc<Device>, vertices: &[Vertex2D]) -> jvsc_rhi::RhiResult<()> {
//! let vertex_buffer = Buffer::vertex(device, vertices)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// GPU buffer with gpu-allocator managed memory.
///
/// Not thread-safe; synchronize externally when sharing between threads.
///
/// # Resource Destruction
///
/// [`destroy`](Self::destroy) frees the allocation, then the buffer. Drop
/// calls it too, so an explicit call is only needed to control ordering.
pub struct Buffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan buffer handle; null once destroyed.
    buffer: vk::Buffer,
    /// Backing memory; `None` once destroyed.
    allocation: Option<Allocation>,
    /// Size in bytes as requested.
    size: vk::DeviceSize,
    /// Label for logs and allocator reports.
    name: &'static str,
}

impl Buffer {
    /// Create an uninitialized buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero size or when buffer creation, allocation
    /// or binding fails. Nothing is leaked on failure.
    pub fn new(
        device: Arc<Device>,
        name: &'static str,
        usage: vk::BufferUsageFlags,
        size: vk::DeviceSize,
    ) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::BufferError(format!(
                "{name} buffer size must be greater than 0"
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location: MemoryLocation::CpuToGpu,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let mut created = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            name,
        };

        if let Some(allocation) = created.allocation.as_ref() {
            let bound = unsafe {
                created.device.handle().bind_buffer_memory(
                    created.buffer,
                    allocation.memory(),
                    allocation.offset(),
                )
            };
            if let Err(e) = bound {
                created.destroy();
                return Err(e.into());
            }
        }

        debug!("Created {} buffer: {} bytes", name, size);
        Ok(created)
    }

    /// Create a vertex buffer sized to `vertices` and fill it.
    ///
    /// # Errors
    ///
    /// An empty slice is rejected as a zero-sized buffer; otherwise as
    /// [`Buffer::new`].
    pub fn vertex<T: bytemuck::Pod>(device: Arc<Device>, vertices: &[T]) -> RhiResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let buffer = Self::new(
            device,
            "vertex",
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytes.len() as vk::DeviceSize,
        )?;
        buffer.write_data(0, bytes)?;
        Ok(buffer)
    }

    /// Copy `data` into the mapped memory at `offset`.
    ///
    /// # Errors
    ///
    /// Fails when the write would run past the end of the buffer, when the
    /// buffer has been destroyed, or when the memory is not host-mapped.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        check_write_range(offset, data.len(), self.size)?;

        let allocation = self
            .allocation
            .as_ref()
            .ok_or_else(|| RhiError::BufferError(format!("{} buffer destroyed", self.name)))?;

        let mapped_ptr = allocation.mapped_ptr().ok_or_else(|| {
            RhiError::BufferError(format!("{} buffer memory is not mapped", self.name))
        })?;

        unsafe {
            let dst = (mapped_ptr.as_ptr() as *mut u8).add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }

        Ok(())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Free the allocation and destroy the buffer. Idempotent.
    pub fn destroy(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} buffer allocation: {:?}", self.name, e);
                    }
                }
                Err(e) => error!("Leaking {} buffer allocation: {}", self.name, e),
            }
        }

        if self.buffer != vk::Buffer::null() {
            unsafe {
                self.device.handle().destroy_buffer(self.buffer, None);
            }
            self.buffer = vk::Buffer::null();
            debug!("Destroyed {} buffer", self.name);
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn check_write_range(offset: vk::DeviceSize, len: usize, size: vk::DeviceSize) -> RhiResult<()> {
    let end = offset.checked_add(len as vk::DeviceSize);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(RhiError::BufferError(format!(
            "write exceeds buffer size: offset {offset} + data {len} > buffer {size}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_range_within_bounds() {
        assert!(check_write_range(0, 60, 60).is_ok());
        assert!(check_write_range(20, 40, 60).is_ok());
    }

    #[test]
    fn test_write_range_overflow_rejected() {
        assert!(matches!(
            check_write_range(40, 40, 60),
            Err(RhiError::BufferError(_))
        ));
        assert!(check_write_range(u64::MAX, 1, 60).is_err());
    }
}
