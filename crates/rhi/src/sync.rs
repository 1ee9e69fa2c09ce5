//! Synchronization primitives.
//!
//! - [`Semaphore`]: GPU-to-GPU ordering between acquire, submit and present
//! - [`Fence`]: GPU-to-CPU completion signal
//! - [`FrameSync`]: the set owned by one frame-in-flight slot
//!
//! # Overview
//!
//! Each frame slot goes through the same signal chain:
//!
//! ```text
//! acquire  --image_available-->  submit  --render_finished-->  present
//!                                   |
//!                                   +--in_flight--> CPU (next use of this slot)
//! ```
//!
//! The in-flight fence is created signaled so the first wait on a fresh
//! slot returns immediately.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use jvsc_rhi::device::Device;
//! use jvsc_rhi::sync::{FrameSync, MAX_FRAMES_IN_FLIGHT};
//!
//! # fn example(device: Arc<Device>) -> jvsc_rhi::RhiResult<()> {
//! let frames = (0..MAX_FRAMES_IN_FLIGHT)
//!     .map(|_| FrameSync::new(device.clone()))
//!     .collect::<jvsc_rhi::RhiResult<Vec<_>>>()?;
//!
//! // Before reusing slot 0, wait for its previous submission
//! frames[0].in_flight().wait(u64::MAX)?;
//! // ... acquire with frames[0].image_available(), record ...
//! frames[0].in_flight().reset()?;
//! // ... submit signaling frames[0].in_flight() ...
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::RhiResult;

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Vulkan semaphore wrapper, created unsignaled.
///
/// Binary semaphore: signaled by one queue operation, waited on by the
/// next. The host never waits on it directly.
pub struct Semaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new unsignaled binary semaphore.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
///
/// Lets the CPU find out when a queue submission has completed.
pub struct Fence {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan fence handle.
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled so the first wait passes.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Block until signaled or `timeout` nanoseconds pass.
    ///
    /// # Errors
    ///
    /// `VK_TIMEOUT` is reported as an error, as is device loss.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)?;
        }
        Ok(())
    }

    /// Return the fence to the unsignaled state.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }

    /// Non-blocking status check. Errors count as not signaled.
    pub fn is_signaled(&self) -> bool {
        unsafe { self.device.handle().get_fence_status(self.fence) }.unwrap_or(false)
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Signals owned by one frame-in-flight slot.
///
/// The fence starts signaled so the slot's first `begin_frame` does not block.
pub struct FrameSync {
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
}

impl FrameSync {
    /// Create both semaphores and the signaled in-flight fence.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the three objects cannot be created.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
        })
    }

    /// Signaled by acquire, waited on by submit.
    #[inline]
    pub fn image_available(&self) -> &Semaphore {
        &self.image_available
    }

    /// Signaled by submit, waited on by present.
    #[inline]
    pub fn render_finished(&self) -> &Semaphore {
        &self.render_finished
    }

    /// Signaled when this slot's submission completes.
    #[inline]
    pub fn in_flight(&self) -> &Fence {
        &self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_frames_in_flight() {
        assert_eq!(MAX_FRAMES_IN_FLIGHT, 2);
    }

    #[test]
    fn test_sync_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
        assert_send_sync::<FrameSync>();
    }
}
