//! Frame lifecycle and synchronization.
//!
//! This module provides [`FrameEngine`], which drives one frame at a time
//! through acquisition, recording, submission and presentation on top of a
//! [`SwapchainManager`].
//!
//! # Overview
//!
//! ```text
//! begin_frame        wait slot fence -> acquire image -> wait image marker -> begin cmd
//! begin_render_pass  framebuffer of the acquired image, clear color + depth
//! (caller draws)
//! end_render_pass
//! end_frame          end cmd -> mark image -> reset fence -> submit -> present -> next slot
//! ```
//!
//! - [`MAX_FRAMES_IN_FLIGHT`] slots, each owning an image-available
//!   semaphore, a render-finished semaphore and an in-flight fence
//! - [`FrameCursor`] rotates through the slots strictly round-robin
//! - [`ImagesInFlight`] remembers, per swapchain image, which slot's fence
//!   last rendered to it, because image count and slot count differ
//! - [`FramePhase`] rejects out-of-order calls instead of deadlocking
//!
//! An out-of-date or suboptimal swapchain is never an error here. The
//! engine waits for a non-zero drawable size, rebuilds the swapchain and
//! carries on; `begin_frame` reports that by returning `None`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use jvsc_rhi::device::Device;
//! use jvsc_renderer::frame_engine::{FrameEngine, PresentTarget};
//!
//! # fn example(device: Arc<Device>, target: &PresentTarget<'_>) -> jvsc_rhi::RhiResult<()> {
//! let mut engine = FrameEngine::new(device, target)?;
//!
//! loop {
//!     // None: the swapchain was rebuilt, try again next iteration
//!     let Some(cmd) = engine.begin_frame(target)? else {
//!         continue;
//!     };
//!
//!     engine.begin_render_pass(&cmd)?;
//!     // bind pipelines, draw meshes...
//!     engine.end_render_pass(&cmd)?;
//!
//!     engine.end_frame(&cmd, target)?;
//!     # break;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use jvsc_rhi::command::{CommandBuffer, CommandPool};
use jvsc_rhi::device::Device;
use jvsc_rhi::surface::{Surface, SurfaceProvider, wait_for_nonzero_extent};
use jvsc_rhi::sync::{FrameSync, MAX_FRAMES_IN_FLIGHT};
use jvsc_rhi::{RhiError, RhiResult};

use crate::swapchain_manager::{SwapchainManager, uniform_length};

/// Clear color for the swapchain render pass (dark gray, opaque).
pub const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

/// Round-robin frame slot index with period `frames_in_flight`.
///
/// The cursor only ever moves forward by one, so slots are never skipped
/// or reordered: after `frames_in_flight` advances it is back where it
/// started.
///
/// # Example
///
/// ```
/// use jvsc_renderer::FrameCursor;
///
/// let mut cursor = FrameCursor::new(2);
/// assert_eq!(cursor.slot(), 0);
/// cursor.advance();
/// assert_eq!(cursor.slot(), 1);
/// cursor.advance();
/// assert_eq!(cursor.slot(), 0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCursor {
    slot: usize,
    frames_in_flight: usize,
}

impl FrameCursor {
    /// Create a cursor at slot 0.
    ///
    /// A period of 0 is treated as 1.
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            slot: 0,
            frames_in_flight: frames_in_flight.max(1),
        }
    }

    /// Current slot, always below [`frames_in_flight`](Self::frames_in_flight).
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Number of slots the cursor cycles through.
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Move to the next slot, wrapping after the last one.
    pub fn advance(&mut self) {
        self.slot = (self.slot + 1) % self.frames_in_flight;
    }
}

/// Per swapchain image: the fence of the submission that last used it.
///
/// Entries are either null (image unused since the last rebuild) or a
/// slot's in-flight fence. Before recording into an image, the engine waits
/// on its entry, which may belong to a different slot than the current one.
#[derive(Debug, Default)]
pub struct ImagesInFlight {
    fences: Vec<vk::Fence>,
}

impl ImagesInFlight {
    /// One empty marker per swapchain image.
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![vk::Fence::null(); image_count],
        }
    }

    /// Number of markers, equal to the swapchain image count.
    #[inline]
    pub fn len(&self) -> usize {
        self.fences.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }

    /// Fence to wait on before reusing `image_index`, if any.
    pub fn pending(&self, image_index: u32) -> Option<vk::Fence> {
        self.fences
            .get(image_index as usize)
            .copied()
            .filter(|&fence| fence != vk::Fence::null())
    }

    /// Record that `fence` guards the submission now using `image_index`.
    ///
    /// Out-of-range indices are ignored.
    pub fn mark(&mut self, image_index: u32, fence: vk::Fence) {
        if let Some(slot) = self.fences.get_mut(image_index as usize) {
            *slot = fence;
        }
    }

    /// Forget all markers and resize to a new image count.
    pub fn reset(&mut self, image_count: usize) {
        self.fences.clear();
        self.fences.resize(image_count, vk::Fence::null());
    }
}

/// Where the engine is between `begin_frame` and `end_frame`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FramePhase {
    /// No frame open; `begin_frame` may be called.
    #[default]
    Idle,
    /// A command buffer for `image_index` is recording.
    Recording { image_index: u32 },
}

impl FramePhase {
    /// Fail if a frame is already open.
    ///
    /// # Errors
    ///
    /// [`RhiError::FrameInProgress`] carrying the open image index.
    pub fn ensure_idle(self) -> RhiResult<()> {
        match self {
            FramePhase::Idle => Ok(()),
            FramePhase::Recording { image_index } => Err(RhiError::FrameInProgress { image_index }),
        }
    }

    /// Image being recorded, or an error if no frame is open.
    ///
    /// # Errors
    ///
    /// [`RhiError::NoFrameInProgress`] when idle.
    pub fn recording_image(self) -> RhiResult<u32> {
        match self {
            FramePhase::Recording { image_index } => Ok(image_index),
            FramePhase::Idle => Err(RhiError::NoFrameInProgress),
        }
    }
}

/// Result of an image acquisition, after separating recoverable states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; `suboptimal` images are still rendered.
    Ready { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface.
    Rebuild,
}

/// Out-of-date means rebuild; suboptimal still renders this frame.
///
/// # Errors
///
/// Any other acquisition failure, as [`RhiError::VulkanError`].
pub fn classify_acquire(result: Result<(u32, bool), vk::Result>) -> RhiResult<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
            image_index,
            suboptimal,
        }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::Rebuild),
        Err(e) => Err(RhiError::VulkanError(e)),
    }
}

/// What `begin_frame` does once acquisition has returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireStep {
    /// Begin recording into this image.
    Record { image_index: u32 },
    /// Rebuild the swapchain for `extent`; nothing is recorded this call.
    ///
    /// `zero_polls` counts how often the surface reported no drawable area
    /// before `extent` became available.
    Rebuild { extent: vk::Extent2D, zero_polls: u32 },
}

/// Decide how to continue after an acquisition.
///
/// On an out-of-date swapchain this blocks until `provider` reports a
/// non-zero drawable size, so a minimized window never reaches a rebuild
/// with an empty extent. A successful acquisition does not query the
/// provider at all.
///
/// # Errors
///
/// Fatal acquisition failures, see [`classify_acquire`].
pub fn plan_acquire(
    result: Result<(u32, bool), vk::Result>,
    provider: &dyn SurfaceProvider,
) -> RhiResult<AcquireStep> {
    match classify_acquire(result)? {
        AcquireOutcome::Ready {
            image_index,
            suboptimal,
        } => {
            if suboptimal {
                debug!("Swapchain suboptimal on acquire");
            }
            Ok(AcquireStep::Record { image_index })
        }
        AcquireOutcome::Rebuild => {
            let (extent, zero_polls) = wait_for_nonzero_extent(provider);
            Ok(AcquireStep::Rebuild { extent, zero_polls })
        }
    }
}

/// Whether the swapchain must be rebuilt after presenting.
///
/// `resize_requested` forces a rebuild even when presentation succeeded.
///
/// # Errors
///
/// Any present failure other than out-of-date or suboptimal.
pub fn classify_present(result: Result<bool, vk::Result>, resize_requested: bool) -> RhiResult<bool> {
    match result {
        Ok(suboptimal) => Ok(suboptimal || resize_requested),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR) => Ok(true),
        Err(e) => Err(RhiError::VulkanError(e)),
    }
}

/// A resize reported by the window, waiting to be honored.
///
/// Set by [`FrameEngine::request_resize`], consumed by the next present,
/// and cleared by any rebuild, whichever path triggered it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResizeRequest {
    pending: bool,
}

impl ResizeRequest {
    pub fn request(&mut self) {
        self.pending = true;
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// The swapchain was rebuilt; the request is satisfied.
    pub fn clear(&mut self) {
        self.pending = false;
    }
}

/// Check that every per-image array has the swapchain's image count.
///
/// `swapchain_lengths` are the arrays owned by the [`SwapchainManager`]
/// (images, color views, depth buffers, framebuffers); the engine adds its
/// command buffers and in-use markers.
///
/// # Errors
///
/// [`RhiError::SwapchainError`] listing all six lengths when they differ
/// or are zero.
pub fn check_per_image_lengths(
    swapchain_lengths: [usize; 4],
    command_buffers: usize,
    markers: usize,
) -> RhiResult<usize> {
    let [images, views, depth, framebuffers] = swapchain_lengths;
    let lengths = [images, views, depth, framebuffers, command_buffers, markers];
    uniform_length(&lengths).ok_or_else(|| {
        RhiError::SwapchainError(format!(
            "per-image arrays out of step (images, views, depth, framebuffers, \
             command buffers, markers): {lengths:?}"
        ))
    })
}

/// Everything a swapchain rebuild needs from outside the engine.
pub struct PresentTarget<'a> {
    /// Instance the surface belongs to.
    pub instance: &'a ash::Instance,
    /// Surface the swapchain presents to.
    pub surface: &'a Surface,
    /// Source of the drawable size while rebuilding.
    pub provider: &'a dyn SurfaceProvider,
}

/// Frame loop state machine over a [`SwapchainManager`].
///
/// Owns one command buffer per swapchain image and one [`FrameSync`] per
/// frame slot.
///
/// # Thread Safety
///
/// Single-threaded: one caller drives begin/end from the render thread.
/// Parallelism exists only between this thread and the GPU.
///
/// # Resource Destruction
///
/// Dropping the engine waits for the device to go idle and frees the
/// command buffers; the swapchain manager, sync objects and pool then
/// release themselves.
pub struct FrameEngine {
    device: Arc<Device>,
    swapchain: SwapchainManager,
    command_pool: CommandPool,
    command_buffers: Vec<CommandBuffer>,
    frames: Vec<FrameSync>,
    images_in_flight: ImagesInFlight,
    cursor: FrameCursor,
    phase: FramePhase,
    resize: ResizeRequest,
}

impl FrameEngine {
    /// Build the swapchain for the provider's current size, plus command
    /// buffers, per-slot sync objects and in-use markers.
    ///
    /// # Arguments
    ///
    /// * `device` - Logical device with a graphics queue family
    /// * `target` - Instance, surface and size source to present to
    ///
    /// # Errors
    ///
    /// Any failing creation call. All are fatal startup errors.
    pub fn new(device: Arc<Device>, target: &PresentTarget<'_>) -> RhiResult<Self> {
        let graphics_family = device.queue_families().graphics_family.ok_or_else(|| {
            RhiError::SwapchainError("device has no graphics family".to_string())
        })?;

        let swapchain = SwapchainManager::build(
            target.instance,
            device.clone(),
            target.surface,
            target.provider.drawable_extent(),
        )?;

        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let command_buffers = command_pool.allocate(swapchain.image_count() as u32)?;

        let frames = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        let images_in_flight = ImagesInFlight::new(swapchain.image_count());

        let engine = Self {
            device,
            swapchain,
            command_pool,
            command_buffers,
            frames,
            images_in_flight,
            cursor: FrameCursor::new(MAX_FRAMES_IN_FLIGHT),
            phase: FramePhase::Idle,
            resize: ResizeRequest::default(),
        };
        let image_count = engine.check_per_image_alignment()?;

        info!(
            "Frame engine created: {} frames in flight, {} swapchain images",
            MAX_FRAMES_IN_FLIGHT, image_count
        );
        Ok(engine)
    }

    /// Start a frame and return its command buffer, already recording.
    ///
    /// Returns `Ok(None)` when the swapchain was out of date: it has been
    /// rebuilt, nothing was recorded, and the caller should skip this
    /// iteration and try again.
    ///
    /// # Errors
    ///
    /// [`RhiError::FrameInProgress`] if the previous frame was not ended;
    /// nothing is waited on in that case. Any other failure is fatal.
    pub fn begin_frame(&mut self, target: &PresentTarget<'_>) -> RhiResult<Option<CommandBuffer>> {
        self.phase.ensure_idle()?;

        let frame = &self.frames[self.cursor.slot()];
        frame.in_flight().wait(u64::MAX)?;

        let acquired = self
            .swapchain
            .swapchain()
            .acquire_next_image(frame.image_available().handle());

        let image_index = match plan_acquire(acquired, target.provider)? {
            AcquireStep::Record { image_index } => image_index,
            AcquireStep::Rebuild { extent, zero_polls } => {
                warn!("Swapchain out of date on acquire, rebuilding");
                self.rebuild_swapchain(target, extent, zero_polls)?;
                return Ok(None);
            }
        };

        if let Some(fence) = self.images_in_flight.pending(image_index) {
            unsafe {
                self.device
                    .handle()
                    .wait_for_fences(&[fence], true, u64::MAX)?;
            }
        }

        let cmd = self
            .command_buffers
            .get(image_index as usize)
            .cloned()
            .ok_or_else(|| {
                RhiError::SwapchainError(format!("no command buffer for image {image_index}"))
            })?;
        cmd.reset()?;
        cmd.begin()?;

        self.phase = FramePhase::Recording { image_index };
        Ok(Some(cmd))
    }

    /// Begin the swapchain render pass on the acquired image's framebuffer.
    ///
    /// The render area covers the whole framebuffer; color clears to
    /// [`CLEAR_COLOR`] and depth to 1.0.
    ///
    /// # Errors
    ///
    /// [`RhiError::NoFrameInProgress`] outside `begin_frame`/`end_frame`.
    pub fn begin_render_pass(&self, cmd: &CommandBuffer) -> RhiResult<()> {
        let image_index = self.phase.recording_image()?;
        let framebuffer = self.swapchain.framebuffer(image_index)?;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.swapchain.render_pass())
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent(),
            })
            .clear_values(&clear_values);

        cmd.begin_render_pass(&begin_info);
        Ok(())
    }

    /// End the render pass started by [`begin_render_pass`](Self::begin_render_pass).
    ///
    /// # Errors
    ///
    /// [`RhiError::NoFrameInProgress`] outside `begin_frame`/`end_frame`.
    pub fn end_render_pass(&self, cmd: &CommandBuffer) -> RhiResult<()> {
        self.phase.recording_image()?;
        cmd.end_render_pass();
        Ok(())
    }

    /// Close, submit and present the frame, then advance the slot.
    ///
    /// Rebuilds the swapchain after presenting when it reports out of date
    /// or suboptimal, or when a resize was requested. The slot advances
    /// either way.
    ///
    /// # Errors
    ///
    /// [`RhiError::NoFrameInProgress`] without a matching `begin_frame`.
    /// Failures to end the buffer, submit or present are fatal.
    pub fn end_frame(&mut self, cmd: &CommandBuffer, target: &PresentTarget<'_>) -> RhiResult<()> {
        let image_index = self.phase.recording_image()?;
        self.phase = FramePhase::Idle;

        cmd.end()?;

        let frame = &self.frames[self.cursor.slot()];
        self.images_in_flight
            .mark(image_index, frame.in_flight().handle());

        let wait_semaphores = [frame.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.render_finished().handle()];
        let command_buffers = [cmd.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // Reset as late as possible so an early return never leaves the
        // slot's fence unsignaled.
        frame.in_flight().reset()?;
        unsafe {
            self.device.handle().queue_submit(
                self.device.graphics_queue(),
                &[submit_info],
                frame.in_flight().handle(),
            )?;
        }

        let presented = self.swapchain.swapchain().present(
            self.device.present_queue(),
            image_index,
            frame.render_finished().handle(),
        );

        let outcome = match classify_present(presented, self.resize.is_pending()) {
            Ok(true) => {
                warn!("Swapchain needs rebuild after present");
                self.recreate(target)
            }
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        };

        self.cursor.advance();
        outcome
    }

    /// Ask for a rebuild at the end of the next frame.
    pub fn request_resize(&mut self) {
        self.resize.request();
    }

    fn recreate(&mut self, target: &PresentTarget<'_>) -> RhiResult<()> {
        let (extent, zero_polls) = wait_for_nonzero_extent(target.provider);
        self.rebuild_swapchain(target, extent, zero_polls)
    }

    fn rebuild_swapchain(
        &mut self,
        target: &PresentTarget<'_>,
        extent: vk::Extent2D,
        zero_polls: u32,
    ) -> RhiResult<()> {
        if zero_polls > 0 {
            info!("Surface usable again after {} polls", zero_polls);
        }

        self.device.wait_idle()?;
        self.swapchain
            .rebuild(target.instance, target.surface, extent)?;
        self.resize.clear();

        let image_count = self.swapchain.image_count();
        if image_count != self.command_buffers.len() {
            self.command_pool.free(&mut self.command_buffers);
            self.command_buffers = self.command_pool.allocate(image_count as u32)?;
        }
        self.images_in_flight.reset(image_count);
        self.check_per_image_alignment()?;

        info!(
            "Swapchain rebuilt: {}x{}, {} images",
            extent.width, extent.height, image_count
        );
        Ok(())
    }

    fn check_per_image_alignment(&self) -> RhiResult<usize> {
        check_per_image_lengths(
            self.swapchain.per_image_lengths(),
            self.command_buffers.len(),
            self.images_in_flight.len(),
        )
    }

    /// Render pass every pipeline drawing to the swapchain must match.
    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.swapchain.render_pass()
    }

    /// Current swapchain extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    /// Index of the frame slot the next `begin_frame` will use.
    #[inline]
    pub fn frame_slot(&self) -> usize {
        self.cursor.slot()
    }

    #[inline]
    pub fn phase(&self) -> FramePhase {
        self.phase
    }
}

impl Drop for FrameEngine {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            warn!("wait_idle failed while dropping frame engine: {}", e);
        }
        self.command_pool.free(&mut self.command_buffers);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use ash::vk::Handle;

    use super::*;

    #[test]
    fn test_cursor_is_periodic() {
        let mut cursor = FrameCursor::new(MAX_FRAMES_IN_FLIGHT);
        let start = cursor.slot();
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            cursor.advance();
        }
        assert_eq!(cursor.slot(), start);

        let mut cursor = FrameCursor::new(3);
        let slots: Vec<usize> = (0..7)
            .map(|_| {
                let slot = cursor.slot();
                cursor.advance();
                slot
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_cursor_never_zero_period() {
        let mut cursor = FrameCursor::new(0);
        cursor.advance();
        assert_eq!(cursor.slot(), 0);
        assert_eq!(cursor.frames_in_flight(), 1);
    }

    #[test]
    fn test_images_in_flight_starts_empty() {
        let markers = ImagesInFlight::new(3);
        assert_eq!(markers.len(), 3);
        assert!((0..3).all(|i| markers.pending(i).is_none()));
        assert!(markers.pending(7).is_none());
    }

    #[test]
    fn test_images_in_flight_tracks_other_slot_fence() {
        // Three images, two slots: image 0 is used by slot 0, then
        // reacquired while slot 1 is current.
        let slot_fences = [vk::Fence::from_raw(10), vk::Fence::from_raw(11)];
        let mut markers = ImagesInFlight::new(3);

        markers.mark(0, slot_fences[0]);
        markers.mark(1, slot_fences[1]);

        assert_eq!(markers.pending(0), Some(slot_fences[0]));
        assert_eq!(markers.pending(1), Some(slot_fences[1]));
        assert_eq!(markers.pending(2), None);

        markers.mark(0, slot_fences[1]);
        assert_eq!(markers.pending(0), Some(slot_fences[1]));
    }

    #[test]
    fn test_images_in_flight_reset_resizes() {
        let mut markers = ImagesInFlight::new(2);
        markers.mark(1, vk::Fence::from_raw(5));
        markers.reset(4);
        assert_eq!(markers.len(), 4);
        assert!((0..4).all(|i| markers.pending(i).is_none()));

        // Out-of-range marks are ignored.
        markers.mark(9, vk::Fence::from_raw(5));
        assert_eq!(markers.len(), 4);
    }

    #[test]
    fn test_second_begin_is_rejected() {
        let phase = FramePhase::Recording { image_index: 2 };
        assert!(matches!(
            phase.ensure_idle(),
            Err(RhiError::FrameInProgress { image_index: 2 })
        ));
        assert_eq!(phase.recording_image().ok(), Some(2));
    }

    #[test]
    fn test_end_without_begin_is_rejected() {
        let phase = FramePhase::Idle;
        assert!(phase.ensure_idle().is_ok());
        assert!(matches!(
            phase.recording_image(),
            Err(RhiError::NoFrameInProgress)
        ));
    }

    #[test]
    fn test_classify_acquire() {
        assert_eq!(
            classify_acquire(Ok((1, false))).ok(),
            Some(AcquireOutcome::Ready {
                image_index: 1,
                suboptimal: false
            })
        );
        assert_eq!(
            classify_acquire(Ok((0, true))).ok(),
            Some(AcquireOutcome::Ready {
                image_index: 0,
                suboptimal: true
            })
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).ok(),
            Some(AcquireOutcome::Rebuild)
        );
        assert!(matches!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
        ));
    }

    #[test]
    fn test_classify_present() {
        assert!(!classify_present(Ok(false), false).unwrap());
        assert!(classify_present(Ok(true), false).unwrap());
        assert!(classify_present(Ok(false), true).unwrap());
        assert!(classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR), false).unwrap());
        assert!(classify_present(Err(vk::Result::SUBOPTIMAL_KHR), false).unwrap());
        assert!(classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR), false).is_err());
    }

    /// Drawable size script for the minimize scenario.
    struct MinimizedWindow {
        extents: RefCell<Vec<(u32, u32)>>,
        polls: Cell<u32>,
        waits: Cell<u32>,
    }

    impl MinimizedWindow {
        fn new(extents: &[(u32, u32)]) -> Self {
            Self {
                extents: RefCell::new(extents.to_vec()),
                polls: Cell::new(0),
                waits: Cell::new(0),
            }
        }
    }

    impl SurfaceProvider for MinimizedWindow {
        fn required_instance_extensions(&self) -> RhiResult<&'static [*const std::ffi::c_char]> {
            Ok(&[])
        }

        fn create_surface(
            &self,
            _entry: &ash::Entry,
            _instance: &ash::Instance,
        ) -> RhiResult<vk::SurfaceKHR> {
            Err(RhiError::SurfaceError("headless".to_string()))
        }

        fn drawable_extent(&self) -> vk::Extent2D {
            self.polls.set(self.polls.get() + 1);
            let mut extents = self.extents.borrow_mut();
            let (width, height) = if extents.len() > 1 {
                extents.remove(0)
            } else {
                extents[0]
            };
            vk::Extent2D { width, height }
        }

        fn wait_events(&self) {
            self.waits.set(self.waits.get() + 1);
        }
    }

    #[test]
    fn test_out_of_date_while_minimized_waits_for_size() {
        let window = MinimizedWindow::new(&[(0, 0), (0, 0), (800, 600)]);

        let step = plan_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR), &window).unwrap();

        // No image to record into: the frame is skipped and the rebuild
        // only sees the first non-zero size.
        assert_eq!(
            step,
            AcquireStep::Rebuild {
                extent: vk::Extent2D {
                    width: 800,
                    height: 600
                },
                zero_polls: 2,
            }
        );
        assert_eq!(window.polls.get(), 3);
        assert_eq!(window.waits.get(), 2);
    }

    #[test]
    fn test_acquired_image_is_recorded_without_polling() {
        let window = MinimizedWindow::new(&[(0, 0)]);

        let step = plan_acquire(Ok((2, false)), &window).unwrap();
        assert_eq!(step, AcquireStep::Record { image_index: 2 });

        let step = plan_acquire(Ok((1, true)), &window).unwrap();
        assert_eq!(step, AcquireStep::Record { image_index: 1 });

        assert_eq!(window.polls.get(), 0);
        assert_eq!(window.waits.get(), 0);
    }

    #[test]
    fn test_fatal_acquire_does_not_wait() {
        let window = MinimizedWindow::new(&[(0, 0)]);
        let result = plan_acquire(Err(vk::Result::ERROR_DEVICE_LOST), &window);
        assert!(matches!(
            result,
            Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
        ));
        assert_eq!(window.polls.get(), 0);
    }

    #[test]
    fn test_per_image_lengths_all_six_agree() {
        assert_eq!(check_per_image_lengths([3, 3, 3, 3], 3, 3).ok(), Some(3));
        assert_eq!(check_per_image_lengths([2, 2, 2, 2], 2, 2).ok(), Some(2));
    }

    #[test]
    fn test_per_image_lengths_catch_engine_arrays() {
        // Swapchain side consistent, engine side stale after a rebuild.
        assert!(matches!(
            check_per_image_lengths([3, 3, 3, 3], 2, 3),
            Err(RhiError::SwapchainError(_))
        ));
        assert!(matches!(
            check_per_image_lengths([3, 3, 3, 3], 3, 2),
            Err(RhiError::SwapchainError(_))
        ));
        assert!(matches!(
            check_per_image_lengths([3, 3, 2, 3], 3, 3),
            Err(RhiError::SwapchainError(_))
        ));
        assert!(check_per_image_lengths([0, 0, 0, 0], 0, 0).is_err());
    }

    #[test]
    fn test_rebuild_satisfies_pending_resize() {
        let mut resize = ResizeRequest::default();
        assert!(!classify_present(Ok(false), resize.is_pending()).unwrap());

        resize.request();
        assert!(classify_present(Ok(false), resize.is_pending()).unwrap());

        // A rebuild driven by an out-of-date acquire also honors the
        // resize, so the following present must not rebuild again.
        resize.clear();
        assert!(!classify_present(Ok(false), resize.is_pending()).unwrap());
    }
}
