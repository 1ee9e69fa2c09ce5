//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
///
/// Everything here is fatal for the operation that produced it. Recoverable
/// per-frame conditions (out-of-date or suboptimal swapchain, minimized
/// window) are handled by the frame engine and never surface as errors.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// The allocator mutex was poisoned by a panicking thread
    #[error("Allocator lock poisoned")]
    AllocatorPoisoned,

    /// No physical device met the requirements
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Shader loading or module creation error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Buffer creation or write error
    #[error("Buffer error: {0}")]
    BufferError(String),

    /// A mesh was built from too few vertices to form a triangle
    #[error("Invalid vertex count: {0} (at least 3 required)")]
    InvalidVertexCount(usize),

    /// `begin_frame` was called again before `end_frame`
    #[error("Frame already in progress for image {image_index}")]
    FrameInProgress { image_index: u32 },

    /// `end_frame` or `begin_render_pass` was called with no frame open
    #[error("No frame in progress")]
    NoFrameInProgress,
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
