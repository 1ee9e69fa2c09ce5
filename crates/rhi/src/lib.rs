//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin, safe-ish wrappers over `ash`:
//! - Instance, surface and device creation
//! - Swapchain selection and creation
//! - Render pass, framebuffers and graphics pipelines
//! - Command buffer recording and synchronization primitives
//! - Host-visible vertex buffers

mod error;

pub mod buffer;
pub mod command;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};
pub use surface::SurfaceProvider;

// Re-export ash types that users might need
pub use ash::vk;
