//! Frame loop, swapchain resources and drawing.
//!
//! # Overview
//!
//! - [`SwapchainManager`]: swapchain, depth buffers, render pass, framebuffers
//! - [`FrameEngine`]: begin/end frame with frames in flight and rebuild on resize
//! - [`Mesh`] and the shape builders
//! - [`SimpleRenderSystem`]: pushes per-entity transforms and draws meshes
//! - [`Renderer`]: owns the whole Vulkan stack for one window

pub mod depth_buffer;
pub mod frame_engine;
pub mod mesh;
pub mod renderer;
pub mod simple_render_system;
pub mod swapchain_manager;

pub use frame_engine::{AcquireStep, FrameCursor, FrameEngine, ImagesInFlight, ResizeRequest};
pub use jvsc_rhi::sync::MAX_FRAMES_IN_FLIGHT;
pub use mesh::{Mesh, circle_vertices, square_vertices};
pub use renderer::Renderer;
pub use simple_render_system::{SimplePushConstantData, SimpleRenderSystem};
pub use swapchain_manager::SwapchainManager;
