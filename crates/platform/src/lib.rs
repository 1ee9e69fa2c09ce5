//! Platform layer: the winit window behind the engine's surface boundary.

mod window;

pub use window::Window;

// Re-export winit types the application needs
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
