//! Shared foundations for the JVSC engine crates.
//!
//! - Error type and result alias
//! - Logging bootstrap
//! - Fixed-step frame clock
//! - TOML engine configuration

mod clock;
pub mod config;
mod error;
mod logging;

pub use clock::FrameClock;
pub use config::{EngineConfig, RendererConfig, SimulationConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::{init_logging, init_logging_with_filter};
