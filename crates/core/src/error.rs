//! Error types shared by the engine crates that sit above the GPU layer.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for configuration and engine bootstrap.
#[derive(Error, Debug)]
pub enum Error {
    /// Reading a file from disk failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A config file exists but could not be parsed
    #[error("Config error in {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A config value is out of its accepted range
    #[error("Config error: {0}")]
    Config(String),

    /// Window creation or window-system query failed
    #[error("Window error: {0}")]
    Window(String),
}

/// Result type alias using the engine's Error type.
pub type Result<T> = std::result::Result<T, Error>;
