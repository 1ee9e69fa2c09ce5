//! Engine configuration loaded from a TOML file.
//!
//! Every section and field has a default, so an empty or partial file is
//! valid. A missing file is not an error; a malformed one is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "jvsc.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub renderer: RendererConfig,
    pub simulation: SimulationConfig,
}

/// Window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 800,
            title: "JvscEngine physics example".to_string(),
        }
    }
}

/// GPU-side settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Request the Khronos validation layer and a debug messenger.
    pub validation: bool,
    /// Tracing filter directive used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
    /// Compiled vertex shader. Relative paths resolve against the shader directory.
    pub vertex_shader: PathBuf,
    /// Compiled fragment shader. Relative paths resolve against the shader directory.
    pub fragment_shader: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            log_filter: None,
            vertex_shader: PathBuf::from("simple_shader.vert.spv"),
            fragment_shader: PathBuf::from("simple_shader.frag.spv"),
        }
    }
}

impl RendererConfig {
    /// Resolve both shader paths against `shader_dir`, leaving absolute paths alone.
    pub fn shader_paths(&self, shader_dir: &Path) -> (PathBuf, PathBuf) {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                shader_dir.join(p)
            }
        };
        (resolve(&self.vertex_shader), resolve(&self.fragment_shader))
    }
}

/// Gravity demo settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub gravity_strength: f32,
    pub substeps: u32,
    pub fixed_dt: f32,
    /// Bodies are spawned on a `(2 * n) x (2 * n)` grid.
    pub grid_half_extent: i32,
    pub body_scale: f32,
    pub circle_sides: u32,
    pub max_initial_speed: f32,
    pub show_vector_field: bool,
    /// Field arrows per side when the vector field is shown.
    pub field_grid: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity_strength: 0.001,
            substeps: 5,
            fixed_dt: 1.0 / 60.0,
            grid_half_extent: 2,
            body_scale: 0.01,
            circle_sides: 64,
            max_initial_speed: 0.1,
            show_vector_field: false,
            field_grid: 20,
        }
    }
}

impl EngineConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] when `path` is `None`.
    ///
    /// A file that does not exist yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));

        if !path.exists() {
            tracing::info!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            Error::ConfigParse { source, .. } => Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        tracing::info!("Loaded configuration from {:?}", path);
        tracing::debug!("Config: {:?}", config);
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|source| Error::ConfigParse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        if self.simulation.circle_sides < 3 {
            return Err(Error::Config(format!(
                "circle_sides must be at least 3, got {}",
                self.simulation.circle_sides
            )));
        }
        if !self.simulation.fixed_dt.is_finite() || self.simulation.fixed_dt <= 0.0 {
            return Err(Error::Config(format!(
                "fixed_dt must be a positive, finite number of seconds, got {}",
                self.simulation.fixed_dt
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.window.width, 1000);
        assert_eq!(config.window.height, 800);
        assert_eq!(config.simulation.substeps, 5);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [window]
            title = "orbits"

            [simulation]
            gravity_strength = 0.5
            show_vector_field = true
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "orbits");
        assert_eq!(config.window.width, 1000);
        assert_eq!(config.simulation.gravity_strength, 0.5);
        assert!(config.simulation.show_vector_field);
        assert_eq!(config.simulation.circle_sides, 64);
    }

    #[test]
    fn test_malformed_document_is_error() {
        let err = EngineConfig::from_toml_str("[window\nwidth = ").unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = EngineConfig::from_toml_str("[window]\nwidth = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_degenerate_circle_rejected() {
        let err = EngineConfig::from_toml_str("[simulation]\ncircle_sides = 2").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_non_finite_fixed_dt_rejected() {
        for value in ["inf", "-inf", "nan", "0.0", "-0.5"] {
            let document = format!("[simulation]\nfixed_dt = {value}\n");
            let err = EngineConfig::from_toml_str(&document).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "fixed_dt = {value} accepted");
        }
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config =
            EngineConfig::load(Some(Path::new("/nonexistent/dir/jvsc.toml"))).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_shader_paths_resolve_relative_only() {
        let mut renderer = RendererConfig::default();
        let shader_dir = Path::new("/opt/shaders");
        let (vert, frag) = renderer.shader_paths(shader_dir);
        assert_eq!(vert, shader_dir.join("simple_shader.vert.spv"));
        assert_eq!(frag, shader_dir.join("simple_shader.frag.spv"));

        renderer.vertex_shader = PathBuf::from("/abs/custom.vert.spv");
        let (vert, _) = renderer.shader_paths(shader_dir);
        assert_eq!(vert, PathBuf::from("/abs/custom.vert.spv"));
    }
}
