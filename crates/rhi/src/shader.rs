//! SPIR-V loading and shader module creation.
//!
//! Shader modules only live as long as pipeline creation needs them; the
//! graphics pipeline drops both stages right after the pipeline exists.
//!
//! # Overview
//!
//! - [`decode_spirv`] checks length and magic number before anything
//!   reaches the driver
//! - [`Shader`] owns a VkShaderModule for one [`ShaderStage`] with entry
//!   point `main`
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use jvsc_rhi::device::Device;
//! use jvsc_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>) -> jvsc_rhi::RhiResult<()> {
//! let vertex = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/simple_shader.vert.spv"),
//!     ShaderStage::Vertex,
//! )?;
//! let stage_info = vertex.stage_create_info();
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// First word of every SPIR-V binary.
const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Entry point used by every stage.
const ENTRY_POINT: &CStr = c"main";

/// Pipeline stage a module is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Converts to the matching Vulkan stage flag.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Lower-case stage name for log messages.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decode a SPIR-V binary into words, checking size and magic number.
///
/// # Errors
///
/// [`RhiError::ShaderError`] for empty input, a length that is not a
/// multiple of 4, or a missing SPIR-V magic number.
pub fn decode_spirv(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(RhiError::ShaderError(format!(
            "SPIR-V code must be a non-empty multiple of 4 bytes, got {} bytes",
            bytes.len()
        )));
    }
    let words = ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| RhiError::ShaderError(format!("Invalid SPIR-V: {e}")))?;
    if words.first() != Some(&SPIRV_MAGIC) {
        return Err(RhiError::ShaderError(
            "SPIR-V magic number mismatch".to_string(),
        ));
    }
    Ok(words)
}

/// A shader module bound to one stage, entry point `main`.
///
/// The module is destroyed on drop. Pipelines keep working after their
/// shader modules are gone.
pub struct Shader {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan shader module handle.
    module: vk::ShaderModule,
    /// Stage this module is used for.
    stage: ShaderStage,
}

impl Shader {
    /// Load a compiled shader from disk.
    ///
    /// # Errors
    ///
    /// A missing or unreadable file yields [`RhiError::ShaderError`] naming
    /// the path.
    pub fn from_spirv_file(device: Arc<Device>, path: &Path, stage: ShaderStage) -> RhiResult<Self> {
        debug!("Loading {} shader from {:?}", stage, path);
        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!("Failed to read shader file {:?}: {}", path, e))
        })?;
        let code = decode_spirv(&bytes).map_err(|e| match e {
            RhiError::ShaderError(msg) => RhiError::ShaderError(format!("{:?}: {}", path, msg)),
            other => other,
        })?;
        Self::from_spirv_words(device, &code, stage)
    }

    /// Create a module from already decoded SPIR-V words.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the module.
    pub fn from_spirv_words(device: Arc<Device>, code: &[u32], stage: ShaderStage) -> RhiResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };
        Ok(Self {
            device,
            module,
            stage,
        })
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Stage description for pipeline creation; borrows the module.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(ENTRY_POINT)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_stage_mapping() {
        assert_eq!(ShaderStage::Vertex.to_vk_stage(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(format!("{}", ShaderStage::Fragment), "fragment");
    }

    #[test]
    fn test_decode_accepts_minimal_header() {
        let mut bytes = Vec::new();
        for word in [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        let words = decode_spirv(&bytes).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], SPIRV_MAGIC);
    }

    #[test]
    fn test_decode_rejects_misaligned() {
        let err = decode_spirv(&[0x03, 0x02, 0x23]).unwrap_err();
        assert!(matches!(err, RhiError::ShaderError(_)));
        assert!(decode_spirv(&[]).is_err());
    }

    #[test]
    fn test_decode_rejects_wrong_magic() {
        let bytes = 0xdead_beefu32.to_le_bytes();
        assert!(matches!(
            decode_spirv(&bytes),
            Err(RhiError::ShaderError(_))
        ));
    }
}
