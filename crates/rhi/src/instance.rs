//! Vulkan instance management.
//!
//! This module handles VkInstance creation, the optional validation layer,
//! and the debug messenger.
//!
//! # Overview
//!
//! - Vulkan 1.0 API version, application and engine name `JvscEngine`
//! - Surface extensions come from the caller (usually the surface provider)
//! - `VK_LAYER_KHRONOS_validation` is enabled only when requested *and*
//!   installed; a missing layer logs a warning and is otherwise ignored
//! - Validation messages of warning severity and above go to `tracing`
//!
//! # Example
//!
//! ```no_run
//! use jvsc_rhi::instance::Instance;
//!
//! // Headless instance (no surface extensions) with validation in debug builds
//! let instance = Instance::new(&[], cfg!(debug_assertions)).expect("Failed to create Vulkan instance");
//! let vk_instance = instance.handle();
//! ```

use std::ffi::{CStr, c_char};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::RhiResult;

/// The Khronos validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Routes validation-layer output into `tracing`.
///
/// Present only when validation was requested and the layer exists. Its
/// absence is an ordinary configuration, not an error.
pub struct DebugMessenger {
    /// `VK_EXT_debug_utils` function table.
    loader: ash::ext::debug_utils::Instance,
    /// Messenger handle.
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    fn new(entry: &Entry, instance: &ash::Instance) -> RhiResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        Ok(Self { loader, messenger })
    }

    /// Must run before the owning instance is destroyed.
    fn destroy(&mut self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None);
        }
        self.messenger = vk::DebugUtilsMessengerEXT::null();
    }
}

/// Vulkan instance wrapper with optional validation support.
///
/// # Resource Destruction
///
/// Dropping the instance destroys the debug messenger and then the
/// VkInstance. Every surface and device created from it must already be gone.
///
/// # Thread Safety
///
/// The instance is immutable after creation and can be shared by reference.
pub struct Instance {
    /// Vulkan entry point loader. Must outlive `instance`.
    entry: Entry,
    /// Vulkan instance handle.
    instance: ash::Instance,
    /// Present only when validation is active.
    debug_messenger: Option<DebugMessenger>,
}

impl Instance {
    /// Creates a new Vulkan instance.
    ///
    /// # Arguments
    ///
    /// * `surface_extensions` - Window-system extensions the surface provider
    ///   needs; pass an empty slice for a headless instance
    /// * `enable_validation` - Request the Khronos validation layer
    ///
    /// # Errors
    ///
    /// Returns an error if the Vulkan library cannot be loaded, if instance
    /// creation fails, or if the debug messenger cannot be created.
    pub fn new(surface_extensions: &[*const c_char], enable_validation: bool) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let validation_available =
            enable_validation && Self::is_validation_layer_available(&entry)?;
        if enable_validation && !validation_available {
            warn!("Validation layer requested but not available, proceeding without it");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"JvscEngine")
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"JvscEngine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions = surface_extensions.to_vec();
        if validation_available {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layers = if validation_available {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!(
            "Vulkan instance created ({} extensions)",
            extensions.len()
        );

        let debug_messenger = if validation_available {
            match DebugMessenger::new(&entry, &instance) {
                Ok(messenger) => {
                    info!("Validation layer enabled with debug messenger");
                    Some(messenger)
                }
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug_messenger,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns whether the debug messenger is active.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }

    fn is_validation_layer_available(entry: &Entry) -> RhiResult<bool> {
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
        Ok(available_layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name == VALIDATION_LAYER_NAME
        }))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let Some(messenger) = self.debug_messenger.as_mut() {
            messenger.destroy();
        }
        unsafe {
            self.instance.destroy_instance(None);
        }
        debug!("Vulkan instance destroyed");
    }
}

/// Logs validation-layer messages through tracing.
///
/// # Safety
///
/// Called by the Vulkan loader with a valid (or null) callback data pointer.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let kind = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "performance",
        _ => "general",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!(kind, "{message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!(kind, "{message}"),
        _ => debug!(kind, "{message}"),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RhiError;

    #[test]
    fn test_headless_instance_without_validation() {
        let Ok(instance) = Instance::new(&[], false) else {
            eprintln!("Skipping test: Vulkan not available");
            return;
        };
        assert!(!instance.has_validation());
    }

    #[test]
    fn test_validation_is_optional() {
        // Requesting validation must never fail just because the layer is missing.
        match Instance::new(&[], true) {
            Ok(instance) => {
                if instance.has_validation() {
                    assert!(instance.debug_messenger.is_some());
                }
            }
            Err(RhiError::LoadingError(_)) | Err(RhiError::VulkanError(_)) => {
                eprintln!("Skipping test: Vulkan not available");
            }
            Err(e) => panic!("Unexpected error: {e:?}"),
        }
    }
}
