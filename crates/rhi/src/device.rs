//! Vulkan logical device and queue management.
//!
//! [`Device`] opens one queue per distinct queue family (graphics, present),
//! enables the swapchain extension and sampler anisotropy, and owns the
//! gpu-allocator instance every buffer and image allocation goes through.
//!
//! # Example
//!
//! ```no_run
//! # fn demo(provider: &dyn jvsc_rhi::surface::SurfaceProvider) -> jvsc_rhi::RhiResult<()> {
//! use jvsc_rhi::device::Device;
//! use jvsc_rhi::instance::Instance;
//! use jvsc_rhi::physical_device::select_physical_device;
//! use jvsc_rhi::surface::Surface;
//!
//! let instance = Instance::new(provider.required_instance_extensions()?, false)?;
//! let surface = Surface::new(&instance, provider)?;
//! let info = select_physical_device(instance.handle(), &surface)?;
//! let device = Device::new(&instance, &info)?;
//! let graphics_queue = device.graphics_queue();
//! # Ok(())
//! # }
//! ```

use std::ffi::c_char;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices, REQUIRED_DEVICE_EXTENSIONS};

/// Vulkan logical device wrapper.
///
/// Shared through `Arc`. Queue handles and family indices are fixed for the
/// lifetime of the device.
///
/// # Thread Safety
///
/// The device is `Send + Sync`. The allocator is behind a `Mutex`; queue
/// submission is not synchronized here, so only one thread submits.
///
/// # Resource Destruction
///
/// On drop the device waits for idle, drops the allocator (which frees its
/// memory blocks through the device), then destroys the device. Every
/// object created from it must be gone by then.
pub struct Device {
    /// Vulkan logical device handle and function table.
    device: ash::Device,
    /// Kept for format queries against the physical device.
    instance: ash::Instance,
    /// Physical device this device was opened on.
    physical_device: vk::PhysicalDevice,
    /// Properties captured at selection time.
    properties: vk::PhysicalDeviceProperties,
    /// Dropped by hand before the device is destroyed.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Queue 0 of the graphics family.
    graphics_queue: vk::Queue,
    /// Queue 0 of the present family; may equal `graphics_queue`.
    present_queue: vk::Queue,
    /// Families the queues were taken from.
    queue_families: QueueFamilyIndices,
}

impl Device {
    /// Creates the logical device and its allocator.
    ///
    /// # Errors
    ///
    /// Fails if the selected device lacks a graphics or present family, if
    /// device creation fails, or if the allocator cannot be initialized.
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let queue_families = physical_device_info.queue_families;
        let (Some(graphics_family), Some(present_family)) =
            (queue_families.graphics_family, queue_families.present_family)
        else {
            return Err(RhiError::NoSuitableGpu);
        };

        let unique_families = queue_families.unique_families();
        let queue_priorities = [1.0f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);
        let extension_names: Vec<*const c_char> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };
        info!(
            "Logical device created with {} extension(s)",
            extension_names.len()
        );

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        debug!(
            "Queues retrieved: graphics family {}, present family {}",
            graphics_family, present_family
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };
        debug!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            instance: instance.handle().clone(),
            physical_device: physical_device_info.device,
            properties: physical_device_info.properties,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            queue_families,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Properties of the physical device (name, limits, API version).
    #[inline]
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    /// Queue all command buffers are submitted to.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Queue used for presentation.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the queue family indices resolved at selection time.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Format capabilities of the physical device.
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    /// Lock the allocator.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::AllocatorPoisoned`] if another thread panicked
    /// while holding the lock.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator.lock().map_err(|_| RhiError::AllocatorPoisoned)
    }

    /// Blocks until all queues are idle.
    ///
    /// Used before tearing down or rebuilding anything the GPU may still
    /// be reading.
    ///
    /// # Errors
    ///
    /// Returns an error on device loss or out-of-memory.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }

            // The allocator frees its memory blocks through the device.
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// ash::Device is Send + Sync; the allocator sits behind a Mutex and the rest are plain handles.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_requires_swapchain_only() {
        assert_eq!(REQUIRED_DEVICE_EXTENSIONS, &[ash::khr::swapchain::NAME]);
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
