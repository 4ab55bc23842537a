use std::sync::Arc;

use super::DeviceAllocator;
use crate::allocator::{ObjectKind, Tracked};
use crate::HostAllocator;

/// A handle to one compute device.
///
/// Created through a [`DriverRegistry`](super::DriverRegistry). Cheap to clone; the device is released when the
/// last handle is dropped.
#[derive(Clone)]
pub struct Device(Arc<DeviceInner>);
struct DeviceInner {
    id: String,
    driver_name: String,
    allocator: DeviceAllocator,
    tracked: Tracked,
}
impl Device {
    /// Create a device backed by host memory.
    ///
    /// Used by driver implementations.
    pub fn new_local(
        driver_name: &str,
        ordinal: usize,
        max_allocation_size: usize,
        host: &HostAllocator,
    ) -> Self {
        let id = format!("{driver_name}://{ordinal}");
        let allocator = DeviceAllocator::new(id.clone(), host.clone(), max_allocation_size);
        let tracked = host.track(ObjectKind::Device, 0);
        Self(Arc::new(DeviceInner {
            id,
            driver_name: driver_name.to_string(),
            allocator,
            tracked,
        }))
    }

    /// Unique id of the device, e.g. `local-sync://0`.
    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// Name of the driver that created the device.
    pub fn driver_name(&self) -> &str {
        &self.0.driver_name
    }

    /// The allocator for device memory.
    pub fn allocator(&self) -> &DeviceAllocator {
        &self.0.allocator
    }

    /// The host allocator the device was created with.
    pub fn host_allocator(&self) -> &HostAllocator {
        self.0.tracked.allocator()
    }

    /// Whether two handles refer to the same device.
    pub fn ptr_eq(&self, other: &Device) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("id", &self.0.id).finish()
    }
}
