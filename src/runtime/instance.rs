use std::sync::Arc;

use crate::allocator::{ObjectKind, Tracked};
use crate::hal::{Device, DriverRegistry};
use crate::{HostAllocator, Result};

/// Options used to create an [`Instance`].
///
/// ```rust
/// use tensorvm::runtime::{Instance, InstanceOptions};
///
/// let options = InstanceOptions::default().use_all_available_drivers();
/// let instance = Instance::create(&options).unwrap();
/// assert!(!instance.driver_registry().available_drivers().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InstanceOptions {
    driver_registry: DriverRegistry,
    host_allocator: Option<HostAllocator>,
}
impl InstanceOptions {
    /// Register every driver compiled into the crate.
    pub fn use_all_available_drivers(mut self) -> Self {
        self.driver_registry = DriverRegistry::with_all_available_drivers();
        self
    }

    /// Use a caller-populated driver registry instead of the built-in drivers.
    pub fn with_driver_registry(mut self, driver_registry: DriverRegistry) -> Self {
        self.driver_registry = driver_registry;
        self
    }

    /// Account all runtime objects of the instance in `host_allocator`.
    ///
    /// Defaults to [`HostAllocator::system`].
    pub fn with_host_allocator(mut self, host_allocator: HostAllocator) -> Self {
        self.host_allocator = Some(host_allocator);
        self
    }
}

/// The shared runtime context: the driver registry and the host allocator.
///
/// An instance is usually created once per process and shared by every session. Cloning retains the instance;
/// it is released when the last handle is dropped.
#[derive(Clone)]
pub struct Instance(Arc<InstanceInner>);
struct InstanceInner {
    driver_registry: DriverRegistry,
    tracked: Tracked,
}
impl Instance {
    /// Create an instance.
    ///
    /// # Arguments
    ///
    /// * `options` - The drivers to make available and the host allocator to use.
    ///
    /// # Returns
    ///
    /// The new instance, or an error if it could not be created.
    pub fn create(options: &InstanceOptions) -> Result<Self> {
        let host = options
            .host_allocator
            .clone()
            .unwrap_or_else(HostAllocator::system);
        let drivers = options.driver_registry.available_drivers();
        if drivers.is_empty() {
            log::warn!("instance created without any drivers; no device can be created");
        }
        log::debug!("created instance with drivers [{}]", drivers.join(", "));
        Ok(Self(Arc::new(InstanceInner {
            driver_registry: options.driver_registry.clone(),
            tracked: host.track(ObjectKind::Instance, 0),
        })))
    }

    /// The drivers devices can be created from.
    pub fn driver_registry(&self) -> &DriverRegistry {
        &self.0.driver_registry
    }

    /// The host allocator all objects of the instance are accounted in.
    pub fn host_allocator(&self) -> &HostAllocator {
        self.0.tracked.allocator()
    }

    /// Create a device from a URI using the instance's driver registry and host allocator.
    ///
    /// See [`DriverRegistry::create_device`].
    pub fn create_device(&self, device_uri: &str) -> Result<Device> {
        self.driver_registry()
            .create_device(device_uri, self.host_allocator())
    }

    /// Number of live handles to this instance.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Whether two handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Drop for InstanceInner {
    fn drop(&mut self) {
        log::debug!("released instance");
    }
}
impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("driver_registry", &self.0.driver_registry)
            .finish()
    }
}
