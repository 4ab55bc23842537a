use std::sync::Arc;

use super::{Device, DEFAULT_MAX_ALLOCATION_SIZE};
use crate::error::ResultExt;
use crate::{status, HostAllocator, Result};

/// Description of a device a driver can create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Path that selects the device within its driver, used after `://` in a device URI.
    pub path: String,
    /// Human readable name.
    pub name: String,
}

/// A device driver: a factory for devices of one backend.
pub trait Driver: Send + Sync {
    /// Name used to select the driver in a device URI, e.g. `local-sync`.
    fn name(&self) -> &str;

    /// Devices this driver can create.
    fn query_available_devices(&self) -> Vec<DeviceInfo>;

    /// Create the device selected by `path`. An empty path selects the default device.
    fn create_device_by_path(&self, path: &str, host: &HostAllocator) -> Result<Device>;
}

/// CPU driver executing on the calling thread, with memory shared with the host.
///
/// Registered as both `local-sync` and `local-task`; work always runs inline.
#[derive(Debug, Clone)]
pub struct LocalDriver {
    name: String,
    device_count: usize,
    max_allocation_size: usize,
}
impl LocalDriver {
    /// Create a driver with the given name exposing a single device.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_count: 1,
            max_allocation_size: DEFAULT_MAX_ALLOCATION_SIZE,
        }
    }

    /// Set the number of devices the driver exposes.
    pub fn with_device_count(mut self, device_count: usize) -> Self {
        self.device_count = device_count;
        self
    }

    /// Set the largest single allocation of the driver's devices.
    pub fn with_max_allocation_size(mut self, max_allocation_size: usize) -> Self {
        self.max_allocation_size = max_allocation_size;
        self
    }
}
impl Driver for LocalDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn query_available_devices(&self) -> Vec<DeviceInfo> {
        (0..self.device_count)
            .map(|ordinal| DeviceInfo {
                path: ordinal.to_string(),
                name: format!("{} CPU device {ordinal}", self.name),
            })
            .collect()
    }

    fn create_device_by_path(&self, path: &str, host: &HostAllocator) -> Result<Device> {
        let ordinal = if path.is_empty() {
            0
        } else {
            path.parse::<usize>().map_err(|_| {
                status!(
                    InvalidArgument,
                    "device path '{path}' of driver '{}' is not an ordinal",
                    self.name
                )
            })?
        };
        if ordinal >= self.device_count {
            return Err(status!(
                NotFound,
                "driver '{}' has {} device(s), ordinal {ordinal} is out of range",
                self.name,
                self.device_count
            ));
        }
        Ok(Device::new_local(
            &self.name,
            ordinal,
            self.max_allocation_size,
            host,
        ))
    }
}

/// Names of the drivers compiled into the crate.
pub const BUILTIN_DRIVERS: [&str; 2] = ["local-sync", "local-task"];

/// A set of drivers devices can be created from by URI.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: Vec<Arc<dyn Driver>>,
}
impl DriverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in driver registered.
    pub fn with_all_available_drivers() -> Self {
        let mut registry = Self::new();
        for name in BUILTIN_DRIVERS {
            registry.drivers.push(Arc::new(LocalDriver::new(name)));
        }
        registry
    }

    /// Register a driver.
    ///
    /// # Errors
    ///
    /// `ALREADY_EXISTS` if a driver with the same name is registered.
    pub fn register(&mut self, driver: Arc<dyn Driver>) -> Result<()> {
        if self.lookup(driver.name()).is_some() {
            return Err(status!(
                AlreadyExists,
                "driver '{}' is already registered",
                driver.name()
            ));
        }
        log::debug!("registered driver '{}'", driver.name());
        self.drivers.push(driver);
        Ok(())
    }

    /// Names of the registered drivers, in registration order.
    pub fn available_drivers(&self) -> Vec<String> {
        self.drivers.iter().map(|d| d.name().to_string()).collect()
    }

    /// Look up a driver by name.
    pub fn lookup(&self, name: &str) -> Option<&Arc<dyn Driver>> {
        self.drivers.iter().find(|d| d.name() == name)
    }

    /// Create a device from a URI of the form `driver`, `driver://` or `driver://path`.
    /// Anything after a `?` is ignored.
    ///
    /// # Errors
    ///
    /// * `INVALID_ARGUMENT` - the URI has no driver name.
    /// * `NOT_FOUND` - no driver with that name is registered, or the driver has no such device.
    pub fn create_device(&self, device_uri: &str, host: &HostAllocator) -> Result<Device> {
        let uri = DeviceUri::parse(device_uri)?;
        let driver = self.lookup(uri.driver).ok_or_else(|| {
            status!(
                NotFound,
                "no driver '{}' registered (available: {})",
                uri.driver,
                self.available_drivers().join(", ")
            )
        })?;
        let device = driver
            .create_device_by_path(uri.path, host)
            .annotate_with(|| format!("creating device '{device_uri}'"))?;
        log::debug!("created device {}", device.id());
        Ok(device)
    }
}
impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.available_drivers())
            .finish()
    }
}

/// A parsed device URI.
#[derive(Debug, PartialEq, Eq)]
struct DeviceUri<'a> {
    driver: &'a str,
    path: &'a str,
}
impl<'a> DeviceUri<'a> {
    fn parse(uri: &'a str) -> Result<Self> {
        let uri = uri.trim();
        let uri = uri.split_once('?').map(|(head, _)| head).unwrap_or(uri);
        let (driver, path) = uri.split_once("://").unwrap_or((uri, ""));
        if driver.is_empty() {
            return Err(status!(
                InvalidArgument,
                "device URI '{uri}' does not name a driver"
            ));
        }
        Ok(Self { driver, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::ObjectKind;
    use crate::StatusCode;

    #[test]
    fn parse_uri() {
        assert_eq!(
            DeviceUri::parse("local-sync").unwrap(),
            DeviceUri {
                driver: "local-sync",
                path: ""
            }
        );
        assert_eq!(
            DeviceUri::parse("local-task://0?threads=4").unwrap(),
            DeviceUri {
                driver: "local-task",
                path: "0"
            }
        );
        assert_eq!(DeviceUri::parse("local-sync://").unwrap().path, "");
        assert_eq!(
            DeviceUri::parse("://0").unwrap_err().code(),
            StatusCode::InvalidArgument
        );
        assert_eq!(
            DeviceUri::parse("").unwrap_err().code(),
            StatusCode::InvalidArgument
        );
    }

    #[test]
    fn create_builtin_devices() {
        let registry = DriverRegistry::with_all_available_drivers();
        assert_eq!(registry.available_drivers(), BUILTIN_DRIVERS);

        let host = HostAllocator::system();
        for uri in ["local-sync", "local-sync://", "local-sync://0", "local-task"] {
            let device = registry.create_device(uri, &host).unwrap();
            assert!(device.id().ends_with("://0"));
            assert!(device.host_allocator().ptr_eq(&host));
        }
        assert_eq!(host.statistics().live(ObjectKind::Device), 0);
        assert_eq!(host.statistics().acquired(ObjectKind::Device), 4);
    }

    #[test]
    fn unknown_driver_or_device() {
        let registry = DriverRegistry::with_all_available_drivers();
        let host = HostAllocator::system();

        let err = registry.create_device("vulkan", &host).unwrap_err();
        assert_eq!(err.code(), StatusCode::NotFound);
        assert!(err.message().contains("vulkan"));

        let err = registry.create_device("local-sync://1", &host).unwrap_err();
        assert_eq!(err.code(), StatusCode::NotFound);
        assert!(err.to_string().contains("creating device 'local-sync://1'"));

        let err = registry.create_device("local-sync://gpu", &host).unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);

        let err = DriverRegistry::new()
            .create_device("local-sync", &host)
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::NotFound);
        assert_eq!(host.statistics().acquired(ObjectKind::Device), 0);
    }

    #[test]
    fn register_custom_driver() {
        let mut registry = DriverRegistry::new();
        registry
            .register(Arc::new(LocalDriver::new("cpu").with_device_count(2)))
            .unwrap();
        let err = registry
            .register(Arc::new(LocalDriver::new("cpu")))
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::AlreadyExists);

        let driver = registry.lookup("cpu").unwrap();
        assert_eq!(driver.query_available_devices().len(), 2);

        let device = registry
            .create_device("cpu://1", &HostAllocator::system())
            .unwrap();
        assert_eq!(device.id(), "cpu://1");
        assert_eq!(device.driver_name(), "cpu");
    }

    #[test]
    fn driver_allocation_limit() {
        let driver = LocalDriver::new("small").with_max_allocation_size(4);
        let device = driver
            .create_device_by_path("", &HostAllocator::system())
            .unwrap();
        assert_eq!(device.allocator().max_allocation_size(), 4);
        assert_eq!(device.allocator().device_id(), "small://0");
    }
}
