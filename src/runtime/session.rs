use std::path::Path;
use std::sync::Arc;

use super::Instance;
use crate::allocator::{ObjectKind, Tracked};
use crate::error::ResultExt;
use crate::hal::{Device, DeviceAllocator};
use crate::vm::{Function, Module};
use crate::{status, HostAllocator, Result};

/// Options used to create a [`Session`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub(crate) trace_execution: bool,
}
impl SessionOptions {
    /// Log the inputs and outputs of every invocation at `debug` level.
    pub fn trace_execution(mut self, enable: bool) -> Self {
        self.trace_execution = enable;
        self
    }
}

/// A set of loaded modules bound to one device.
///
/// Functions of the loaded modules are invoked through a [`Call`](super::Call). The session retains its
/// instance and device; dropping the session releases the modules and those references.
pub struct Session {
    modules: Vec<Arc<Module>>,
    device: Device,
    instance: Instance,
    options: SessionOptions,
    tracked: Tracked,
}
impl Session {
    /// Create a session using `device` for all allocations and execution.
    ///
    /// # Arguments
    ///
    /// * `instance` - The instance the device was created from.
    /// * `options` - Session options.
    /// * `device` - The device the session runs on.
    /// * `host_allocator` - The host allocator the session is accounted in.
    pub fn create_with_device(
        instance: &Instance,
        options: &SessionOptions,
        device: &Device,
        host_allocator: &HostAllocator,
    ) -> Result<Self> {
        if !device.host_allocator().ptr_eq(instance.host_allocator()) {
            log::warn!(
                "device {} was not created with the host allocator of the instance",
                device.id()
            );
        }
        log::debug!("created session on {}", device.id());
        Ok(Self {
            modules: Vec::new(),
            device: device.clone(),
            instance: instance.clone(),
            options: options.clone(),
            tracked: host_allocator.track(ObjectKind::Session, 0),
        })
    }

    /// The instance the session belongs to.
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// The device the session runs on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The allocator for memory of the session's device.
    pub fn device_allocator(&self) -> &DeviceAllocator {
        self.device.allocator()
    }

    /// The host allocator the session is accounted in.
    pub fn host_allocator(&self) -> &HostAllocator {
        self.tracked.allocator()
    }

    pub(crate) fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Loaded modules, in load order.
    pub fn modules(&self) -> &[Arc<Module>] {
        &self.modules
    }

    /// Append an already parsed module.
    ///
    /// # Errors
    ///
    /// `ALREADY_EXISTS` if a module with the same name is loaded.
    pub fn append_module(&mut self, module: Module) -> Result<()> {
        if self.modules.iter().any(|m| m.name() == module.name()) {
            return Err(status!(
                AlreadyExists,
                "a module named '{}' is already loaded",
                module.name()
            ));
        }
        log::debug!(
            "loaded module '{}' with {} function(s)",
            module.name(),
            module.functions().len()
        );
        self.modules.push(Arc::new(module));
        Ok(())
    }

    /// Load a bytecode module from a file and append it to the session.
    ///
    /// # Errors
    ///
    /// The errors of [`Module::from_file`] and [`append_module`](Self::append_module).
    pub fn append_bytecode_module_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let module = Module::from_file(path)?;
        self.append_module(module)
            .annotate_with(|| format!("appending '{}'", path.display()))
    }

    /// Parse a bytecode module from memory and append it to the session.
    ///
    /// # Errors
    ///
    /// The errors of [`Module::from_bytes`] and [`append_module`](Self::append_module).
    pub fn append_bytecode_module_from_memory(&mut self, bytes: &[u8]) -> Result<()> {
        let module = Module::from_bytes(bytes)?;
        self.append_module(module)
    }

    /// Resolve a fully qualified function name such as `module.simple_mul`.
    ///
    /// # Errors
    ///
    /// * `INVALID_ARGUMENT` - the name is not of the form `module.function`.
    /// * `NOT_FOUND` - no such module or function is loaded.
    pub fn lookup_function(&self, full_name: &str) -> Result<SessionFunction> {
        let (module_name, function_name) = full_name
            .split_once('.')
            .filter(|(m, f)| !m.is_empty() && !f.is_empty())
            .ok_or_else(|| {
                status!(
                    InvalidArgument,
                    "'{full_name}' is not a fully qualified function name (module.function)"
                )
            })?;
        let module = self
            .modules
            .iter()
            .find(|m| m.name() == module_name)
            .ok_or_else(|| status!(NotFound, "module '{module_name}' is not loaded"))?;
        let index = module
            .functions()
            .iter()
            .position(|f| f.name() == function_name)
            .ok_or_else(|| status!(NotFound, "function '{full_name}' not found"))?;
        Ok(SessionFunction {
            module: module.clone(),
            index,
        })
    }
}
impl Drop for Session {
    fn drop(&mut self) {
        log::debug!("released session on {}", self.device.id());
    }
}
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device)
            .field(
                "modules",
                &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A function resolved in a session. Keeps its module alive.
#[derive(Clone)]
pub struct SessionFunction {
    module: Arc<Module>,
    index: usize,
}
impl SessionFunction {
    /// The module defining the function.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// The function.
    pub fn function(&self) -> &Function {
        &self.module.functions()[self.index]
    }

    /// The fully qualified name, e.g. `module.simple_mul`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module.name(), self.function().name())
    }
}
impl std::fmt::Debug for SessionFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionFunction")
            .field(&self.qualified_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::InstanceOptions;
    use crate::tests::{simple_mul_module, ModuleFile};
    use crate::StatusCode;

    fn session(host: &HostAllocator) -> Session {
        let options = InstanceOptions::default()
            .use_all_available_drivers()
            .with_host_allocator(host.clone());
        let instance = Instance::create(&options).unwrap();
        let device = instance.create_device("local-sync").unwrap();
        Session::create_with_device(&instance, &SessionOptions::default(), &device, host).unwrap()
    }

    #[test]
    fn session_retains_instance_and_device() {
        let host = HostAllocator::system();
        let session = session(&host);
        assert_eq!(session.device().id(), "local-sync://0");
        assert_eq!(session.device_allocator().device_id(), "local-sync://0");
        assert!(session.host_allocator().ptr_eq(&host));
        assert_eq!(host.statistics().live(ObjectKind::Instance), 1);
        assert_eq!(host.statistics().live(ObjectKind::Device), 1);
        drop(session);
        assert_eq!(host.statistics().total_live(), 0);
    }

    #[test]
    fn load_from_file_and_lookup() {
        let file = ModuleFile::new(&simple_mul_module());
        let mut session = session(&HostAllocator::system());
        session.append_bytecode_module_from_file(file.path()).unwrap();
        assert_eq!(session.modules().len(), 1);

        let function = session.lookup_function("module.simple_mul").unwrap();
        assert_eq!(function.qualified_name(), "module.simple_mul");
        assert_eq!(function.function().arguments().len(), 2);
        assert_eq!(function.module().name(), "module");
    }

    #[test]
    fn lookup_errors() {
        let mut session = session(&HostAllocator::system());
        session
            .append_bytecode_module_from_memory(&simple_mul_module().to_bytes())
            .unwrap();

        for name in ["simple_mul", ".simple_mul", "module."] {
            let err = session.lookup_function(name).unwrap_err();
            assert_eq!(err.code(), StatusCode::InvalidArgument, "{name}");
        }
        let err = session.lookup_function("other.simple_mul").unwrap_err();
        assert_eq!(err.code(), StatusCode::NotFound);
        let err = session.lookup_function("module.simple_add").unwrap_err();
        assert_eq!(err.code(), StatusCode::NotFound);
        assert!(err.message().contains("module.simple_add"));
    }

    #[test]
    fn duplicate_module() {
        let mut session = session(&HostAllocator::system());
        let bytes = simple_mul_module().to_bytes();
        session.append_bytecode_module_from_memory(&bytes).unwrap();
        let err = session
            .append_bytecode_module_from_memory(&bytes)
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::AlreadyExists);
        assert_eq!(session.modules().len(), 1);
    }

    #[test]
    fn missing_file() {
        let mut session = session(&HostAllocator::system());
        let path = std::env::temp_dir().join("tensorvm-no-such-module.tvmb");
        let err = session
            .append_bytecode_module_from_file(&path)
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::NotFound);
        assert!(err.to_string().contains("tensorvm-no-such-module.tvmb"));
    }

    #[test]
    fn invalid_bytecode() {
        let mut session = session(&HostAllocator::system());
        let err = session
            .append_bytecode_module_from_memory(b"not bytecode")
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert!(session.modules().is_empty());
    }
}
