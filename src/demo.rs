//! The `tensorvm-run` sequence as library functions.
//!
//! [`run`] creates an instance with every available driver, a device from a URI and a session on it, loads a
//! bytecode module from a file and calls `module.simple_mul` on two constant vectors through [`perform_mul`].
//! Whatever happens, the session, the device and the instance are released in that order before returning.

use std::io::Write;
use std::path::Path;

use crate::element;
use crate::error::ResultExt;
use crate::hal::{
    BufferParams, BufferUsage, BufferView, Device, DeviceAllocator, MemoryAccess, MemoryType,
    DEFAULT_MAX_ELEMENT_COUNT,
};
use crate::runtime::{Call, CallFlags, Instance, InstanceOptions, Session, SessionOptions};
use crate::{ElementType, EncodingType, HostAllocator, Result, Status};

/// The function invoked by [`perform_mul`].
pub const FUNCTION_NAME: &str = "module.simple_mul";

const SHAPE: [usize; 1] = [4];
const LHS: [f32; 4] = [1.0, 1.1, 1.2, 1.3];
const RHS: [f32; 4] = [10.0, 100.0, 1000.0, 10000.0];

/// Progress of [`run`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Nothing was created yet.
    Uninitialized,
    /// The instance exists.
    InstanceReady,
    /// The device exists.
    DeviceReady,
    /// The session exists.
    SessionReady,
    /// The module was appended to the session.
    ModuleLoaded,
    /// The function was invoked and its result printed.
    Invoked,
    /// Everything was released.
    Done,
}
impl Stage {
    /// The stage following this one, if any.
    pub fn next(self) -> Option<Stage> {
        Some(match self {
            Stage::Uninitialized => Stage::InstanceReady,
            Stage::InstanceReady => Stage::DeviceReady,
            Stage::DeviceReady => Stage::SessionReady,
            Stage::SessionReady => Stage::ModuleLoaded,
            Stage::ModuleLoaded => Stage::Invoked,
            Stage::Invoked => Stage::Done,
            Stage::Done => return None,
        })
    }

    /// What is done to reach this stage from the previous one.
    pub fn step(self) -> &'static str {
        match self {
            Stage::Uninitialized => "starting",
            Stage::InstanceReady => "creating instance",
            Stage::DeviceReady => "creating device",
            Stage::SessionReady => "creating session",
            Stage::ModuleLoaded => "loading module",
            Stage::Invoked => "invoking function",
            Stage::Done => "releasing resources",
        }
    }
}

/// Options of [`run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Elements printed per tensor before eliding the rest.
    pub max_element_count: usize,
    /// Host allocator all runtime objects are accounted in.
    pub host_allocator: HostAllocator,
}
impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_element_count: DEFAULT_MAX_ELEMENT_COUNT,
            host_allocator: HostAllocator::system(),
        }
    }
}

/// Handles acquired by [`run`], released in reverse order of acquisition.
#[derive(Default)]
struct Handles {
    session: Option<Session>,
    device: Option<Device>,
    instance: Option<Instance>,
}
impl Handles {
    fn release(&mut self) {
        drop(self.session.take());
        drop(self.device.take());
        drop(self.instance.take());
    }
}
impl Drop for Handles {
    fn drop(&mut self) {
        self.release();
    }
}

/// Run `module.simple_mul` from the module at `module_path` on the device selected by `device_uri`, writing
/// the operands and the result to `out`.
///
/// # Returns
///
/// The first failure of any step, annotated with the step that failed. All handles are released before
/// returning, also on failure.
pub fn run(
    device_uri: &str,
    module_path: impl AsRef<Path>,
    out: &mut impl Write,
    options: &RunOptions,
) -> Result<()> {
    let mut handles = Handles::default();
    let mut stage = Stage::Uninitialized;
    let result = run_stages(
        &mut handles,
        &mut stage,
        device_uri,
        module_path.as_ref(),
        out,
        options,
    );
    handles.release();
    match &result {
        Ok(()) => advance(&mut stage),
        Err(status) => log::debug!("run failed after stage {stage:?}: {status}"),
    }
    result
}

fn advance(stage: &mut Stage) {
    if let Some(next) = stage.next() {
        log::debug!("{:?} -> {next:?}", *stage);
        *stage = next;
    }
}

fn run_stages(
    handles: &mut Handles,
    stage: &mut Stage,
    device_uri: &str,
    module_path: &Path,
    out: &mut impl Write,
    options: &RunOptions,
) -> Result<()> {
    let instance_options = InstanceOptions::default()
        .use_all_available_drivers()
        .with_host_allocator(options.host_allocator.clone());
    let instance = handles
        .instance
        .insert(Instance::create(&instance_options).annotate(Stage::InstanceReady.step())?);
    advance(stage);

    let device = handles.device.insert(
        instance
            .driver_registry()
            .create_device(device_uri, instance.host_allocator())
            .annotate(Stage::DeviceReady.step())?,
    );
    advance(stage);

    let session = handles.session.insert(
        Session::create_with_device(
            instance,
            &SessionOptions::default(),
            device,
            instance.host_allocator(),
        )
        .annotate(Stage::SessionReady.step())?,
    );
    advance(stage);

    session
        .append_bytecode_module_from_file(module_path)
        .annotate(Stage::ModuleLoaded.step())?;
    advance(stage);

    perform_mul(session, out, options.max_element_count).annotate(Stage::Invoked.step())?;
    advance(stage);
    Ok(())
}

/// Call [`FUNCTION_NAME`] with two constant `4xf32` vectors and print `<lhs>\n * \n<rhs>\n = \n<result>` to
/// `out`.
///
/// The separators are printed even when an earlier step failed; the result only when the call succeeded.
pub fn perform_mul(
    session: &Session,
    out: &mut impl Write,
    max_element_count: usize,
) -> Result<()> {
    let mut call = Call::initialize_by_name(session, FUNCTION_NAME)?;
    let allocator = session.device_allocator();

    let mut status = push_input(&mut call, allocator, &LHS, out, max_element_count)
        .annotate("pushing lhs");
    status = status.and(write_separator(out, "\n * \n"));
    if status.is_ok() {
        status = push_input(&mut call, allocator, &RHS, out, max_element_count)
            .annotate("pushing rhs");
    }
    if status.is_ok() {
        status = call.invoke(CallFlags::NONE);
    }
    status = status.and(write_separator(out, "\n = \n"));
    status?;

    let result = call.outputs_pop_front_buffer_view()?;
    result.fprint(out, max_element_count)?;
    Ok(())
}

fn push_input(
    call: &mut Call,
    allocator: &DeviceAllocator,
    data: &[f32],
    out: &mut impl Write,
    max_element_count: usize,
) -> Result<()> {
    let params = BufferParams {
        memory_type: MemoryType::DEVICE_LOCAL,
        access: MemoryAccess::READ,
        usage: BufferUsage::DEFAULT,
    };
    let view = BufferView::allocate_buffer(
        allocator,
        &SHAPE,
        ElementType::Float32,
        EncodingType::DenseRowMajor,
        params,
        &element::to_bytes(data),
    )?;
    if let Err(status) = view.fprint(out, max_element_count) {
        status.ignore();
    }
    call.inputs_push_back_buffer_view(&view)
}

fn write_separator(out: &mut impl Write, separator: &str) -> Result<()> {
    out.write_all(separator.as_bytes()).map_err(Status::from)
}
