use std::collections::VecDeque;

use super::{Session, SessionFunction};
use crate::allocator::{ObjectKind, Tracked};
use crate::error::ResultExt;
use crate::hal::{BufferView, DeviceAllocator};
use crate::vm::{interpreter, Function};
use crate::{status, Result};

/// Flags controlling [`Call::invoke`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CallFlags(u32);
impl CallFlags {
    /// Default invocation.
    pub const NONE: CallFlags = CallFlags(0);

    /// The raw flag bits.
    pub fn bits(self) -> u32 {
        self.0
    }
}

/// A stateful invocation of one function: ordered inputs, the invocation itself, and ordered outputs.
///
/// Inputs are retained by the call, so the caller may drop its own handle right after pushing it. Dropping the
/// call releases all inputs and outputs still held.
///
/// ```rust
/// use tensorvm::hal::{BufferParams, BufferView};
/// use tensorvm::runtime::{Call, CallFlags, Instance, InstanceOptions, Session, SessionOptions};
/// use tensorvm::vm::{BinaryOp, FunctionBuilder, Module, TensorType};
/// use tensorvm::ElementType;
///
/// let ty = TensorType::dense(ElementType::Float32, &[2]);
/// let mut builder = FunctionBuilder::new("add", vec![ty.clone(), ty.clone()]);
/// let sum = builder.binary(BinaryOp::Add, builder.arg(0), builder.arg(1));
/// let mut module = Module::new("math");
/// module.add_function(builder.returns(&[sum], vec![ty]).unwrap()).unwrap();
///
/// let instance = Instance::create(&InstanceOptions::default().use_all_available_drivers()).unwrap();
/// let device = instance.create_device("local-sync").unwrap();
/// let mut session = Session::create_with_device(
///     &instance,
///     &SessionOptions::default(),
///     &device,
///     instance.host_allocator(),
/// )
/// .unwrap();
/// session.append_bytecode_module_from_memory(&module.to_bytes()).unwrap();
///
/// let mut call = Call::initialize_by_name(&session, "math.add").unwrap();
/// let x = BufferView::from_slice(session.device_allocator(), &[2], &[1.0_f32, 2.0], BufferParams::default())
///     .unwrap();
/// call.inputs_push_back_buffer_view(&x).unwrap();
/// call.inputs_push_back_buffer_view(&x).unwrap();
/// call.invoke(CallFlags::NONE).unwrap();
/// let sum = call.outputs_pop_front_buffer_view().unwrap();
/// assert_eq!(sum.to_string(), "2xf32=2 4");
/// ```
pub struct Call {
    function: SessionFunction,
    allocator: DeviceAllocator,
    trace_execution: bool,
    inputs: VecDeque<BufferView>,
    outputs: VecDeque<BufferView>,
    _tracked: Tracked,
}
impl Call {
    /// Initialize a call to `function` resolved in `session`.
    pub fn initialize(session: &Session, function: SessionFunction) -> Self {
        log::trace!("initialized call to {}", function.qualified_name());
        Self {
            allocator: session.device_allocator().clone(),
            trace_execution: session.options().trace_execution,
            inputs: VecDeque::with_capacity(function.function().arguments().len()),
            outputs: VecDeque::with_capacity(function.function().results().len()),
            function,
            _tracked: session.host_allocator().track(ObjectKind::Call, 0),
        }
    }

    /// Initialize a call to a function by its fully qualified name, e.g. `module.simple_mul`.
    ///
    /// # Errors
    ///
    /// The errors of [`Session::lookup_function`].
    pub fn initialize_by_name(session: &Session, full_name: &str) -> Result<Self> {
        let function = session
            .lookup_function(full_name)
            .annotate_with(|| format!("initializing call to '{full_name}'"))?;
        Ok(Self::initialize(session, function))
    }

    /// The function being called.
    pub fn function(&self) -> &Function {
        self.function.function()
    }

    /// Append an input. The call retains its own reference to the view.
    ///
    /// # Errors
    ///
    /// `OUT_OF_RANGE` if the call already holds as many inputs as the function takes.
    pub fn inputs_push_back_buffer_view(&mut self, buffer_view: &BufferView) -> Result<()> {
        let capacity = self.function().arguments().len();
        if self.inputs.len() >= capacity {
            return Err(status!(
                OutOfRange,
                "'{}' takes {capacity} input(s)",
                self.function.qualified_name()
            ));
        }
        self.inputs.push_back(buffer_view.clone());
        Ok(())
    }

    /// Number of inputs pushed so far.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of outputs not yet popped.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Synchronously invoke the function with the pushed inputs. The results are appended to the outputs.
    ///
    /// # Errors
    ///
    /// * `INVALID_ARGUMENT` - the inputs do not match the function signature.
    /// * Any error raised while executing the function.
    pub fn invoke(&mut self, flags: CallFlags) -> Result<()> {
        let name = self.function.qualified_name();
        let inputs = self.inputs.make_contiguous();
        if self.trace_execution {
            log::debug!("invoking {name} (flags {:#x})", flags.bits());
            for (i, input) in inputs.iter().enumerate() {
                log::debug!("  arg {i}: {input}");
            }
        }
        let results = interpreter::invoke(self.function.function(), inputs, &self.allocator)
            .annotate_with(|| format!("invoking '{name}'"))?;
        if self.trace_execution {
            for (i, result) in results.iter().enumerate() {
                log::debug!("  result {i}: {result}");
            }
        }
        self.outputs.extend(results);
        Ok(())
    }

    /// Remove and return the first output.
    ///
    /// # Errors
    ///
    /// `OUT_OF_RANGE` if there are no outputs left.
    pub fn outputs_pop_front_buffer_view(&mut self) -> Result<BufferView> {
        self.outputs
            .pop_front()
            .ok_or_else(|| status!(OutOfRange, "no outputs left to pop"))
    }

    /// Release all inputs and outputs so the call can be reused.
    pub fn reset(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }
}
impl Drop for Call {
    fn drop(&mut self) {
        log::trace!("deinitialized call to {}", self.function.qualified_name());
    }
}
impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("function", &self.function)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}
