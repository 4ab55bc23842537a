#![cfg_attr(deny_warnings, deny(warnings))]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! A small tensor runtime: load bytecode modules and invoke their functions through a session API.
//!
//! The crate is organized in three layers:
//! - [`hal`]: drivers, devices, device allocators, buffers and buffer views (tensors).
//! - [`vm`]: bytecode modules, their functions and the interpreter that runs them.
//! - [`runtime`]: the high-level API tying them together: an [`Instance`](runtime::Instance) holding the
//!   drivers, a [`Session`](runtime::Session) binding loaded modules to a device, and a [`Call`](runtime::Call)
//!   invoking one function.
//!
//! Every fallible operation returns a [`Status`] carrying a canonical [`StatusCode`], a message and the
//! annotations added while the error propagated.
//!
//! Multiply two vectors with a module built in memory:
//! ```rust
//! use tensorvm::hal::{BufferParams, BufferView};
//! use tensorvm::runtime::{Call, CallFlags, Instance, InstanceOptions, Session, SessionOptions};
//! use tensorvm::vm::{BinaryOp, FunctionBuilder, Module, TensorType};
//! use tensorvm::ElementType;
//!
//! // A module named `module` exporting `simple_mul(tensor<4xf32>, tensor<4xf32>) -> tensor<4xf32>`.
//! let ty = TensorType::dense(ElementType::Float32, &[4]);
//! let mut builder = FunctionBuilder::new("simple_mul", vec![ty.clone(), ty.clone()]);
//! let product = builder.binary(BinaryOp::Mul, builder.arg(0), builder.arg(1));
//! let mut module = Module::new("module");
//! module.add_function(builder.returns(&[product], vec![ty]).unwrap()).unwrap();
//! let bytecode = module.to_bytes();
//!
//! let instance = Instance::create(&InstanceOptions::default().use_all_available_drivers()).unwrap();
//! let device = instance.create_device("local-sync").unwrap();
//! let mut session = Session::create_with_device(
//!     &instance,
//!     &SessionOptions::default(),
//!     &device,
//!     instance.host_allocator(),
//! )
//! .unwrap();
//! session.append_bytecode_module_from_memory(&bytecode).unwrap();
//!
//! let mut call = Call::initialize_by_name(&session, "module.simple_mul").unwrap();
//! for data in [[1.0_f32, 1.1, 1.2, 1.3], [10.0, 100.0, 1000.0, 10000.0]] {
//!     let view =
//!         BufferView::from_slice(session.device_allocator(), &[4], &data, BufferParams::default()).unwrap();
//!     call.inputs_push_back_buffer_view(&view).unwrap();
//! }
//! call.invoke(CallFlags::NONE).unwrap();
//! let result = call.outputs_pop_front_buffer_view().unwrap();
//! assert_eq!(result.to_string(), "4xf32=10 110 1200 13000");
//! ```
//!
//! The `tensorvm-run` binary runs the same multiplication with a module loaded from a file, see [`demo`].
//!
//! ## Cargo Features
//! - `ndarray`:
//!     Conversions between buffer views and `ndarray` arrays, see
//!     [`BufferView::from_array`](hal::BufferView::from_array).
//!     Adds a dependency to the `ndarray` crate.
//!     This feature is enabled by default.
//! - `half`:
//!     Use the [`half`](https://docs.rs/half/latest/half/) crate for the `f16` and `bf16` element types. Without
//!     this feature [`scalar::f16`] and [`scalar::bf16`] are plain bit containers.
//! - `num-complex`:
//!     Use the [`num-complex`](https://docs.rs/num-complex) crate for complex element types. Without this feature
//!     [`scalar::Complex`] is a plain struct with `re` and `im` fields.
//!
//! By default only the `ndarray` feature is enabled.

pub mod demo;
pub mod element;
pub mod error;
pub mod hal;
pub mod runtime;
pub mod scalar;
pub mod vm;

mod allocator;
pub use allocator::{AllocatorStatistics, HostAllocator, ObjectKind};

pub use element::{Element, ElementType, EncodingType};
pub(crate) use error::status;
pub use error::{Result, ResultExt, Status, StatusCode};

#[cfg(feature = "ndarray")]
pub use ndarray;

#[cfg(feature = "half")]
pub use half;

#[cfg(feature = "num-complex")]
pub use num_complex;

#[cfg(test)]
mod tests;
