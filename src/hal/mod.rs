//! Hardware abstraction layer: drivers, devices, device memory and tensors over it.
//!
//! - [`DriverRegistry`] holds the available [`Driver`]s and creates a [`Device`] from a URI such as
//!   `local-sync://0`.
//! - [`DeviceAllocator`] allocates [`Buffer`]s in device memory.
//! - [`BufferView`] is a tensor: a shape, an [`ElementType`](crate::ElementType) and an
//!   [`EncodingType`](crate::EncodingType) over a buffer.
//!
//! All handles are reference counted: cloning retains, dropping releases.

mod allocator;
pub use allocator::*;

mod buffer;
pub use buffer::*;

mod buffer_view;
pub use buffer_view::*;

mod device;
pub use device::*;

mod driver;
pub use driver::*;

mod format;

#[cfg(feature = "ndarray")]
mod array;
