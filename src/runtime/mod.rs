//! High-level runtime API: instances, sessions and calls.
//!
//! The typical flow:
//! 1. Create an [`Instance`] with [`InstanceOptions::use_all_available_drivers`].
//! 2. Create a [`Device`](crate::hal::Device) from a URI with [`Instance::create_device`].
//! 3. Create a [`Session`] on the device and append bytecode modules to it.
//! 4. Invoke functions through a [`Call`]: push inputs, [`invoke`](Call::invoke), pop outputs.
//!
//! Release happens in reverse: calls, then the session, the device and finally the instance.

mod call;
pub use call::*;

mod instance;
pub use instance::*;

mod session;
pub use session::*;
