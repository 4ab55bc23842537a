//! Bytecode modules and the interpreter that runs them.
//!
//! A [`Module`] is a named table of [`Function`]s. Functions operate on whole tensors held in registers:
//! arguments occupy the first registers, every instruction writes a new register, and a single `return`
//! yields the results. Modules are serialized in a small little-endian bytecode format starting with
//! [`MAGIC`].
//!
//! Functions are invoked through a [`Call`](crate::runtime::Call) on a [`Session`](crate::runtime::Session).

mod bytecode;
pub use bytecode::{MAGIC, VERSION_MAJOR, VERSION_MINOR};

mod module;
pub use module::*;

pub(crate) mod interpreter;
