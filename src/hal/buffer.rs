use std::sync::Arc;

use crate::allocator::{ObjectKind, Tracked};
use crate::{status, HostAllocator, Result};

macro_rules! bit_set {
    ($(#[$outer:meta])* $name:ident { $($(#[$inner:meta])* $flag:ident = $value:expr,)* }) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);
        impl $name {
            $(
                $(#[$inner])*
                pub const $flag: $name = $name($value);
            )*

            /// The raw bits.
            pub fn bits(self) -> u32 {
                self.0
            }

            /// Whether all bits of `other` are set in `self`.
            pub fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            /// Whether no bits are set.
            pub fn is_empty(self) -> bool {
                self.0 == 0
            }
        }
        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
    };
}

bit_set!(
    /// Where the memory of a buffer lives and how it is visible.
    MemoryType {
        /// Memory is local to the device and fastest for it to access.
        DEVICE_LOCAL = 1 << 0,
        /// Memory is local to the host.
        HOST_LOCAL = 1 << 1,
        /// Memory can be mapped by the host.
        HOST_VISIBLE = 1 << 2,
        /// Host writes are visible to the device without explicit flushes.
        HOST_COHERENT = 1 << 3,
    }
);

bit_set!(
    /// Allowed access to the contents of a buffer.
    MemoryAccess {
        /// Contents may be read.
        READ = 1 << 0,
        /// Contents may be written.
        WRITE = 1 << 1,
        /// Contents may be discarded before a write.
        DISCARD = 1 << 2,
        /// Read, write and discard.
        ALL = 0b111,
    }
);

bit_set!(
    /// How a buffer is going to be used.
    BufferUsage {
        /// Transfer source or target.
        TRANSFER = 1 << 0,
        /// Read or written by dispatched work.
        DISPATCH_STORAGE = 1 << 1,
        /// Mappable by the host.
        MAPPING = 1 << 2,
        /// Suitable for anything a program argument may be used for.
        DEFAULT = 0b011,
    }
);

/// Parameters describing a buffer allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferParams {
    /// Memory type.
    pub memory_type: MemoryType,
    /// Allowed access.
    pub access: MemoryAccess,
    /// Intended usage.
    pub usage: BufferUsage,
}
impl Default for BufferParams {
    fn default() -> Self {
        Self {
            memory_type: MemoryType::DEVICE_LOCAL,
            access: MemoryAccess::ALL,
            usage: BufferUsage::DEFAULT,
        }
    }
}

/// A block of device memory.
///
/// The handle is reference counted: [`Clone`] retains and [`Drop`] releases.
#[derive(Clone)]
pub struct Buffer(Arc<BufferInner>);
struct BufferInner {
    params: BufferParams,
    data: Box<[u8]>,
    _tracked: Tracked,
}
impl Buffer {
    pub(crate) fn new(params: BufferParams, data: Box<[u8]>, host: &HostAllocator) -> Self {
        let tracked = host.track(ObjectKind::Buffer, data.len());
        Self(Arc::new(BufferInner {
            params,
            data,
            _tracked: tracked,
        }))
    }

    /// Size of the buffer in bytes.
    pub fn byte_length(&self) -> usize {
        self.0.data.len()
    }

    /// The parameters the buffer was allocated with.
    pub fn params(&self) -> BufferParams {
        self.0.params
    }

    /// Read-only access to the buffer contents.
    ///
    /// # Errors
    ///
    /// `PERMISSION_DENIED` if the buffer was not allocated with [`MemoryAccess::READ`].
    pub fn contents(&self) -> Result<&[u8]> {
        if !self.0.params.access.contains(MemoryAccess::READ) {
            return Err(status!(
                PermissionDenied,
                "buffer access {:#x} does not allow reads",
                self.0.params.access.bits()
            ));
        }
        Ok(&self.0.data)
    }

    /// Number of live handles to this buffer.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}
impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("byte_length", &self.byte_length())
            .field("params", &self.0.params)
            .finish()
    }
}
