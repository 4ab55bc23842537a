use std::sync::Arc;

use super::{Buffer, BufferParams, MemoryAccess, MemoryType};
use crate::{status, HostAllocator, Result};

/// Default upper bound of a single allocation of the local devices.
pub const DEFAULT_MAX_ALLOCATION_SIZE: usize = 1 << 30;

/// Allocates buffers in the memory of one device.
///
/// Cheap to clone; clones refer to the same device memory.
#[derive(Clone)]
pub struct DeviceAllocator(Arc<DeviceAllocatorInner>);
struct DeviceAllocatorInner {
    device_id: String,
    host: HostAllocator,
    max_allocation_size: usize,
}
impl DeviceAllocator {
    pub(crate) fn new(device_id: String, host: HostAllocator, max_allocation_size: usize) -> Self {
        Self(Arc::new(DeviceAllocatorInner {
            device_id,
            host,
            max_allocation_size,
        }))
    }

    /// The id of the device owning the memory.
    pub fn device_id(&self) -> &str {
        &self.0.device_id
    }

    /// The host allocator used for bookkeeping.
    pub fn host_allocator(&self) -> &HostAllocator {
        &self.0.host
    }

    /// The largest allocation the device accepts.
    pub fn max_allocation_size(&self) -> usize {
        self.0.max_allocation_size
    }

    /// Allocate a buffer of `allocation_size` bytes, optionally initialized with `initial_data`.
    ///
    /// # Errors
    ///
    /// * `INVALID_ARGUMENT` - the params have no memory type or access, or `initial_data` does not have exactly
    ///   `allocation_size` bytes.
    /// * `RESOURCE_EXHAUSTED` - the allocation is larger than the device supports.
    pub fn allocate_buffer(
        &self,
        params: BufferParams,
        allocation_size: usize,
        initial_data: Option<&[u8]>,
    ) -> Result<Buffer> {
        if params.memory_type.is_empty() {
            return Err(status!(InvalidArgument, "buffer memory type must be specified"));
        }
        if params.access.is_empty() {
            return Err(status!(InvalidArgument, "buffer access must be specified"));
        }
        if allocation_size > self.0.max_allocation_size {
            return Err(status!(
                ResourceExhausted,
                "allocation of {allocation_size} bytes exceeds the device limit of {} bytes",
                self.0.max_allocation_size
            ));
        }
        let data = match initial_data {
            Some(bytes) if bytes.len() != allocation_size => {
                return Err(status!(
                    InvalidArgument,
                    "initial data has {} bytes but the allocation is {allocation_size} bytes",
                    bytes.len()
                ));
            }
            Some(bytes) => bytes.to_vec().into_boxed_slice(),
            None => vec![0; allocation_size].into_boxed_slice(),
        };
        // Local devices share host memory, so every buffer is host visible regardless of the request.
        let params = BufferParams {
            memory_type: params.memory_type | MemoryType::HOST_VISIBLE,
            ..params
        };
        log::trace!(
            "{}: allocated {allocation_size} bytes (type {:#x}, access {:#x})",
            self.0.device_id,
            params.memory_type.bits(),
            params.access.bits()
        );
        Ok(Buffer::new(params, data, &self.0.host))
    }

    /// Allocate a buffer holding `contents` that dispatched work may write and the host may read.
    pub(crate) fn allocate_output(&self, contents: &[u8]) -> Result<Buffer> {
        let params = BufferParams {
            access: MemoryAccess::ALL,
            ..Default::default()
        };
        self.allocate_buffer(params, contents.len(), Some(contents))
    }
}
impl std::fmt::Debug for DeviceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceAllocator")
            .field("device_id", &self.0.device_id)
            .field("max_allocation_size", &self.0.max_allocation_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::ObjectKind;
    use crate::StatusCode;

    fn allocator(max: usize) -> DeviceAllocator {
        DeviceAllocator::new("local-sync://0".into(), HostAllocator::system(), max)
    }

    #[test]
    fn allocate_with_initial_data() {
        let allocator = allocator(64);
        let buffer = allocator
            .allocate_buffer(BufferParams::default(), 4, Some(&[1, 2, 3, 4]))
            .unwrap();
        assert_eq!(buffer.contents().unwrap(), &[1, 2, 3, 4]);
        assert!(buffer.params().memory_type.contains(MemoryType::HOST_VISIBLE));
        assert_eq!(
            allocator.host_allocator().statistics().live(ObjectKind::Buffer),
            1
        );
    }

    #[test]
    fn allocate_zeroed() {
        let buffer = allocator(64)
            .allocate_buffer(BufferParams::default(), 3, None)
            .unwrap();
        assert_eq!(buffer.contents().unwrap(), &[0, 0, 0]);
    }

    #[test]
    fn output_buffers_are_writable() {
        let buffer = allocator(64).allocate_output(&[7, 8]).unwrap();
        assert_eq!(buffer.contents().unwrap(), &[7, 8]);
        assert!(buffer.params().access.contains(MemoryAccess::WRITE));
    }

    #[test]
    fn invalid_requests() {
        let allocator = allocator(8);
        let err = allocator
            .allocate_buffer(BufferParams::default(), 4, Some(&[1, 2]))
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);

        let err = allocator
            .allocate_buffer(BufferParams::default(), 9, None)
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::ResourceExhausted);

        let params = BufferParams {
            memory_type: MemoryType::default(),
            ..Default::default()
        };
        let err = allocator.allocate_buffer(params, 1, None).unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
    }
}
