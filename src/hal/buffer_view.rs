use std::sync::Arc;

use super::{format, Buffer, BufferParams, DeviceAllocator};
use crate::allocator::{ObjectKind, Tracked};
use crate::element::{self, Element, ElementType, EncodingType};
use crate::{status, HostAllocator, Result};

/// Element cap used by the [`Display`](std::fmt::Display) implementation of [`BufferView`].
pub const DEFAULT_MAX_ELEMENT_COUNT: usize = 1024;

/// A tensor: a shape, an element type and an encoding over a [`Buffer`].
///
/// The handle is reference counted. [`Clone`] retains a reference and [`Drop`] releases it, so a caller may
/// hand a clone to a longer-lived holder (e.g. a [`Call`](crate::runtime::Call)) and drop its own handle right
/// away.
#[derive(Clone)]
pub struct BufferView(Arc<BufferViewInner>);
struct BufferViewInner {
    buffer: Buffer,
    shape: Box<[usize]>,
    element_type: ElementType,
    encoding: EncodingType,
    _tracked: Tracked,
}
impl BufferView {
    /// Create a view over an existing buffer.
    ///
    /// # Errors
    ///
    /// `INVALID_ARGUMENT` if the buffer is smaller than the shape requires, or the element count overflows.
    pub fn create(
        buffer: Buffer,
        shape: &[usize],
        element_type: ElementType,
        encoding: EncodingType,
        host: &HostAllocator,
    ) -> Result<Self> {
        let byte_length = compute_byte_length(shape, element_type)?;
        if buffer.byte_length() < byte_length {
            return Err(status!(
                InvalidArgument,
                "buffer of {} bytes is too small for a {}x{element_type} view ({byte_length} bytes)",
                buffer.byte_length(),
                format::shape_string(shape)
            ));
        }
        let tracked = host.track(ObjectKind::BufferView, 0);
        Ok(Self(Arc::new(BufferViewInner {
            buffer,
            shape: shape.into(),
            element_type,
            encoding,
            _tracked: tracked,
        })))
    }

    /// Allocate a buffer from a device allocator, fill it with `initial_data` and wrap it in a view.
    ///
    /// # Arguments
    ///
    /// * `allocator` - The device allocator, usually [`Session::device_allocator`](crate::runtime::Session).
    /// * `shape` - Dimension sizes, outermost first.
    /// * `element_type` - Type of the elements.
    /// * `encoding` - Memory encoding of the elements.
    /// * `params` - Memory type, access and usage of the allocated buffer.
    /// * `initial_data` - Contents of the buffer; must be exactly the byte length of the view.
    pub fn allocate_buffer(
        allocator: &DeviceAllocator,
        shape: &[usize],
        element_type: ElementType,
        encoding: EncodingType,
        params: BufferParams,
        initial_data: &[u8],
    ) -> Result<Self> {
        let byte_length = compute_byte_length(shape, element_type)?;
        let buffer = allocator.allocate_buffer(params, byte_length, Some(initial_data))?;
        Self::create(
            buffer,
            shape,
            element_type,
            encoding,
            allocator.host_allocator(),
        )
    }

    /// Allocate a dense row-major view holding a copy of `data`.
    pub fn from_slice<T: Element>(
        allocator: &DeviceAllocator,
        shape: &[usize],
        data: &[T],
        params: BufferParams,
    ) -> Result<Self> {
        let bytes = element::to_bytes(data);
        Self::allocate_buffer(
            allocator,
            shape,
            T::TYPE,
            EncodingType::DenseRowMajor,
            params,
            &bytes,
        )
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.0.buffer
    }

    /// Dimension sizes, outermost first.
    pub fn shape(&self) -> &[usize] {
        &self.0.shape
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.0.shape.len()
    }

    /// Total number of elements.
    pub fn element_count(&self) -> usize {
        self.0.shape.iter().product()
    }

    /// Type of the elements.
    pub fn element_type(&self) -> ElementType {
        self.0.element_type
    }

    /// Encoding of the elements.
    pub fn encoding(&self) -> EncodingType {
        self.0.encoding
    }

    /// Size of the viewed contents in bytes.
    pub fn byte_length(&self) -> usize {
        self.element_count() * self.0.element_type.byte_size()
    }

    /// The viewed bytes of the buffer.
    pub fn contents(&self) -> Result<&[u8]> {
        Ok(&self.0.buffer.contents()?[..self.byte_length()])
    }

    /// Copy the elements out of the view.
    ///
    /// # Errors
    ///
    /// `INVALID_ARGUMENT` if `T` does not match the element type of the view.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::TYPE != self.0.element_type {
            return Err(status!(
                InvalidArgument,
                "view element type {} does not match requested {}",
                self.0.element_type,
                T::TYPE
            ));
        }
        element::from_bytes(self.contents()?)
    }

    /// Print the view to `writer`, e.g. `4xf32=1 1.1 1.2 1.3`, with at most `max_element_count` elements.
    pub fn fprint(&self, writer: &mut impl std::io::Write, max_element_count: usize) -> Result<()> {
        let text = format::format_buffer_view(self, max_element_count)?;
        writer.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Number of live handles to this view.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Whether two handles refer to the same view.
    pub fn ptr_eq(&self, other: &BufferView) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl std::fmt::Display for BufferView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match format::format_buffer_view(self, DEFAULT_MAX_ELEMENT_COUNT) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(
                f,
                "{}x{}=<unprintable>",
                format::shape_string(self.shape()),
                self.element_type()
            ),
        }
    }
}
impl std::fmt::Debug for BufferView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferView")
            .field("shape", &self.shape())
            .field("element_type", &self.element_type())
            .field("encoding", &self.encoding())
            .finish()
    }
}

pub(crate) fn compute_byte_length(shape: &[usize], element_type: ElementType) -> Result<usize> {
    shape
        .iter()
        .try_fold(element_type.byte_size(), |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| {
            status!(
                InvalidArgument,
                "shape {} overflows the addressable size",
                format::shape_string(shape)
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;

    fn allocator() -> DeviceAllocator {
        DeviceAllocator::new(
            "local-sync://0".into(),
            HostAllocator::system(),
            super::super::DEFAULT_MAX_ALLOCATION_SIZE,
        )
    }

    #[test]
    fn allocate_and_read_back() {
        let allocator = allocator();
        let view =
            BufferView::from_slice(&allocator, &[2, 2], &[1, 2, 3, 4_i32], BufferParams::default())
                .unwrap();
        assert_eq!(view.shape(), [2, 2]);
        assert_eq!(view.rank(), 2);
        assert_eq!(view.element_count(), 4);
        assert_eq!(view.byte_length(), 16);
        assert_eq!(view.element_type(), ElementType::Int32);
        assert_eq!(view.encoding(), EncodingType::DenseRowMajor);
        assert_eq!(view.to_vec::<i32>().unwrap(), [1, 2, 3, 4]);
        assert_eq!(
            view.to_vec::<f32>().unwrap_err().code(),
            StatusCode::InvalidArgument
        );
    }

    #[test]
    fn initial_data_must_match_shape() {
        let err = BufferView::from_slice(&allocator(), &[3], &[1.0_f32; 4], BufferParams::default())
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
    }

    #[test]
    fn view_over_small_buffer() {
        let allocator = allocator();
        let buffer = allocator.allocate_output(&[0; 4]).unwrap();
        let err = BufferView::create(
            buffer,
            &[2],
            ElementType::Float32,
            EncodingType::DenseRowMajor,
            allocator.host_allocator(),
        )
        .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
    }

    #[test]
    fn shape_overflow() {
        assert!(compute_byte_length(&[usize::MAX, 2], ElementType::Int8).is_err());
        assert_eq!(compute_byte_length(&[], ElementType::Float64).unwrap(), 8);
    }

    #[test]
    fn retain_and_release() {
        let allocator = allocator();
        let host = allocator.host_allocator().clone();
        let view =
            BufferView::from_slice(&allocator, &[1], &[1.0_f32], BufferParams::default()).unwrap();
        let held = view.clone();
        assert_eq!(view.ref_count(), 2);
        assert!(held.ptr_eq(&view));
        drop(view);
        assert_eq!(host.statistics().live(ObjectKind::BufferView), 1);
        drop(held);
        let stats = host.statistics();
        assert_eq!(stats.live(ObjectKind::BufferView), 0);
        assert_eq!(stats.live(ObjectKind::Buffer), 0);
    }

    #[test]
    fn print_to_writer() {
        let view = BufferView::from_slice(
            &allocator(),
            &[4],
            &[1.0_f32, 1.1, 1.2, 1.3],
            BufferParams::default(),
        )
        .unwrap();
        let mut out = Vec::new();
        view.fprint(&mut out, 1024).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "4xf32=1 1.1 1.2 1.3");
        assert_eq!(view.to_string(), "4xf32=1 1.1 1.2 1.3");
    }
}
