use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};

use super::{BufferParams, BufferView, DeviceAllocator};
use crate::element::Element;
use crate::{status, Result};

impl BufferView {
    /// Allocate a dense row-major view holding a copy of an array.
    ///
    /// The elements are copied in logical order, so arrays with any memory layout are accepted.
    pub fn from_array<T, S, D>(
        allocator: &DeviceAllocator,
        array: &ArrayBase<S, D>,
        params: BufferParams,
    ) -> Result<Self>
    where
        T: Element,
        S: Data<Elem = T>,
        D: Dimension,
    {
        let data = array.iter().copied().collect::<Vec<_>>();
        Self::from_slice(allocator, array.shape(), &data, params)
    }

    /// Copy the elements of the view into an array with dynamic number of dimensions.
    ///
    /// # Errors
    ///
    /// `INVALID_ARGUMENT` if `T` does not match the element type of the view.
    pub fn to_array<T: Element>(&self) -> Result<ArrayD<T>> {
        let data = self.to_vec::<T>()?;
        ArrayD::from_shape_vec(IxDyn(self.shape()), data)
            .map_err(|err| status!(Internal, "buffer view shape mismatch: {err}"))
    }
}
