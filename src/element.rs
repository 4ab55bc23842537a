//! Element types and encodings of buffer views.

use crate::scalar::{bf16, f16, Complex};
use crate::{status, Result};

/// Data types that can be used as elements of a buffer view.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum ElementType {
    /// Boolean stored in one byte, `bool`
    Bool = 0,
    /// 8-bit signed integer, `i8`
    Int8 = 1,
    /// 16-bit signed integer, `i16`
    Int16 = 2,
    /// 32-bit signed integer, `i32`
    Int32 = 3,
    /// 64-bit signed integer, `i64`
    Int64 = 4,
    /// 8-bit unsigned integer, `u8`
    UInt8 = 5,
    /// 16-bit unsigned integer, `u16`
    UInt16 = 6,
    /// 32-bit unsigned integer, `u32`
    UInt32 = 7,
    /// 64-bit unsigned integer, `u64`
    UInt64 = 8,
    /// 16-bit floating point, [`tensorvm::scalar::f16`](`crate::scalar::f16`).
    Float16 = 9,
    /// 16-bit floating point using the bfloat16 format, [`tensorvm::scalar::bf16`](`crate::scalar::bf16`).
    BFloat16 = 10,
    /// 32-bit floating point, `f32`
    Float32 = 11,
    /// 64-bit floating point, `f64`
    Float64 = 12,
    /// 64-bit complex floating point, [`tensorvm::scalar::Complex<f32>`](`crate::scalar::Complex`).
    Complex64 = 13,
    /// 128-bit complex floating point, [`tensorvm::scalar::Complex<f64>`](`crate::scalar::Complex`).
    Complex128 = 14,
}
impl ElementType {
    /// Size in bytes of a single element.
    pub fn byte_size(self) -> usize {
        match self {
            ElementType::Bool | ElementType::Int8 | ElementType::UInt8 => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Float16 | ElementType::BFloat16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::UInt64 | ElementType::Float64 => 8,
            ElementType::Complex64 => 8,
            ElementType::Complex128 => 16,
        }
    }

    /// Short name used when printing buffer views, e.g. `f32`.
    pub fn short_name(self) -> &'static str {
        match self {
            ElementType::Bool => "i1",
            ElementType::Int8 => "i8",
            ElementType::Int16 => "i16",
            ElementType::Int32 => "i32",
            ElementType::Int64 => "i64",
            ElementType::UInt8 => "ui8",
            ElementType::UInt16 => "ui16",
            ElementType::UInt32 => "ui32",
            ElementType::UInt64 => "ui64",
            ElementType::Float16 => "f16",
            ElementType::BFloat16 => "bf16",
            ElementType::Float32 => "f32",
            ElementType::Float64 => "f64",
            ElementType::Complex64 => "c64",
            ElementType::Complex128 => "c128",
        }
    }

    pub(crate) fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => ElementType::Bool,
            1 => ElementType::Int8,
            2 => ElementType::Int16,
            3 => ElementType::Int32,
            4 => ElementType::Int64,
            5 => ElementType::UInt8,
            6 => ElementType::UInt16,
            7 => ElementType::UInt32,
            8 => ElementType::UInt64,
            9 => ElementType::Float16,
            10 => ElementType::BFloat16,
            11 => ElementType::Float32,
            12 => ElementType::Float64,
            13 => ElementType::Complex64,
            14 => ElementType::Complex128,
            _ => return Err(status!(InvalidArgument, "unknown element type {value}")),
        })
    }
}
impl std::fmt::Display for ElementType {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.write_str(self.short_name())
    }
}

/// Memory encoding of the elements of a buffer view.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum EncodingType {
    /// Encoding is unknown or unspecified; contents can not be interpreted.
    Opaque = 0,
    /// Dense, densely packed, row-major (C order) layout.
    DenseRowMajor = 1,
}
impl EncodingType {
    pub(crate) fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(EncodingType::Opaque),
            1 => Ok(EncodingType::DenseRowMajor),
            _ => Err(status!(InvalidArgument, "unknown encoding type {value}")),
        }
    }
}

mod private {
    pub trait Sealed {}
}

/// A trait for Rust types that can be stored as elements of a buffer view.
///
/// Elements are stored little-endian.
pub trait Element: Copy + 'static + private::Sealed {
    /// The [`ElementType`] enum variant of the implementing type.
    const TYPE: ElementType;

    /// Append the little-endian encoding of the value.
    fn write_le(&self, out: &mut Vec<u8>);

    /// Decode a value from exactly [`ElementType::byte_size`] bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_primitive_element {
    ($rust_type:ty, $variant:ident) => {
        impl private::Sealed for $rust_type {}
        impl Element for $rust_type {
            const TYPE: ElementType = ElementType::$variant;
            fn write_le(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$rust_type>()];
                raw.copy_from_slice(bytes);
                <$rust_type>::from_le_bytes(raw)
            }
        }
    };
}

impl_primitive_element!(i8, Int8);
impl_primitive_element!(i16, Int16);
impl_primitive_element!(i32, Int32);
impl_primitive_element!(i64, Int64);
impl_primitive_element!(u8, UInt8);
impl_primitive_element!(u16, UInt16);
impl_primitive_element!(u32, UInt32);
impl_primitive_element!(u64, UInt64);
impl_primitive_element!(f32, Float32);
impl_primitive_element!(f64, Float64);

impl private::Sealed for bool {}
impl Element for bool {
    const TYPE: ElementType = ElementType::Bool;
    fn write_le(&self, out: &mut Vec<u8>) {
        out.push(*self as u8);
    }
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

macro_rules! impl_half_element {
    ($rust_type:ty, $variant:ident) => {
        impl private::Sealed for $rust_type {}
        impl Element for $rust_type {
            const TYPE: ElementType = ElementType::$variant;
            fn write_le(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_bits().to_le_bytes());
            }
            fn read_le(bytes: &[u8]) -> Self {
                <$rust_type>::from_bits(u16::from_le_bytes([bytes[0], bytes[1]]))
            }
        }
    };
}

impl_half_element!(f16, Float16);
impl_half_element!(bf16, BFloat16);

macro_rules! impl_complex_element {
    ($part:ty, $variant:ident) => {
        impl private::Sealed for Complex<$part> {}
        impl Element for Complex<$part> {
            const TYPE: ElementType = ElementType::$variant;
            fn write_le(&self, out: &mut Vec<u8>) {
                self.re.write_le(out);
                self.im.write_le(out);
            }
            fn read_le(bytes: &[u8]) -> Self {
                let half = std::mem::size_of::<$part>();
                Complex {
                    re: <$part>::read_le(&bytes[..half]),
                    im: <$part>::read_le(&bytes[half..]),
                }
            }
        }
    };
}

impl_complex_element!(f32, Complex64);
impl_complex_element!(f64, Complex128);

/// Encode a slice of elements into little-endian bytes.
pub fn to_bytes<T: Element>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::TYPE.byte_size());
    for value in values {
        value.write_le(&mut out);
    }
    out
}

/// Decode little-endian bytes into elements.
///
/// Fails if the byte length is not a multiple of the element size.
pub fn from_bytes<T: Element>(bytes: &[u8]) -> Result<Vec<T>> {
    let size = T::TYPE.byte_size();
    if bytes.len() % size != 0 {
        return Err(status!(
            InvalidArgument,
            "byte length {} is not a multiple of the {} element size {size}",
            bytes.len(),
            T::TYPE
        ));
    }
    Ok(bytes.chunks_exact(size).map(T::read_le).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;

    #[test]
    fn byte_sizes_match_rust_types() {
        fn check<T: Element>() {
            assert_eq!(T::TYPE.byte_size(), std::mem::size_of::<T>(), "{}", T::TYPE);
        }
        check::<i8>();
        check::<i16>();
        check::<i32>();
        check::<i64>();
        check::<u8>();
        check::<u16>();
        check::<u32>();
        check::<u64>();
        check::<f32>();
        check::<f64>();
        check::<bool>();
        check::<f16>();
        check::<bf16>();
        check::<Complex<f32>>();
        check::<Complex<f64>>();
    }

    #[test]
    fn element_type_tags() {
        for tag in 0..=14u8 {
            assert_eq!(ElementType::from_u8(tag).unwrap() as u8, tag);
        }
        assert_eq!(
            ElementType::from_u8(15).unwrap_err().code(),
            StatusCode::InvalidArgument
        );
        assert_eq!(EncodingType::from_u8(1).unwrap(), EncodingType::DenseRowMajor);
        assert!(EncodingType::from_u8(7).is_err());
    }

    #[test]
    fn f32_bytes() {
        let bytes = to_bytes(&[1.0_f32, -2.5]);
        assert_eq!(bytes, [0, 0, 0x80, 0x3f, 0, 0, 0x20, 0xc0]);
        assert_eq!(from_bytes::<f32>(&bytes).unwrap(), [1.0, -2.5]);
        assert!(from_bytes::<f32>(&bytes[..7]).is_err());
    }

    #[test]
    fn complex_bytes() {
        let values = [Complex { re: 1.0_f64, im: -1.0 }];
        let bytes = to_bytes(&values);
        assert_eq!(bytes.len(), 16);
        assert_eq!(from_bytes::<Complex<f64>>(&bytes).unwrap(), values);
    }
}
