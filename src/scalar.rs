//! Custom scalar types that can be stored in buffer views.
//!
//! Half precision floating point types are provided by the `half` feature if enabled, otherwise simple wrappers
//! around `u16` are provided without any arithmetic operations.
//!
//! Complex numbers are provided by the `num-complex` feature if enabled, otherwise a simple struct with real and
//! imaginary parts is provided without any arithmetic operations.

#[cfg(not(feature = "half"))]
macro_rules! bits_scalar {
    ($(#[$outer:meta])* $name:ident, $repr:ty) => {
        #[derive(Copy, Clone, Debug, Default, PartialEq)]
        #[repr(transparent)]
        $(#[$outer])*
        pub struct $name($repr);
        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "` from its raw bit representation.")]
            pub fn from_bits(bits: $repr) -> Self {
                Self(bits)
            }
            #[doc = concat!("Get the raw bit representation of the `", stringify!($name), "`.")]
            pub fn to_bits(self) -> $repr {
                self.0
            }
        }
    };
}

cfg_if::cfg_if! { if #[cfg(feature = "half")] {
    pub use half::f16;
    pub use half::bf16;
} else {
    bits_scalar!(
        /// A 16-bit floating point type implementing the IEEE 754-2008 `binary16` a.k.a "half" format.
        ///
        /// Doesn't provide any arithmetic operations, but can be converted to/from `u16`.
        /// Enable the `half` feature to get a fully functional `f16` type.
        #[allow(non_camel_case_types)]
        f16, u16
    );

    bits_scalar!(
        /// A 16-bit floating point type implementing the `bfloat16` format.
        ///
        /// Doesn't provide any arithmetic operations, but can be converted to/from `u16`.
        /// Enable the `half` feature to get a fully functional `bf16` type.
        #[allow(non_camel_case_types)]
        bf16, u16
    );
} }

cfg_if::cfg_if! { if #[cfg(feature = "num-complex")] {
    pub use num_complex::Complex;
} else {
    /// A complex number in Cartesian form.
    ///
    /// Doesn't provide any arithmetic operations, but expose the real and imaginary parts.
    /// Enable the `num-complex` feature to get a fully functional `Complex` type.
    #[derive(Copy, Clone, Debug, Default, PartialEq)]
    #[repr(C)]
    pub struct Complex<T> {
        /// Real portion of the complex number
        pub re: T,
        /// Imaginary portion of the complex number
        pub im: T,
    }
} }

/// Widen a half precision value for printing.
pub(crate) fn f16_to_f64(value: f16) -> f64 {
    cfg_if::cfg_if! { if #[cfg(feature = "half")] {
        value.to_f64()
    } else {
        half_bits_to_f64(value.to_bits())
    } }
}

/// Widen a bfloat16 value for printing.
pub(crate) fn bf16_to_f64(value: bf16) -> f64 {
    f32::from_bits((value.to_bits() as u32) << 16) as f64
}

#[cfg(not(feature = "half"))]
fn half_bits_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exp = ((bits >> 10) & 0x1f) as i32;
    let frac = (bits & 0x3ff) as f64;
    match exp {
        0 => sign * frac * 2f64.powi(-24),
        0x1f if frac == 0.0 => sign * f64::INFINITY,
        0x1f => f64::NAN,
        _ => sign * (1.0 + frac / 1024.0) * 2f64.powi(exp - 15),
    }
}
