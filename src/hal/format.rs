//! Text formatting of buffer views.
//!
//! A view prints as its shape, element type and elements: `2x2xi32=[1 2][3 4]`. Floating point elements use
//! the C `%G` conventions (six significant digits, trailing zeros removed), so output is stable across runs
//! and platforms.

use std::fmt::Write;

use super::BufferView;
use crate::element::{Element, ElementType, EncodingType};
use crate::scalar::{bf16, f16, Complex};
use crate::{status, Result};

const SIGNIFICANT_DIGITS: usize = 6;

pub(crate) fn shape_string(shape: &[usize]) -> String {
    shape
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("x")
}

pub(crate) fn format_buffer_view(view: &BufferView, max_element_count: usize) -> Result<String> {
    if view.encoding() != EncodingType::DenseRowMajor {
        return Err(status!(
            Unimplemented,
            "printing of {:?} encoded buffer views is not supported",
            view.encoding()
        ));
    }
    let mut out = String::new();
    if view.rank() > 0 {
        out.push_str(&shape_string(view.shape()));
        out.push('x');
    }
    let _ = write!(out, "{}=", view.element_type());
    let bytes = view.contents()?;
    let mut printer = ElementPrinter {
        element_type: view.element_type(),
        bytes,
        next: 0,
        budget: max_element_count,
        out: &mut out,
    };
    printer.print_dims(view.shape());
    Ok(out)
}

struct ElementPrinter<'a> {
    element_type: ElementType,
    bytes: &'a [u8],
    next: usize,
    budget: usize,
    out: &'a mut String,
}
impl ElementPrinter<'_> {
    /// Returns false once the element budget is spent.
    fn print_dims(&mut self, shape: &[usize]) -> bool {
        match shape {
            [] => self.print_element(false),
            [len] => {
                for i in 0..*len {
                    if !self.print_element(i > 0) {
                        return false;
                    }
                }
                true
            }
            [outer, inner @ ..] => {
                for _ in 0..*outer {
                    self.out.push('[');
                    if !self.print_dims(inner) {
                        return false;
                    }
                    self.out.push(']');
                }
                true
            }
        }
    }

    fn print_element(&mut self, separate: bool) -> bool {
        if self.budget == 0 {
            self.out.push_str("...");
            return false;
        }
        if separate {
            self.out.push(' ');
        }
        let size = self.element_type.byte_size();
        let offset = self.next * size;
        format_element(self.element_type, &self.bytes[offset..offset + size], self.out);
        self.next += 1;
        self.budget -= 1;
        true
    }
}

fn format_element(element_type: ElementType, bytes: &[u8], out: &mut String) {
    let _ = match element_type {
        ElementType::Bool => write!(out, "{}", bool::read_le(bytes) as u8),
        ElementType::Int8 => write!(out, "{}", i8::read_le(bytes)),
        ElementType::Int16 => write!(out, "{}", i16::read_le(bytes)),
        ElementType::Int32 => write!(out, "{}", i32::read_le(bytes)),
        ElementType::Int64 => write!(out, "{}", i64::read_le(bytes)),
        ElementType::UInt8 => write!(out, "{}", u8::read_le(bytes)),
        ElementType::UInt16 => write!(out, "{}", u16::read_le(bytes)),
        ElementType::UInt32 => write!(out, "{}", u32::read_le(bytes)),
        ElementType::UInt64 => write!(out, "{}", u64::read_le(bytes)),
        ElementType::Float16 => {
            let value = crate::scalar::f16_to_f64(f16::read_le(bytes));
            write!(out, "{}", format_g(value, SIGNIFICANT_DIGITS))
        }
        ElementType::BFloat16 => {
            let value = crate::scalar::bf16_to_f64(bf16::read_le(bytes));
            write!(out, "{}", format_g(value, SIGNIFICANT_DIGITS))
        }
        ElementType::Float32 => {
            let value = f32::read_le(bytes) as f64;
            write!(out, "{}", format_g(value, SIGNIFICANT_DIGITS))
        }
        ElementType::Float64 => {
            let value = f64::read_le(bytes);
            write!(out, "{}", format_g(value, SIGNIFICANT_DIGITS))
        }
        ElementType::Complex64 => {
            let value = Complex::<f32>::read_le(bytes);
            write_complex(out, value.re as f64, value.im as f64)
        }
        ElementType::Complex128 => {
            let value = Complex::<f64>::read_le(bytes);
            write_complex(out, value.re, value.im)
        }
    };
}

fn write_complex(out: &mut String, re: f64, im: f64) -> std::fmt::Result {
    write!(
        out,
        "({},{})",
        format_g(re, SIGNIFICANT_DIGITS),
        format_g(im, SIGNIFICANT_DIGITS)
    )
}

/// Format a float like C's `printf("%.*G", precision, value)`.
pub(crate) fn format_g(value: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-INF" } else { "INF" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // The exponent after rounding to `precision` significant digits decides the style.
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };
    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}E{sign}{:02}",
            strip_trailing_zeros(mantissa),
            exponent.abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent) as usize;
        strip_trailing_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn strip_trailing_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
