//! Executes module functions on buffer views.
//!
//! Every instruction reads whole tensors from registers and writes a freshly allocated tensor to its
//! destination register. Operands of binary instructions must agree in shape and element type; there is no
//! implicit broadcasting or promotion.

use super::module::{BinaryOp, Function, Instruction, TensorType, UnaryOp};
use crate::element::{self, Element, ElementType, EncodingType};
use crate::error::ResultExt;
use crate::hal::{BufferView, DeviceAllocator};
use crate::{status, Result};

/// Run `function` with `inputs`, allocating intermediate values and results from `allocator`.
///
/// # Errors
///
/// * `INVALID_ARGUMENT` - the inputs do not match the function signature, or operand types disagree.
/// * `UNIMPLEMENTED` - an operation is not supported for the element type.
/// * `FAILED_PRECONDITION` - a register is read before it is written.
pub(crate) fn invoke(
    function: &Function,
    inputs: &[BufferView],
    allocator: &DeviceAllocator,
) -> Result<Vec<BufferView>> {
    check_signature("argument", function.arguments(), inputs)?;

    let mut registers: Vec<Option<BufferView>> = vec![None; function.register_count() as usize];
    for (slot, input) in registers.iter_mut().zip(inputs) {
        *slot = Some(input.clone());
    }
    let read = |registers: &[Option<BufferView>], reg: super::Register| {
        registers[reg.0 as usize]
            .clone()
            .ok_or_else(|| status!(FailedPrecondition, "register {} read before written", reg.0))
    };

    for (pc, instr) in function.body().iter().enumerate() {
        log::trace!("{}@{pc}: {instr:?}", function.name());
        match instr {
            Instruction::Binary { op, dst, lhs, rhs } => {
                let lhs = read(&registers, *lhs)?;
                let rhs = read(&registers, *rhs)?;
                let value = binary(*op, &lhs, &rhs, allocator)
                    .annotate_with(|| format!("at {}@{pc} ({op:?})", function.name()))?;
                registers[dst.0 as usize] = Some(value);
            }
            Instruction::Unary { op, dst, src } => {
                let src = read(&registers, *src)?;
                let value = unary(*op, &src, allocator)
                    .annotate_with(|| format!("at {}@{pc} ({op:?})", function.name()))?;
                registers[dst.0 as usize] = Some(value);
            }
            Instruction::Return { values } => {
                let results = values
                    .iter()
                    .map(|reg| read(&registers, *reg))
                    .collect::<Result<Vec<_>>>()?;
                check_signature("result", function.results(), &results)?;
                return Ok(results);
            }
        }
    }
    Err(status!(
        Internal,
        "function '{}' fell off the end of its body",
        function.name()
    ))
}

fn check_signature(what: &str, expected: &[TensorType], values: &[BufferView]) -> Result<()> {
    if expected.len() != values.len() {
        return Err(status!(
            InvalidArgument,
            "expected {} {what}s, got {}",
            expected.len(),
            values.len()
        ));
    }
    for (i, (ty, value)) in expected.iter().zip(values).enumerate() {
        if ty.element_type != value.element_type()
            || ty.encoding != value.encoding()
            || ty.shape != value.shape()
        {
            return Err(status!(
                InvalidArgument,
                "{what} {i} type mismatch: expected {ty}, got {}",
                type_of(value)
            ));
        }
    }
    Ok(())
}

fn type_of(view: &BufferView) -> TensorType {
    TensorType {
        element_type: view.element_type(),
        encoding: view.encoding(),
        shape: view.shape().to_vec(),
    }
}

fn output_like(
    view: &BufferView,
    bytes: Vec<u8>,
    allocator: &DeviceAllocator,
) -> Result<BufferView> {
    let buffer = allocator.allocate_output(&bytes)?;
    BufferView::create(
        buffer,
        view.shape(),
        view.element_type(),
        EncodingType::DenseRowMajor,
        allocator.host_allocator(),
    )
}

fn binary(
    op: BinaryOp,
    lhs: &BufferView,
    rhs: &BufferView,
    allocator: &DeviceAllocator,
) -> Result<BufferView> {
    if lhs.element_type() != rhs.element_type() || lhs.shape() != rhs.shape() {
        return Err(status!(
            InvalidArgument,
            "operand type mismatch: {} vs {}",
            type_of(lhs),
            type_of(rhs)
        ));
    }
    require_dense(lhs)?;
    require_dense(rhs)?;
    let (a, b) = (lhs.contents()?, rhs.contents()?);
    let bytes = match lhs.element_type() {
        ElementType::Float32 => binary_typed::<f32>(op, a, b)?,
        ElementType::Float64 => binary_typed::<f64>(op, a, b)?,
        ElementType::Int32 => binary_typed::<i32>(op, a, b)?,
        ElementType::Int64 => binary_typed::<i64>(op, a, b)?,
        other => {
            return Err(status!(
                Unimplemented,
                "{op:?} is not supported for {other} elements"
            ))
        }
    };
    output_like(lhs, bytes, allocator)
}

fn unary(op: UnaryOp, src: &BufferView, allocator: &DeviceAllocator) -> Result<BufferView> {
    require_dense(src)?;
    let a = src.contents()?;
    let bytes = match src.element_type() {
        ElementType::Float32 => unary_typed::<f32>(op, a)?,
        ElementType::Float64 => unary_typed::<f64>(op, a)?,
        ElementType::Int32 => unary_typed::<i32>(op, a)?,
        ElementType::Int64 => unary_typed::<i64>(op, a)?,
        other => {
            return Err(status!(
                Unimplemented,
                "{op:?} is not supported for {other} elements"
            ))
        }
    };
    output_like(src, bytes, allocator)
}

fn require_dense(view: &BufferView) -> Result<()> {
    if view.encoding() != EncodingType::DenseRowMajor {
        return Err(status!(
            Unimplemented,
            "element-wise operations require dense row-major operands, got {:?}",
            view.encoding()
        ));
    }
    Ok(())
}

fn binary_typed<T: Arith>(op: BinaryOp, a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
    let a = element::from_bytes::<T>(a)?;
    let b = element::from_bytes::<T>(b)?;
    let out = a
        .into_iter()
        .zip(b)
        .map(|(x, y)| match op {
            BinaryOp::Add => Ok(x.add(y)),
            BinaryOp::Sub => Ok(x.sub(y)),
            BinaryOp::Mul => Ok(x.mul(y)),
            BinaryOp::Div => x.div(y),
            BinaryOp::Min => Ok(if y < x { y } else { x }),
            BinaryOp::Max => Ok(if y > x { y } else { x }),
        })
        .collect::<Result<Vec<T>>>()?;
    Ok(element::to_bytes(&out))
}

fn unary_typed<T: Arith>(op: UnaryOp, a: &[u8]) -> Result<Vec<u8>> {
    let out = element::from_bytes::<T>(a)?
        .into_iter()
        .map(|x| match op {
            UnaryOp::Neg => Ok(x.neg()),
            UnaryOp::Abs => Ok(x.abs()),
            UnaryOp::Sqrt => x.sqrt(),
        })
        .collect::<Result<Vec<T>>>()?;
    Ok(element::to_bytes(&out))
}

/// Arithmetic on element types the interpreter computes with.
///
/// Integer arithmetic wraps on overflow; integer division by zero is an error.
trait Arith: Element + PartialOrd {
    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;
    fn div(self, rhs: Self) -> Result<Self>;
    fn neg(self) -> Self;
    fn abs(self) -> Self;
    fn sqrt(self) -> Result<Self>;
}

macro_rules! impl_float_arith {
    ($t:ty) => {
        impl Arith for $t {
            fn add(self, rhs: Self) -> Self {
                self + rhs
            }
            fn sub(self, rhs: Self) -> Self {
                self - rhs
            }
            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }
            fn div(self, rhs: Self) -> Result<Self> {
                Ok(self / rhs)
            }
            fn neg(self) -> Self {
                -self
            }
            fn abs(self) -> Self {
                <$t>::abs(self)
            }
            fn sqrt(self) -> Result<Self> {
                Ok(<$t>::sqrt(self))
            }
        }
    };
}

macro_rules! impl_int_arith {
    ($t:ty) => {
        impl Arith for $t {
            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
            fn sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }
            fn mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
            fn div(self, rhs: Self) -> Result<Self> {
                if rhs == 0 {
                    return Err(status!(InvalidArgument, "integer division by zero"));
                }
                Ok(self.wrapping_div(rhs))
            }
            fn neg(self) -> Self {
                self.wrapping_neg()
            }
            fn abs(self) -> Self {
                self.wrapping_abs()
            }
            fn sqrt(self) -> Result<Self> {
                Err(status!(
                    Unimplemented,
                    "sqrt is not supported for {} elements",
                    <$t as Element>::TYPE
                ))
            }
        }
    };
}

impl_float_arith!(f32);
impl_float_arith!(f64);
impl_int_arith!(i32);
impl_int_arith!(i64);
