//! Binary encoding of modules.
//!
//! Layout (all integers little-endian, strings are a `u32` byte length followed by UTF-8):
//!
//! ```text
//! magic     b"TVMB"
//! version   u16 major, u16 minor
//! name      str
//! nfuncs    u32
//! function  name: str
//!           nargs: u32, arg types
//!           nresults: u32, result types
//!           nregs: u32
//!           ninstrs: u32, instructions
//! type      element: u8, encoding: u8, rank: u32, dims: u64 * rank
//! instr     opcode: u8, operands: u32 register indices
//! ```

use super::module::{BinaryOp, Function, Instruction, Module, Register, TensorType, UnaryOp};
use crate::element::{ElementType, EncodingType};
use crate::{status, Result};

/// Magic bytes every module starts with.
pub const MAGIC: [u8; 4] = *b"TVMB";
/// Major version written by this crate; modules with another major version are rejected.
pub const VERSION_MAJOR: u16 = 1;
/// Minor version written by this crate; newer minor versions are accepted.
pub const VERSION_MINOR: u16 = 0;

const MAX_RANK: u32 = 16;

const OP_ADD: u8 = 0x01;
const OP_SUB: u8 = 0x02;
const OP_MUL: u8 = 0x03;
const OP_DIV: u8 = 0x04;
const OP_MIN: u8 = 0x05;
const OP_MAX: u8 = 0x06;
const OP_NEG: u8 = 0x10;
const OP_ABS: u8 = 0x11;
const OP_SQRT: u8 = 0x12;
const OP_RETURN: u8 = 0x20;

pub(crate) fn encode(module: &Module) -> Vec<u8> {
    let mut w = Writer::default();
    w.bytes(&MAGIC);
    w.u16(VERSION_MAJOR);
    w.u16(VERSION_MINOR);
    w.str(module.name());
    w.u32(module.functions().len() as u32);
    for function in module.functions() {
        w.str(function.name());
        w.u32(function.arguments().len() as u32);
        for ty in function.arguments() {
            w.tensor_type(ty);
        }
        w.u32(function.results().len() as u32);
        for ty in function.results() {
            w.tensor_type(ty);
        }
        w.u32(function.register_count());
        w.u32(function.body().len() as u32);
        for instr in function.body() {
            w.instruction(instr);
        }
    }
    w.0
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Module> {
    let mut r = Reader { bytes, offset: 0 };
    let magic = r.take(4)?;
    if magic != MAGIC {
        return Err(status!(
            InvalidArgument,
            "not a bytecode module (magic {magic:02x?}, expected {MAGIC:02x?})"
        ));
    }
    let major = r.u16()?;
    let minor = r.u16()?;
    if major != VERSION_MAJOR {
        return Err(status!(
            Unimplemented,
            "bytecode version {major}.{minor} is not supported (expected {VERSION_MAJOR}.x)"
        ));
    }
    if minor > VERSION_MINOR {
        log::warn!("bytecode minor version {minor} is newer than {VERSION_MINOR}");
    }
    let name = r.str()?;
    let function_count = r.u32()?;
    let mut functions = Vec::new();
    for _ in 0..function_count {
        functions.push(r.function()?);
    }
    if r.offset != bytes.len() {
        return Err(status!(
            InvalidArgument,
            "{} trailing bytes after module '{name}'",
            bytes.len() - r.offset
        ));
    }
    let mut module = Module::new(name);
    for function in functions {
        module.add_function(function)?;
    }
    Ok(module)
}

#[derive(Default)]
struct Writer(Vec<u8>);
impl Writer {
    fn bytes(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    fn u8(&mut self, v: u8) {
        self.0.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.bytes(&v.to_le_bytes());
    }

    fn str(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.bytes(s.as_bytes());
    }

    fn tensor_type(&mut self, ty: &TensorType) {
        self.u8(ty.element_type as u8);
        self.u8(ty.encoding as u8);
        self.u32(ty.shape.len() as u32);
        for &dim in &ty.shape {
            self.u64(dim as u64);
        }
    }

    fn instruction(&mut self, instr: &Instruction) {
        match instr {
            Instruction::Binary { op, dst, lhs, rhs } => {
                self.u8(match op {
                    BinaryOp::Add => OP_ADD,
                    BinaryOp::Sub => OP_SUB,
                    BinaryOp::Mul => OP_MUL,
                    BinaryOp::Div => OP_DIV,
                    BinaryOp::Min => OP_MIN,
                    BinaryOp::Max => OP_MAX,
                });
                self.u32(dst.0);
                self.u32(lhs.0);
                self.u32(rhs.0);
            }
            Instruction::Unary { op, dst, src } => {
                self.u8(match op {
                    UnaryOp::Neg => OP_NEG,
                    UnaryOp::Abs => OP_ABS,
                    UnaryOp::Sqrt => OP_SQRT,
                });
                self.u32(dst.0);
                self.u32(src.0);
            }
            Instruction::Return { values } => {
                self.u8(OP_RETURN);
                self.u32(values.len() as u32);
                for value in values {
                    self.u32(value.0);
                }
            }
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}
impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                status!(
                    InvalidArgument,
                    "bytecode truncated: need {len} bytes at offset {} of {}",
                    self.offset,
                    self.bytes.len()
                )
            })?;
        let out = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn str(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let offset = self.offset;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| status!(InvalidArgument, "invalid UTF-8 string at offset {offset}"))
    }

    fn reg(&mut self) -> Result<Register> {
        Ok(Register(self.u32()?))
    }

    fn tensor_type(&mut self) -> Result<TensorType> {
        let element_type = ElementType::from_u8(self.u8()?)?;
        let encoding = EncodingType::from_u8(self.u8()?)?;
        let rank = self.u32()?;
        if rank > MAX_RANK {
            return Err(status!(
                InvalidArgument,
                "tensor rank {rank} exceeds the maximum of {MAX_RANK}"
            ));
        }
        let mut shape = Vec::with_capacity(rank as usize);
        for _ in 0..rank {
            let dim = self.u64()?;
            let dim = usize::try_from(dim)
                .map_err(|_| status!(InvalidArgument, "dimension {dim} is not addressable"))?;
            shape.push(dim);
        }
        Ok(TensorType {
            element_type,
            encoding,
            shape,
        })
    }

    fn types(&mut self) -> Result<Vec<TensorType>> {
        let count = self.u32()?;
        (0..count).map(|_| self.tensor_type()).collect()
    }

    fn instruction(&mut self) -> Result<Instruction> {
        let offset = self.offset;
        let opcode = self.u8()?;
        let binary = match opcode {
            OP_ADD => Some(BinaryOp::Add),
            OP_SUB => Some(BinaryOp::Sub),
            OP_MUL => Some(BinaryOp::Mul),
            OP_DIV => Some(BinaryOp::Div),
            OP_MIN => Some(BinaryOp::Min),
            OP_MAX => Some(BinaryOp::Max),
            _ => None,
        };
        if let Some(op) = binary {
            return Ok(Instruction::Binary {
                op,
                dst: self.reg()?,
                lhs: self.reg()?,
                rhs: self.reg()?,
            });
        }
        let unary = match opcode {
            OP_NEG => Some(UnaryOp::Neg),
            OP_ABS => Some(UnaryOp::Abs),
            OP_SQRT => Some(UnaryOp::Sqrt),
            _ => None,
        };
        if let Some(op) = unary {
            return Ok(Instruction::Unary {
                op,
                dst: self.reg()?,
                src: self.reg()?,
            });
        }
        if opcode == OP_RETURN {
            let count = self.u32()?;
            let values = (0..count).map(|_| self.reg()).collect::<Result<_>>()?;
            return Ok(Instruction::Return { values });
        }
        Err(status!(
            InvalidArgument,
            "unknown opcode {opcode:#04x} at offset {offset}"
        ))
    }

    fn function(&mut self) -> Result<Function> {
        let name = self.str()?;
        let arguments = self.types()?;
        let results = self.types()?;
        let register_count = self.u32()?;
        let instr_count = self.u32()?;
        let body = (0..instr_count)
            .map(|_| self.instruction())
            .collect::<Result<Vec<_>>>()?;
        Ok(Function {
            name,
            arguments,
            results,
            register_count,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::simple_mul_module;
    use crate::vm::FunctionBuilder;
    use crate::StatusCode;

    #[test]
    fn encode_decode() {
        let module = simple_mul_module();
        let bytes = module.to_bytes();
        assert_eq!(&bytes[..4], b"TVMB");
        assert_eq!(Module::from_bytes(&bytes).unwrap(), module);
    }

    #[test]
    fn all_opcodes() {
        let ty = TensorType::dense(ElementType::Float64, &[2, 3]);
        let mut b = FunctionBuilder::new("all", vec![ty.clone(), ty.clone()]);
        let (x, y) = (b.arg(0), b.arg(1));
        let mut last = x;
        for op in [
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Mul,
            BinaryOp::Div,
            BinaryOp::Min,
            BinaryOp::Max,
        ] {
            last = b.binary(op, last, y);
        }
        for op in [UnaryOp::Neg, UnaryOp::Abs, UnaryOp::Sqrt] {
            last = b.unary(op, last);
        }
        let mut module = Module::new("ops");
        module.add_function(b.returns(&[last, x], vec![ty.clone(), ty]).unwrap()).unwrap();
        assert_eq!(Module::from_bytes(&module.to_bytes()).unwrap(), module);
    }

    #[test]
    fn bad_magic() {
        let mut bytes = simple_mul_module().to_bytes();
        bytes[0] = b'X';
        let err = Module::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert!(err.message().contains("not a bytecode module"));
    }

    #[test]
    fn unsupported_version() {
        let mut bytes = simple_mul_module().to_bytes();
        bytes[4..6].copy_from_slice(&2u16.to_le_bytes());
        let err = Module::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.code(), StatusCode::Unimplemented);

        let mut bytes = simple_mul_module().to_bytes();
        bytes[6..8].copy_from_slice(&7u16.to_le_bytes());
        assert!(Module::from_bytes(&bytes).is_ok());
    }

    #[test]
    fn truncated_and_trailing() {
        let bytes = simple_mul_module().to_bytes();
        for len in [0, 3, 8, bytes.len() / 2, bytes.len() - 1] {
            let err = Module::from_bytes(&bytes[..len]).unwrap_err();
            assert_eq!(err.code(), StatusCode::InvalidArgument, "len {len}");
        }
        let mut bytes = bytes;
        bytes.push(0);
        let err = Module::from_bytes(&bytes).unwrap_err();
        assert!(err.message().contains("trailing"));
    }

    #[test]
    fn unknown_opcode() {
        let mut w = Writer::default();
        w.bytes(&MAGIC);
        w.u16(VERSION_MAJOR);
        w.u16(VERSION_MINOR);
        w.str("m");
        w.u32(1);
        w.str("f");
        w.u32(0);
        w.u32(0);
        w.u32(0);
        w.u32(1);
        w.u8(0x7f);
        let err = Module::from_bytes(&w.0).unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert!(err.message().contains("unknown opcode 0x7f"));
    }

    #[test]
    fn verification_runs_on_load() {
        let mut w = Writer::default();
        w.bytes(&MAGIC);
        w.u16(VERSION_MAJOR);
        w.u16(VERSION_MINOR);
        w.str("m");
        w.u32(1);
        w.str("f");
        w.u32(0);
        w.u32(0);
        w.u32(1);
        w.u32(2);
        w.instruction(&Instruction::Unary {
            op: UnaryOp::Neg,
            dst: Register(0),
            src: Register(5),
        });
        w.instruction(&Instruction::Return { values: vec![] });
        let err = Module::from_bytes(&w.0).unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert!(err.to_string().contains("verifying function 'm.f'"));
    }
}
