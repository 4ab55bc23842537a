use std::path::Path;

use super::bytecode;
use crate::element::{ElementType, EncodingType};
use crate::error::ResultExt;
use crate::{status, Result};

/// Static type of a function argument or result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorType {
    /// Element type.
    pub element_type: ElementType,
    /// Memory encoding.
    pub encoding: EncodingType,
    /// Dimension sizes, outermost first.
    pub shape: Vec<usize>,
}
impl TensorType {
    /// A dense row-major tensor type.
    pub fn dense(element_type: ElementType, shape: &[usize]) -> Self {
        Self {
            element_type,
            encoding: EncodingType::DenseRowMajor,
            shape: shape.to_vec(),
        }
    }
}
impl std::fmt::Display for TensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("tensor<")?;
        for dim in &self.shape {
            write!(f, "{dim}x")?;
        }
        write!(f, "{}>", self.element_type)
    }
}

/// Upper bound of the registers a single function may use.
pub const MAX_REGISTER_COUNT: u32 = 1 << 16;

/// A function-local register index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(pub u32);

/// Element-wise binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `lhs + rhs`
    Add,
    /// `lhs - rhs`
    Sub,
    /// `lhs * rhs`
    Mul,
    /// `lhs / rhs`
    Div,
    /// `min(lhs, rhs)`
    Min,
    /// `max(lhs, rhs)`
    Max,
}

/// Element-wise unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `|x|`
    Abs,
    /// `sqrt(x)`, floating point only.
    Sqrt,
}

/// One instruction of a function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `dst = op(lhs, rhs)`, operands must have identical types.
    Binary {
        /// Operation.
        op: BinaryOp,
        /// Destination register.
        dst: Register,
        /// Left operand.
        lhs: Register,
        /// Right operand.
        rhs: Register,
    },
    /// `dst = op(src)`
    Unary {
        /// Operation.
        op: UnaryOp,
        /// Destination register.
        dst: Register,
        /// Operand.
        src: Register,
    },
    /// Return the values of the registers as the function results.
    Return {
        /// Registers holding the results, in order.
        values: Vec<Register>,
    },
}

/// An exported function of a [`Module`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub(crate) name: String,
    pub(crate) arguments: Vec<TensorType>,
    pub(crate) results: Vec<TensorType>,
    pub(crate) register_count: u32,
    pub(crate) body: Vec<Instruction>,
}
impl Function {
    /// Function name, without the module prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Argument types, in order.
    pub fn arguments(&self) -> &[TensorType] {
        &self.arguments
    }

    /// Result types, in order.
    pub fn results(&self) -> &[TensorType] {
        &self.results
    }

    /// Number of registers; the first `arguments().len()` hold the arguments.
    pub fn register_count(&self) -> u32 {
        self.register_count
    }

    /// Instructions, ending with a [`Instruction::Return`].
    pub fn body(&self) -> &[Instruction] {
        &self.body
    }

    /// Check the structural invariants of the function.
    ///
    /// Every register index is in range, arguments fit in the registers, and the body ends with exactly one
    /// return whose arity matches the declared results.
    pub(crate) fn verify(&self) -> Result<()> {
        if self.register_count > MAX_REGISTER_COUNT {
            return Err(status!(
                InvalidArgument,
                "{} registers exceed the maximum of {MAX_REGISTER_COUNT}",
                self.register_count
            ));
        }
        if self.arguments.len() > self.register_count as usize {
            return Err(status!(
                InvalidArgument,
                "{} arguments do not fit in {} registers",
                self.arguments.len(),
                self.register_count
            ));
        }
        let check = |reg: Register| {
            if reg.0 < self.register_count {
                Ok(())
            } else {
                Err(status!(
                    InvalidArgument,
                    "register {} out of range (register count {})",
                    reg.0,
                    self.register_count
                ))
            }
        };
        for (pc, instr) in self.body.iter().enumerate() {
            let is_last = pc + 1 == self.body.len();
            match instr {
                Instruction::Binary { dst, lhs, rhs, .. } => {
                    check(*dst)?;
                    check(*lhs)?;
                    check(*rhs)?;
                }
                Instruction::Unary { dst, src, .. } => {
                    check(*dst)?;
                    check(*src)?;
                }
                Instruction::Return { values } => {
                    if !is_last {
                        return Err(status!(
                            InvalidArgument,
                            "return at {pc} is not the last instruction"
                        ));
                    }
                    if values.len() != self.results.len() {
                        return Err(status!(
                            InvalidArgument,
                            "return of {} values but {} results are declared",
                            values.len(),
                            self.results.len()
                        ));
                    }
                    for value in values {
                        check(*value)?;
                    }
                }
            }
        }
        if !matches!(self.body.last(), Some(Instruction::Return { .. })) {
            return Err(status!(InvalidArgument, "function body does not end with a return"));
        }
        Ok(())
    }
}

/// Builds a [`Function`] instruction by instruction.
///
/// ```
/// use tensorvm::vm::{BinaryOp, FunctionBuilder, TensorType};
/// use tensorvm::ElementType;
///
/// let ty = TensorType::dense(ElementType::Float32, &[4]);
/// let mut builder = FunctionBuilder::new("simple_mul", vec![ty.clone(), ty.clone()]);
/// let product = builder.binary(BinaryOp::Mul, builder.arg(0), builder.arg(1));
/// let function = builder.returns(&[product], vec![ty]).unwrap();
/// assert_eq!(function.name(), "simple_mul");
/// ```
#[derive(Debug)]
pub struct FunctionBuilder {
    name: String,
    arguments: Vec<TensorType>,
    register_count: u32,
    body: Vec<Instruction>,
}
impl FunctionBuilder {
    /// Start a function with the given argument types; argument `i` lives in register `i`.
    pub fn new(name: impl Into<String>, arguments: Vec<TensorType>) -> Self {
        let register_count = arguments.len() as u32;
        Self {
            name: name.into(),
            arguments,
            register_count,
            body: Vec::new(),
        }
    }

    /// The register holding argument `index`.
    ///
    /// # Panics
    ///
    /// If there is no such argument.
    pub fn arg(&self, index: usize) -> Register {
        assert!(index < self.arguments.len(), "argument {index} out of range");
        Register(index as u32)
    }

    fn fresh(&mut self) -> Register {
        let reg = Register(self.register_count);
        self.register_count += 1;
        reg
    }

    /// Append `op(lhs, rhs)` and return the register holding the result.
    pub fn binary(&mut self, op: BinaryOp, lhs: Register, rhs: Register) -> Register {
        let dst = self.fresh();
        self.body.push(Instruction::Binary { op, dst, lhs, rhs });
        dst
    }

    /// Append `op(src)` and return the register holding the result.
    pub fn unary(&mut self, op: UnaryOp, src: Register) -> Register {
        let dst = self.fresh();
        self.body.push(Instruction::Unary { op, dst, src });
        dst
    }

    /// Finish the function by returning `values` with the declared result types.
    pub fn returns(mut self, values: &[Register], results: Vec<TensorType>) -> Result<Function> {
        self.body.push(Instruction::Return {
            values: values.to_vec(),
        });
        let function = Function {
            name: self.name,
            arguments: self.arguments,
            results,
            register_count: self.register_count,
            body: self.body,
        };
        function
            .verify()
            .annotate_with(|| format!("building function '{}'", function.name))?;
        Ok(function)
    }
}

/// A loaded bytecode module: a named table of exported functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    name: String,
    functions: Vec<Function>,
}
impl Module {
    /// An empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// Add a function to the export table.
    ///
    /// # Errors
    ///
    /// `ALREADY_EXISTS` if a function with the same name is exported.
    pub fn add_function(&mut self, function: Function) -> Result<()> {
        if self.lookup_function(&function.name).is_some() {
            return Err(status!(
                AlreadyExists,
                "function '{}.{}' is already defined",
                self.name,
                function.name
            ));
        }
        self.functions.push(function);
        Ok(())
    }

    /// Module name, used as the prefix of fully qualified function names.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exported functions, in definition order.
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Look up an exported function by its unqualified name.
    pub fn lookup_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Parse and verify a module from bytecode.
    ///
    /// # Errors
    ///
    /// * `INVALID_ARGUMENT` - not a bytecode module, truncated, or fails verification.
    /// * `UNIMPLEMENTED` - the bytecode version is not supported.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let module = bytecode::decode(bytes)?;
        for function in &module.functions {
            function.verify().annotate_with(|| {
                format!("verifying function '{}.{}'", module.name, function.name)
            })?;
        }
        Ok(module)
    }

    /// Read, parse and verify a module from a file.
    ///
    /// # Errors
    ///
    /// In addition to the errors of [`from_bytes`](Self::from_bytes), `NOT_FOUND` if the file does not exist and
    /// other I/O errors mapped to their status codes.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| {
            crate::Status::from(err).annotate(format!("reading '{}'", path.display()))
        })?;
        log::debug!("read {} bytes of bytecode from {}", bytes.len(), path.display());
        Self::from_bytes(&bytes)
    }

    /// Serialize the module to bytecode.
    pub fn to_bytes(&self) -> Vec<u8> {
        bytecode::encode(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;

    fn f32x4() -> TensorType {
        TensorType::dense(ElementType::Float32, &[4])
    }

    #[test]
    fn build_function() {
        let mut builder = FunctionBuilder::new("axpy", vec![f32x4(), f32x4(), f32x4()]);
        let ax = builder.binary(BinaryOp::Mul, builder.arg(0), builder.arg(1));
        let sum = builder.binary(BinaryOp::Add, ax, builder.arg(2));
        let function = builder.returns(&[sum], vec![f32x4()]).unwrap();
        assert_eq!(function.register_count(), 5);
        assert_eq!(function.body().len(), 3);
        assert_eq!(function.arguments().len(), 3);
        assert_eq!(function.results(), [f32x4()]);
    }

    #[test]
    fn verify_rejects_bad_functions() {
        let builder = FunctionBuilder::new("f", vec![f32x4()]);
        let err = builder.returns(&[Register(3)], vec![f32x4()]).unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert!(err.to_string().contains("building function 'f'"));

        let builder = FunctionBuilder::new("f", vec![f32x4()]);
        let err = builder.returns(&[Register(0)], vec![]).unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);

        let function = Function {
            name: "g".into(),
            arguments: vec![],
            results: vec![],
            register_count: 0,
            body: vec![],
        };
        assert!(function.verify().is_err());

        let function = Function {
            name: "h".into(),
            arguments: vec![],
            results: vec![],
            register_count: MAX_REGISTER_COUNT + 1,
            body: vec![Instruction::Return { values: vec![] }],
        };
        let err = function.verify().unwrap_err();
        assert!(err.message().contains("registers exceed"));
    }

    #[test]
    fn duplicate_function() {
        let mut module = Module::new("module");
        let make = || FunctionBuilder::new("id", vec![f32x4()]);
        let builder = make();
        let arg = builder.arg(0);
        module
            .add_function(builder.returns(&[arg], vec![f32x4()]).unwrap())
            .unwrap();
        let builder = make();
        let arg = builder.arg(0);
        let err = module
            .add_function(builder.returns(&[arg], vec![f32x4()]).unwrap())
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::AlreadyExists);
        assert!(module.lookup_function("id").is_some());
        assert!(module.lookup_function("simple_mul").is_none());
    }

    #[test]
    fn tensor_type_display() {
        assert_eq!(f32x4().to_string(), "tensor<4xf32>");
        assert_eq!(
            TensorType::dense(ElementType::Int64, &[]).to_string(),
            "tensor<i64>"
        );
    }

    #[test]
    fn missing_file() {
        let err = Module::from_file("non-existing-file.tvmb").unwrap_err();
        assert_eq!(err.code(), StatusCode::NotFound);
        assert!(err.to_string().contains("non-existing-file.tvmb"));
    }
}
