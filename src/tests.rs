#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::vm::{BinaryOp, FunctionBuilder, Module, TensorType};
use crate::ElementType;

#[ctor::ctor]
fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// A module named `module` exporting `simple_mul(tensor<4xf32>, tensor<4xf32>) -> tensor<4xf32>`.
pub(crate) fn simple_mul_module() -> Module {
    let ty = TensorType::dense(ElementType::Float32, &[4]);
    let mut builder = FunctionBuilder::new("simple_mul", vec![ty.clone(), ty.clone()]);
    let product = builder.binary(BinaryOp::Mul, builder.arg(0), builder.arg(1));
    let function = builder.returns(&[product], vec![ty]).unwrap();
    let mut module = Module::new("module");
    module.add_function(function).unwrap();
    module
}

/// A module serialized to a temporary file, removed on drop.
pub(crate) struct ModuleFile(PathBuf);
impl ModuleFile {
    pub(crate) fn new(module: &Module) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "tensorvm-test-{}-{}.tvmb",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&path, module.to_bytes()).unwrap();
        Self(path)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.0
    }
}
impl Drop for ModuleFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}
