//! Write `simple_mul.tvmb`, a module exporting `module.simple_mul`, for use with `tensorvm-run`.
//!
//! ```text
//! cargo run --example write_module -- simple_mul.tvmb
//! tensorvm-run local-sync simple_mul.tvmb
//! ```

use std::path::PathBuf;

use clap::Parser;
use tensorvm::vm::{BinaryOp, FunctionBuilder, Module, TensorType};
use tensorvm::ElementType;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Output path of the module
    #[arg(default_value = "simple_mul.tvmb")]
    output: PathBuf,
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let args = Args::parse();

    let ty = TensorType::dense(ElementType::Float32, &[4]);
    let mut builder = FunctionBuilder::new("simple_mul", vec![ty.clone(), ty.clone()]);
    let product = builder.binary(BinaryOp::Mul, builder.arg(0), builder.arg(1));
    let function = builder.returns(&[product], vec![ty]).unwrap();

    let mut module = Module::new("module");
    module.add_function(function).unwrap();

    let bytes = module.to_bytes();
    std::fs::write(&args.output, &bytes).unwrap();
    log::info!("wrote {} bytes to {}", bytes.len(), args.output.display());

    // Round trip through the loader the runtime uses.
    Module::from_file(&args.output).unwrap();
}
