use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tensorvm::vm::{BinaryOp, FunctionBuilder, Module, TensorType};
use tensorvm::ElementType;

const EXPECTED: &str =
    "4xf32=1 1.1 1.2 1.3\n * \n4xf32=10 100 1000 10000\n = \n4xf32=10 110 1200 13000";

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tensorvm-run"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

struct TempModule(PathBuf);
impl TempModule {
    fn simple_mul(tag: &str) -> Self {
        let ty = TensorType::dense(ElementType::Float32, &[4]);
        let mut builder = FunctionBuilder::new("simple_mul", vec![ty.clone(), ty.clone()]);
        let product = builder.binary(BinaryOp::Mul, builder.arg(0), builder.arg(1));
        let mut module = Module::new("module");
        module
            .add_function(builder.returns(&[product], vec![ty]).unwrap())
            .unwrap();

        let path = std::env::temp_dir().join(format!(
            "tensorvm-cli-{}-{tag}.tvmb",
            std::process::id()
        ));
        std::fs::write(&path, module.to_bytes()).unwrap();
        Self(path)
    }

    fn path(&self) -> &str {
        self.0.to_str().unwrap()
    }
}
impl Drop for TempModule {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn usage_without_arguments() {
    for args in [&[][..], &["local-sync"][..]] {
        let output = run(args);
        assert_eq!(output.status.code(), Some(1), "{args:?}");
        assert!(output.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Usage"), "{stderr}");
    }
}

#[test]
fn simple_mul() {
    let module = TempModule::simple_mul("ok");
    for device in ["local-sync", "local-task://0"] {
        let output = run(&[device, module.path()]);
        assert_eq!(output.status.code(), Some(0), "{output:?}");
        assert_eq!(String::from_utf8(output.stdout).unwrap(), EXPECTED);
    }
}

#[test]
fn deterministic_output() {
    let module = TempModule::simple_mul("determinism");
    let first = run(&["local-sync", module.path()]);
    let second = run(&["local-sync", module.path()]);
    assert!(!first.stdout.is_empty());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn missing_module() {
    let path = std::env::temp_dir().join("tensorvm-cli-does-not-exist.tvmb");
    let output = run(&["local-sync", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(5));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("NOT_FOUND"), "{stderr}");
    assert!(stderr.contains("loading module"), "{stderr}");
}

#[test]
fn unknown_device() {
    let module = TempModule::simple_mul("device");
    let output = run(&["vulkan", module.path()]);
    assert_eq!(output.status.code(), Some(5));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("creating device"), "{stderr}");
}

#[test]
fn invalid_module() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
    let output = run(&["local-sync", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
}

#[test]
fn element_cap() {
    let module = TempModule::simple_mul("cap");
    let output = run(&["--max-element-count", "1", "local-sync", module.path()]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("4xf32=1...\n * \n"), "{stdout}");
}

#[test]
fn verbose_logs_go_to_stderr() {
    let module = TempModule::simple_mul("verbose");
    let output = run(&["-v", "local-sync", module.path()]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8(output.stdout).unwrap(), EXPECTED);
    assert!(!output.stderr.is_empty());
}

#[test]
fn extra_arguments_are_ignored() {
    let module = TempModule::simple_mul("extra");
    for extra in [&["extra"][..], &["one", "--two", "-3"][..]] {
        let mut args = vec!["local-sync", module.path()];
        args.extend_from_slice(extra);
        let output = run(&args);
        assert_eq!(output.status.code(), Some(0), "{output:?}");
        assert_eq!(String::from_utf8(output.stdout).unwrap(), EXPECTED);
    }
}
