use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tensorvm::demo::{self, RunOptions};
use tensorvm::hal::DEFAULT_MAX_ELEMENT_COUNT;

/// Multiply two constant vectors with the `module.simple_mul` function of a bytecode module.
///
/// Prints the operands and the result to stdout. The exit code is the status code of the run, 0 on success.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Device to run on, e.g. `local-sync` or `local-task://0`
    device: String,

    /// Path to the bytecode module (.tvmb)
    module: PathBuf,

    /// Maximum number of elements printed per tensor
    #[arg(long, default_value_t = DEFAULT_MAX_ELEMENT_COUNT)]
    max_element_count: usize,

    /// Verbose logging to stderr
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Arguments after the module are accepted and ignored
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    _rest: Vec<std::ffi::OsString>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .target(env_logger::Target::Stderr)
        .init();

    let options = RunOptions {
        max_element_count: args.max_element_count,
        ..Default::default()
    };
    let mut stdout = std::io::stdout().lock();
    let result = demo::run(&args.device, &args.module, &mut stdout, &options);
    let _ = stdout.flush();
    drop(stdout);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(status) => {
            let code = status.code().exit_code();
            let _ = status.fprint(&mut std::io::stderr());
            status.ignore();
            ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
        }
    }
}
