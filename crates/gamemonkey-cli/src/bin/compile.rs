//! Compiles a source script into a `gml0` binary library, the Rust
//! equivalent of the original toolchain's standalone `compile` utility.

use clap::Parser;
use gm_io::Endian;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// GameMonkey source code compiler.
#[derive(Parser, Debug)]
#[command(name = "gm-compile", version, about = "Compiles a .gm source file into a gml0 library")]
struct Args {
    /// Encode the output library big-endian (matches the console toolchain's `-g` flag).
    #[arg(short = 'g', long = "big-endian")]
    big_endian: bool,

    /// Source file to compile.
    input: PathBuf,

    /// Path the compiled library is written to.
    output: PathBuf,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("could not read input file {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("could not write output file {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("could not compile source:\n{}", .0.iter().map(|e| format!("  {e}")).collect::<Vec<_>>().join("\n"))]
    Compile(Vec<gm_frontend::CompileError>),
}

fn run(args: &Args) -> Result<(), CliError> {
    let source = fs::read_to_string(&args.input).map_err(|e| CliError::Read(args.input.clone(), e))?;
    let endian = if args.big_endian { Endian::Big } else { Endian::Little };

    let lib = gm_frontend::compile(&source, endian).map_err(CliError::Compile)?;
    let bytes = gm_format::encode(&lib, endian);

    fs::write(&args.output, &bytes).map_err(|e| CliError::Write(args.output.clone(), e))?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    println!("GameMonkey source code compiler\n");

    match run(&args) {
        Ok(()) => {
            println!("Done.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err}");
            println!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
