//! Pulls the embedded source text back out of a `gml0` library, the Rust
//! equivalent of the original toolchain's standalone `extract` utility.

use clap::Parser;
use gm_runtime::{GmConfig, Machine};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// GameMonkey source code extractor.
#[derive(Parser, Debug)]
#[command(name = "gm-extract", version, about = "Extracts the embedded source text from a gml0 library")]
struct Args {
    /// Compiled library to read.
    input: PathBuf,

    /// Path the recovered source text is written to.
    output: PathBuf,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("could not read input file {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("could not write output file {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("could not parse input file: {0}")]
    Load(#[from] gm_format::FormatError),
    #[error("no source code was found in input file")]
    NoSource,
}

fn run(args: &Args) -> Result<(), CliError> {
    let bytes = fs::read(&args.input).map_err(|e| CliError::Read(args.input.clone(), e))?;

    let mut machine = Machine::new(GmConfig::default());
    let filename = args.input.file_name().and_then(|n| n.to_str());
    machine.load_lib(&bytes, filename)?;

    let (_, text) = machine.get_source(0).ok_or(CliError::NoSource)?;
    fs::write(&args.output, text).map_err(|e| CliError::Write(args.output.clone(), e))?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    println!("GameMonkey source code extractor\n");

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
