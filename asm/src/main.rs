#[macro_use]
extern crate clap;

use clap::Arg;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
enum Error {
    #[error("reading {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("assembling {path}: {source}")]
    Assemble { path: PathBuf, source: asm::Error },
    #[error("writing {path}: {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let matches = app_from_crate!()
        .arg(
            Arg::with_name("INPUT")
                .help("Assembly source file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("OUTPUT")
                .help("HEX file to write (defaults to INPUT with a .hex extension)"),
        )
        .arg(
            Arg::with_name("data_base")
                .long("data-base")
                .takes_value(true)
                .value_name("ADDR")
                .help("Base address for the .data layout pass (default 0xAD)"),
        )
        .get_matches();

    let input = matches.value_of("INPUT").unwrap();
    let output = matches.value_of("output");
    let data_base = matches.value_of("data_base");

    if let Err(err) = run(input, output, data_base) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn parse_data_base(token: &str) -> u16 {
    token
        .strip_prefix("0x")
        .and_then(|hex| u16::from_str_radix(hex, 16).ok())
        .or_else(|| token.parse().ok())
        .unwrap_or(vcpu16::constants::DEFAULT_DATA_BASE)
}

fn run(input: &str, output: Option<&str>, data_base: Option<&str>) -> Result<(), Error> {
    let input_path = Path::new(input);

    let source = fs::read_to_string(input_path).map_err(|source| Error::ReadInput {
        path: input_path.to_owned(),
        source,
    })?;

    let program = match data_base {
        Some(token) => asm::assemble_addressed(&source, parse_data_base(token)),
        None => asm::assemble(&source),
    }
    .map_err(|source| Error::Assemble {
        path: input_path.to_owned(),
        source,
    })?;

    let output_path: PathBuf = output
        .map(PathBuf::from)
        .unwrap_or_else(|| input_path.with_extension("hex"));

    hexfile::write_file(&output_path, &program).map_err(|source| Error::WriteOutput {
        path: output_path.clone(),
        source,
    })?;

    Ok(())
}
