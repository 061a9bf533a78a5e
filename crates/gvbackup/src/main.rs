#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use gvbackup::cli::app::Cli;
use gvbackup::cli::commands;
use gvbackup::config::ConversionPaths;
use gvbackup::{IntegrityError, PreconditionError};
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_VALIDATION_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

const DEFAULT_LOG_FILTER: &str = "warn";

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_tracing();
    println!("gvbackup: starting `convert`");

    match execute(&cli) {
        Ok(()) => {
            println!("gvbackup: completed `convert` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("gvbackup: failed `convert` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let paths = resolve_conversion_paths(cli)?;
    commands::convert::run(&cli.convert, &paths)
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<IntegrityError>().is_some()
        || error.downcast_ref::<PreconditionError>().is_some()
    {
        EXIT_VALIDATION_FAILURE
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn resolve_conversion_paths(cli: &Cli) -> Result<ConversionPaths> {
    let cwd = std::env::current_dir()?;
    gvbackup::config::resolve_conversion_paths(&cli.convert.in_dir, &cli.convert.out_path, &cwd)
}
