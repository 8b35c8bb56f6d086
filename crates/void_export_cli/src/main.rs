//! void-export
//!
//! Exports a selection of objects, or a whole scene, from one document into
//! another.
//!
//! ```text
//! void-export -f props.json -d level.json -O Crate Barrel -D true
//! void-export --config export.toml -o APPEND_LINK
//! void-export rename --file level.json -i Crate -x Chest
//! ```
//!
//! Logs go to stderr at `warn` by default, `debug` with `-P true` or
//! `VOID_EXPORT_DEBUG=1`. `RUST_LOG` overrides both.

mod args;

use std::process::ExitCode;

use clap::Parser;
use void_export::{rename_in_file, ExportCommand, ExportOptions, ExportReport};

use crate::args::{debug_from_env, Cli, Command, ExportArgs, RenameArgs};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Rename(args)) => run_rename(&args),
        Some(Command::Export(args)) => run_export(&args),
        None => run_export(&cli.export),
    }
}

fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn run_export(args: &ExportArgs) -> ExitCode {
    let options = args.resolve();
    let debug = debug_from_env()
        || options
            .as_ref()
            .map(|o: &ExportOptions| o.print_debug)
            .unwrap_or(false);
    init_logging(debug);

    let outcome = options
        .and_then(ExportCommand::new)
        .and_then(ExportCommand::run);
    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("void-export: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = print_report(&report, args.report_json) {
        log::error!("Cannot print report: {}", e);
    }
    if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_report(report: &ExportReport, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn run_rename(args: &RenameArgs) -> ExitCode {
    init_logging(args.print_debug.unwrap_or(false) || debug_from_env());

    let pairs = match args.pairs() {
        Ok(pairs) => pairs,
        Err(message) => {
            log::error!("Configuration error: {}", message);
            eprintln!("void-export: Configuration error: {}", message);
            return ExitCode::FAILURE;
        }
    };

    match rename_in_file(&args.file, &pairs) {
        Ok(report) => {
            for (old, new) in &report.renamed {
                println!("{} -> {}", old, new);
            }
            for name in &report.skipped {
                println!("{} not found", name);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("void-export: {}", e);
            ExitCode::FAILURE
        }
    }
}
