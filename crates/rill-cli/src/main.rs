//! The `rill` binary: run a script, or start the interactive prompt.

mod repl;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rill_runtime::{InterpretError, Vm};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Exit code for a compile error, after BSD sysexits.
const EX_DATAERR: u8 = 65;
/// Exit code for a runtime error.
const EX_SOFTWARE: u8 = 70;
/// Exit code for an unreadable input file.
const EX_IOERR: u8 = 74;

#[derive(Parser)]
#[command(name = "rill", version, about = "The Rill programming language")]
struct Cli {
    /// Script to run; starts the interactive prompt when omitted.
    script: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.script {
        Some(path) => run_file(&path),
        None => repl::run(),
    }
}

fn run_file(path: &Path) -> ExitCode {
    let source = match read_source(path) {
        Ok(source) => source,
        Err(error) => {
            print_error(&format!("{error:#}"));
            return ExitCode::from(EX_IOERR);
        }
    };

    let mut vm = Vm::new();
    match vm.interpret(&source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(InterpretError::Compile(diagnostics)) => {
            for diagnostic in &diagnostics {
                print_error(&diagnostic.to_string());
            }
            ExitCode::from(EX_DATAERR)
        }
        // The VM already printed the message and stack trace.
        Err(InterpretError::Runtime(_)) => ExitCode::from(EX_SOFTWARE),
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("could not read script \"{}\"", path.display()))
}

pub(crate) fn print_error(message: &str) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
    let _ = writeln!(&mut stderr, "{message}");
    let _ = stderr.reset();
}
