//! Interactive prompt.
//!
//! One VM lives for the whole session, so variables and functions defined on
//! earlier lines stay available. Errors print and the prompt continues.

use std::path::PathBuf;
use std::process::ExitCode;

use rill_runtime::{InterpretError, Vm};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::print_error;

pub fn run() -> ExitCode {
    let mut vm = Vm::new();
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(error) => {
            print_error(&format!("could not start line editor: {error}"));
            return ExitCode::FAILURE;
        }
    };

    let history = history_path();
    if let Some(history) = &history {
        let _ = editor.load_history(history);
    }

    println!("rill {}", rill_runtime::VERSION);
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                match vm.interpret(&line) {
                    Ok(()) => {}
                    Err(InterpretError::Compile(diagnostics)) => {
                        for diagnostic in &diagnostics {
                            print_error(&diagnostic.to_string());
                        }
                    }
                    // Message and trace already went to stderr.
                    Err(InterpretError::Runtime(_)) => {}
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(error) => {
                print_error(&format!("input error: {error}"));
                break;
            }
        }
    }

    if let Some(history) = &history {
        if let Some(parent) = history.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.save_history(history);
    }
    ExitCode::SUCCESS
}

fn history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("rill").join("history.txt"))
}
