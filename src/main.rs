use std::fs;
use std::process::ExitCode;

use kore::{Interpreter, logging};

fn main() -> ExitCode {
    logging::init_tracing();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("Usage: kore <script.kore>");
        return ExitCode::from(2);
    };

    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Cannot read '{}': {}", path, err);
            return ExitCode::FAILURE;
        }
    };

    let mut interpreter = Interpreter::new();
    match kore::run(&source, &mut interpreter) {
        Ok(result) => {
            tracing::debug!(result = ?result.as_deref(), "program finished");
            ExitCode::SUCCESS
        }
        Err(err) => {
            err.pretty_print(&path, &source);
            ExitCode::FAILURE
        }
    }
}
