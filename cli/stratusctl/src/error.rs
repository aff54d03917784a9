//! Error handling and display for the CLI.

use colored::Colorize;
use stratus_engine::EngineError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read stack file {path}: {source}")]
    ReadStack {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid --set argument '{0}': expected key=value")]
    BadSetArg(String),

    /// One or more nodes ended failed, skipped, or interrupted.
    #[error("run finished with {failed} failed, {skipped} skipped, {interrupted} interrupted")]
    RunFailed {
        failed: usize,
        skipped: usize,
        interrupted: usize,
    },
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    // Provide hints for the common declaration mistakes
    if let Some(engine_err) = err.downcast_ref::<EngineError>() {
        match engine_err {
            EngineError::Graph(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: check `depends_on` lists and `${resource.output}` references in the stack file."
                        .yellow()
                );
            }
            EngineError::UnknownKind(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: run `stratus kinds` to list the available resource kinds.".yellow()
                );
            }
            EngineError::StateCorruption(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: the state file is damaged; pass --state-path to start from a fresh one."
                        .yellow()
                );
            }
            _ => {}
        }
    }
}
