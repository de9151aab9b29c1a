//! Error types for the numgrid command runner

use thiserror::Error;

/// Errors raised while reading commands
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, CommandError>;
