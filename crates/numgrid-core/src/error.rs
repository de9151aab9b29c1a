//! Error types for Numgrid core.

use thiserror::Error;

use numgrid_engine::engine::{Address, EvalError, GraphError};

/// Errors that can occur while editing a document
#[derive(Error, Debug)]
pub enum NumgridError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Formula at {address} creates a circular reference")]
    CircularReference { address: Address },

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Address out of range: row {row}, column {column}")]
    AddressOutOfRange { row: isize, column: isize },

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl From<GraphError> for NumgridError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::CircularReference { address } => {
                NumgridError::CircularReference { address }
            }
        }
    }
}

impl From<EvalError> for NumgridError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Reference(e) => NumgridError::InvalidReference(e.to_string()),
            other => NumgridError::Evaluation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, NumgridError>;
