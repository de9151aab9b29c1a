//! numgrid-core - UI-agnostic document model, structural edits and history.

pub mod config;
pub mod document;
pub mod error;

pub use config::SheetConfig;
pub use document::{CellStyle, Document, EditIntent, History, MoveReport, SheetSnapshot};
pub use error::{NumgridError, Result};

pub use numgrid_engine::engine::{Address, Formula, Range, Value};
