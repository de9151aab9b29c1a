//! Document state and logic (UI-agnostic).

mod history;
mod io;
mod ops;
mod state;
mod structure;

pub use history::{History, SheetSnapshot};
pub use state::{CellStyle, Document, EditIntent};
pub use structure::MoveReport;
