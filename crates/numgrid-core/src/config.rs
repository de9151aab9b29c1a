//! Sheet configuration.
//!
//! Loaded from TOML; every field is optional and falls back to its default:
//!
//! ```toml
//! initial_rows = 52
//! initial_columns = 52
//! max_columns = 18278
//! history_capacity = 5
//! thousands_separator = true
//! decimal_places = 8
//! ```

use numgrid_engine::engine::FormatOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// One past the last three-letter column ("ZZZ").
pub const DEFAULT_MAX_COLUMNS: usize = 18_278;

/// Number of whole-sheet states kept for undo/redo.
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub initial_rows: usize,
    pub initial_columns: usize,
    pub max_columns: usize,
    pub history_capacity: usize,
    pub thousands_separator: bool,
    pub decimal_places: usize,
}

impl Default for SheetConfig {
    fn default() -> Self {
        SheetConfig {
            initial_rows: 52,
            initial_columns: 52,
            max_columns: DEFAULT_MAX_COLUMNS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            thousands_separator: true,
            decimal_places: 8,
        }
    }
}

impl SheetConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: SheetConfig = toml::from_str(text)?;
        config.history_capacity = config.history_capacity.max(1);
        config.initial_columns = config.initial_columns.min(config.max_columns);
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            thousands_separator: self.thousands_separator,
            decimal_places: self.decimal_places,
        }
    }
}
