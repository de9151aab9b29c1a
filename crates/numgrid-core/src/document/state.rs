use numgrid_engine::engine::{
    Address, DependencyGraph, Evaluator, Grid, RhaiEvaluator, Value, read_cell,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::history::History;
use crate::config::SheetConfig;

/// Why a cell is being written. Decides what happens to the formula covering it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditIntent {
    /// The user typed a plain value; the covering formula is removed.
    DirectEdit,
    /// A move or copy is overwriting the cell; the covering formula is removed.
    StructuralErase,
    /// A formula result (or a moved formula's value); links are kept.
    StructuralRecompute,
}

/// Presentation attributes carried per cell. Never read by evaluation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellStyle {
    pub alignment: Option<String>,
    pub font: Option<String>,
    pub foreground: Option<String>,
    pub background: Option<String>,
}

impl CellStyle {
    pub fn is_default(&self) -> bool {
        *self == CellStyle::default()
    }
}

/// UI-agnostic document state for the spreadsheet.
pub struct Document {
    /// Cell values, including formula results
    pub(crate) grid: Grid,
    /// Formula arena and dependency links
    pub(crate) graph: DependencyGraph,
    pub(crate) styles: BTreeMap<Address, CellStyle>,
    pub(crate) evaluator: Box<dyn Evaluator>,
    pub(crate) history: History,
    pub(crate) config: SheetConfig,
    pub(crate) rows: usize,
    pub(crate) columns: usize,
    /// Whether the document has been edited since it was created or loaded
    pub modified: bool,
}

impl Document {
    /// Empty document with the default configuration and Rhai evaluator.
    pub fn new() -> Self {
        Self::with_config(SheetConfig::default())
    }

    pub fn with_config(config: SheetConfig) -> Self {
        Self::with_evaluator(config, Box::new(RhaiEvaluator::new()))
    }

    /// Create a document using a caller-supplied evaluator.
    pub fn with_evaluator(config: SheetConfig, evaluator: Box<dyn Evaluator>) -> Self {
        let mut doc = Document {
            grid: Grid::new(),
            graph: DependencyGraph::new(),
            styles: BTreeMap::new(),
            evaluator,
            history: History::new(config.history_capacity),
            rows: config.initial_rows,
            columns: config.initial_columns.min(config.max_columns),
            config,
            modified: false,
        };
        let initial = doc.snapshot();
        doc.history.reset(initial);
        doc
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Current sheet extent as `(rows, columns)`.
    pub fn extent(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    pub fn value(&self, address: &Address) -> Value {
        read_cell(&self.grid, address)
    }

    /// Non-empty cells in row-major order.
    pub fn values(&self) -> BTreeMap<Address, Value> {
        self.grid
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn style(&self, address: &Address) -> CellStyle {
        self.styles.get(address).cloned().unwrap_or_default()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
