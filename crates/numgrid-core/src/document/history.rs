//! Whole-sheet snapshots for undo/redo.
//!
//! The ring holds at most `capacity` states. The cursor points at the state
//! matching the live document; recording after an undo drops every state
//! ahead of the cursor.

use numgrid_engine::engine::{Address, DependencyGraph, PersistedFormula, Value, write_cell};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::Document;
use super::state::CellStyle;
use crate::error::{NumgridError, Result};

/// Everything needed to restore a sheet: values, formulas, styles and extent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetSnapshot {
    pub rows: usize,
    pub columns: usize,
    pub values: Vec<(Address, Value)>,
    pub formulas: Vec<PersistedFormula>,
    #[serde(default)]
    pub styles: Vec<(Address, CellStyle)>,
}

#[derive(Clone, Debug)]
pub struct History {
    entries: VecDeque<SheetSnapshot>,
    cursor: usize,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        History {
            entries: VecDeque::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Forget everything and start over from `initial`.
    pub fn reset(&mut self, initial: SheetSnapshot) {
        self.entries.clear();
        self.entries.push_back(initial);
        self.cursor = 0;
    }

    pub fn record(&mut self, snapshot: SheetSnapshot) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    pub fn undo(&mut self) -> Option<&SheetSnapshot> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    pub fn redo(&mut self) -> Option<&SheetSnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Document {
    /// Capture the live sheet.
    pub fn snapshot(&self) -> SheetSnapshot {
        SheetSnapshot {
            rows: self.rows,
            columns: self.columns,
            values: self.values().into_iter().collect(),
            formulas: self.graph.to_persisted(),
            styles: self
                .styles
                .iter()
                .map(|(address, style)| (*address, style.clone()))
                .collect(),
        }
    }

    /// Replace the live sheet with `snapshot`. Values are restored verbatim;
    /// nothing is re-evaluated.
    pub(crate) fn restore(&mut self, snapshot: &SheetSnapshot) -> Result<()> {
        let graph = DependencyGraph::from_persisted(&snapshot.formulas)?;
        self.grid.clear();
        for (address, value) in &snapshot.values {
            write_cell(&self.grid, *address, value.clone());
        }
        self.graph = graph;
        self.styles = snapshot
            .styles
            .iter()
            .filter(|(_, style)| !style.is_default())
            .cloned()
            .collect();
        self.rows = snapshot.rows;
        self.columns = snapshot.columns;
        Ok(())
    }

    /// Record the live sheet as the newest history state.
    pub(crate) fn record_edit(&mut self) {
        let snapshot = self.snapshot();
        self.history.record(snapshot);
        self.modified = true;
    }

    pub fn undo(&mut self) -> Result<()> {
        let snapshot = self.history.undo().cloned().ok_or(NumgridError::NothingToUndo)?;
        self.restore(&snapshot)?;
        self.modified = true;
        log::debug!("undo to history state {}", self.history.cursor());
        Ok(())
    }

    pub fn redo(&mut self) -> Result<()> {
        let snapshot = self.history.redo().cloned().ok_or(NumgridError::NothingToRedo)?;
        self.restore(&snapshot)?;
        self.modified = true;
        log::debug!("redo to history state {}", self.history.cursor());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(rows: usize) -> SheetSnapshot {
        SheetSnapshot {
            rows,
            ..SheetSnapshot::default()
        }
    }

    #[test]
    fn test_undo_redo_walks_the_ring() {
        let mut history = History::new(5);
        history.reset(marker(0));
        history.record(marker(1));
        history.record(marker(2));

        assert_eq!(history.undo().map(|s| s.rows), Some(1));
        assert_eq!(history.undo().map(|s| s.rows), Some(0));
        assert!(history.undo().is_none());
        assert_eq!(history.redo().map(|s| s.rows), Some(1));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::new(5);
        history.reset(marker(0));
        for rows in 1..=5 {
            history.record(marker(rows));
        }
        assert_eq!(history.len(), 5);
        let mut oldest = None;
        while let Some(s) = history.undo() {
            oldest = Some(s.rows);
        }
        assert_eq!(oldest, Some(1));
    }

    #[test]
    fn test_record_after_undo_truncates_future() {
        let mut history = History::new(5);
        history.reset(marker(0));
        history.record(marker(1));
        history.record(marker(2));
        history.undo();
        history.record(marker(9));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
        assert_eq!(history.undo().map(|s| s.rows), Some(1));
    }
}
