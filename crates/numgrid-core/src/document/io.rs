use std::path::Path;

use super::Document;
use super::history::SheetSnapshot;
use crate::config::SheetConfig;
use crate::error::Result;

impl Document {
    /// Serialize the live sheet. Formula adjacency is written as
    /// `(row, column)` pairs.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Replace the live sheet with a serialized one. History restarts from
    /// the loaded state. Nothing is re-evaluated.
    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let snapshot: SheetSnapshot = serde_json::from_str(json)?;
        self.restore(&snapshot)?;
        self.history.reset(snapshot);
        self.modified = false;
        log::info!(
            "loaded {} value(s) and {} formula(s)",
            self.grid.len(),
            self.graph.len()
        );
        Ok(())
    }

    pub fn from_json(json: &str, config: SheetConfig) -> Result<Self> {
        let mut doc = Document::with_config(config);
        doc.load_json(json)?;
        Ok(doc)
    }

    pub fn save_file(&mut self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        self.modified = false;
        Ok(())
    }

    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let json = std::fs::read_to_string(path)?;
        self.load_json(&json)
    }
}
