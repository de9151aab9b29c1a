use numgrid_engine::engine::{
    Address, Formula, Outcome, Range, RecalcReport, Value, evaluate_source,
    extract_references, format_value, input_addresses, recalculate, write_cell,
};
use std::collections::BTreeSet;

use super::Document;
use super::state::{CellStyle, EditIntent};
use crate::error::{NumgridError, Result};

impl Document {
    /// Set a cell from user input. Text starting with `=` is committed as a
    /// formula; anything else is a direct edit.
    pub fn set_cell_from_input(&mut self, address: Address, input: &str) -> Result<()> {
        if let Some(source) = input.trim_start().strip_prefix('=') {
            return self.commit_formula(source, address);
        }
        self.check_bounds(&address)?;

        let mut pending = BTreeSet::new();
        self.write_value(address, Value::from_input(input), EditIntent::DirectEdit, &mut pending);
        self.extend_to(&address);
        self.recalculate_pending(&pending);
        self.record_edit();
        Ok(())
    }

    /// Clear a cell's value and any formula covering it.
    pub fn erase_cell(&mut self, address: Address) -> Result<()> {
        self.set_cell_from_input(address, "")
    }

    /// Evaluate `source` once and, if it succeeds and closes no cycle, install
    /// it as a formula anchored at `address`. Inputs come from the reference
    /// tokens in `source`; the domain takes the shape of the first result.
    /// On error the sheet is untouched.
    pub fn commit_formula(&mut self, source: &str, address: Address) -> Result<()> {
        let source = source.trim();
        let source = source.strip_prefix('=').unwrap_or(source).trim();
        self.check_bounds(&address)?;

        let references = extract_references(source)
            .map_err(|e| NumgridError::InvalidReference(e.to_string()))?;
        let inputs = input_addresses(&references);
        if inputs.contains(&address) {
            log::warn!("formula at {} reads its own cell", address);
            return Err(NumgridError::CircularReference { address });
        }

        let outcome = evaluate_source(source, &self.grid, self.evaluator.as_ref())?;
        let (rows, columns) = outcome.shape();
        let domain = Range::with_shape(address, rows, columns).ok_or(
            NumgridError::AddressOutOfRange {
                row: address.row.saturating_add(rows) as isize,
                column: address.col.saturating_add(columns) as isize,
            },
        )?;
        self.install_formula(source, domain, inputs, &outcome)
    }

    /// Commit a formula whose domain and inputs the caller has already
    /// resolved. The result is clipped to `domain`.
    pub fn commit_formula_with(
        &mut self,
        source: &str,
        domain: Range,
        inputs: BTreeSet<Address>,
    ) -> Result<()> {
        let source = source.trim();
        let source = source.strip_prefix('=').unwrap_or(source).trim();
        self.check_bounds(&domain.top_left)?;

        let references = extract_references(source)
            .map_err(|e| NumgridError::InvalidReference(e.to_string()))?;
        let undeclared: Vec<String> = input_addresses(&references)
            .difference(&inputs)
            .map(Address::to_string)
            .collect();
        if !undeclared.is_empty() {
            return Err(NumgridError::InvalidReference(format!(
                "formula at {} reads undeclared input(s) {}",
                domain.top_left,
                undeclared.join(", ")
            )));
        }
        if let Some(address) = inputs.iter().find(|a| domain.contains(a)) {
            log::warn!("formula at {} reads {} inside its own domain", domain.top_left, address);
            return Err(NumgridError::CircularReference {
                address: domain.top_left,
            });
        }

        let outcome = evaluate_source(source, &self.grid, self.evaluator.as_ref())?;
        self.install_formula(source, domain, inputs, &outcome)
    }

    fn install_formula(
        &mut self,
        source: &str,
        domain: Range,
        inputs: BTreeSet<Address>,
        outcome: &Outcome,
    ) -> Result<()> {
        self.check_bounds(&domain.bottom_right)?;
        let address = domain.top_left;

        let formula = Formula::new(source, domain, inputs)?;
        let displaced = self.graph.insert(formula)?;
        for old in &displaced {
            log::debug!("formula at {} replaced by {}", old.address(), address);
        }

        let mut pending = BTreeSet::new();
        for cell in domain.cells() {
            let value = outcome.value_at(cell.row - address.row, cell.col - address.col);
            self.write_value(cell, value, EditIntent::StructuralRecompute, &mut pending);
        }
        pending.remove(&address);
        self.extend_to(&domain.bottom_right);
        self.recalculate_pending(&pending);
        self.record_edit();
        Ok(())
    }

    /// The formula anchored at `address`, or the one whose domain covers it.
    pub fn get_formula(&self, address: &Address) -> Option<&Formula> {
        self.graph
            .formula_at(address)
            .or_else(|| self.graph.covering(address))
    }

    /// Formula text as the user would type it, only for the anchor cell.
    pub fn formula_text(&self, address: &Address) -> Option<String> {
        self.graph
            .formula_at(address)
            .map(|f| format!("={}", f.source()))
    }

    /// Every formula as `(anchor, source)`, row-major.
    pub fn formulas(&self) -> Vec<(Address, String)> {
        self.graph
            .iter()
            .map(|f| (f.address(), f.source().to_string()))
            .collect()
    }

    /// Formatted value for display.
    pub fn display(&self, address: &Address) -> String {
        format_value(&self.value(address), &self.config.format_options())
    }

    /// Re-evaluate every formula in dependency order.
    pub fn recalculate_all(&mut self) -> RecalcReport {
        let all: BTreeSet<Address> = self.graph.addresses().collect();
        self.recalculate_pending(&all)
    }

    pub fn set_style(&mut self, address: Address, style: CellStyle) -> Result<()> {
        self.check_bounds(&address)?;
        if style.is_default() {
            self.styles.remove(&address);
        } else {
            self.styles.insert(address, style);
        }
        self.extend_to(&address);
        self.record_edit();
        Ok(())
    }

    /// Write one cell and queue the formulas that read it.
    ///
    /// The caller is expected to have checked bounds and to run
    /// [`Document::recalculate_pending`] once all writes of the edit are done.
    pub(crate) fn write_value(
        &mut self,
        address: Address,
        value: Value,
        intent: EditIntent,
        pending: &mut BTreeSet<Address>,
    ) {
        if intent != EditIntent::StructuralRecompute {
            let covering = self.graph.covering(&address).map(Formula::address);
            if let Some(key) = covering {
                self.graph.remove(&key);
                pending.remove(&key);
                log::debug!("formula at {} removed by write to {}", key, address);
            }
        }
        pending.extend(self.graph.formulas_depending_on(&address));
        write_cell(&self.grid, address, value);
    }

    pub(crate) fn recalculate_pending(&mut self, pending: &BTreeSet<Address>) -> RecalcReport {
        if pending.is_empty() {
            return RecalcReport::default();
        }
        recalculate(&mut self.graph, &self.grid, self.evaluator.as_ref(), pending)
    }

    /// Columns are capped by configuration; rows are not.
    pub(crate) fn check_bounds(&self, address: &Address) -> Result<()> {
        if address.col >= self.config.max_columns {
            return Err(NumgridError::AddressOutOfRange {
                row: address.row as isize,
                column: address.col as isize,
            });
        }
        Ok(())
    }

    /// Grow the sheet extent so it contains `address`.
    pub(crate) fn extend_to(&mut self, address: &Address) {
        self.rows = self.rows.max(address.row.saturating_add(1));
        self.columns = self.columns.max(address.col.saturating_add(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use numgrid_engine::engine::CellError;

    fn addr(name: &str) -> Address {
        Address::parse(name).unwrap()
    }

    #[test]
    fn test_plain_edit_and_display() {
        let mut doc = Document::new();
        doc.set_cell_from_input(addr("A1"), "1234.5").unwrap();
        doc.set_cell_from_input(addr("A2"), "hello").unwrap();
        assert_eq!(doc.display(&addr("A1")), "1,234.50000000");
        assert_eq!(doc.display(&addr("A2")), "hello");
        assert_eq!(doc.display(&addr("A3")), "");
        assert!(doc.modified);
    }

    #[test]
    fn test_formula_recalculates_on_input_change() {
        let mut doc = Document::new();
        doc.set_cell_from_input(addr("A1"), "2").unwrap();
        doc.set_cell_from_input(addr("B1"), "=A1*10").unwrap();
        assert_eq!(doc.value(&addr("B1")), Value::real(20.0));

        doc.set_cell_from_input(addr("A1"), "3").unwrap();
        assert_eq!(doc.value(&addr("B1")), Value::real(30.0));
        assert_eq!(doc.formula_text(&addr("B1")).as_deref(), Some("=A1*10"));
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let mut doc = Document::new();
        let err = doc.set_cell_from_input(addr("A1"), "=A1+1").unwrap_err();
        assert!(matches!(err, NumgridError::CircularReference { .. }));
        assert!(doc.graph().is_empty());
        assert!(!doc.history().can_undo());
    }

    #[test]
    fn test_failed_commit_leaves_sheet_untouched() {
        let mut doc = Document::new();
        doc.set_cell_from_input(addr("B1"), "7").unwrap();
        let before = doc.snapshot();
        assert!(doc.set_cell_from_input(addr("B1"), "=1 +* 2").is_err());
        assert_eq!(doc.snapshot(), before);
    }

    #[test]
    fn test_matrix_formula_claims_its_domain() {
        let mut doc = Document::new();
        for (name, v) in [("A1", "1"), ("A2", "2"), ("A3", "3")] {
            doc.set_cell_from_input(addr(name), v).unwrap();
        }
        doc.set_cell_from_input(addr("B1"), "=[A1:A3]*2").unwrap();
        assert_eq!(doc.value(&addr("B3")), Value::real(6.0));
        assert_eq!(doc.get_formula(&addr("B2")).map(|f| f.address()), Some(addr("B1")));
        assert!(doc.formula_text(&addr("B2")).is_none());
    }

    #[test]
    fn test_direct_edit_removes_covering_formula() {
        let mut doc = Document::new();
        doc.set_cell_from_input(addr("A1"), "1").unwrap();
        doc.set_cell_from_input(addr("B1"), "=A1+1").unwrap();
        doc.set_cell_from_input(addr("B1"), "5").unwrap();
        assert!(doc.get_formula(&addr("B1")).is_none());

        doc.set_cell_from_input(addr("A1"), "100").unwrap();
        assert_eq!(doc.value(&addr("B1")), Value::real(5.0));
    }

    #[test]
    fn test_error_input_propagates_ref_marker() {
        let mut doc = Document::new();
        doc.set_cell_from_input(addr("A1"), "1").unwrap();
        doc.set_cell_from_input(addr("B1"), "=A1*2").unwrap();
        doc.set_cell_from_input(addr("C1"), "=B1+1").unwrap();

        doc.set_cell_from_input(addr("A1"), "text").unwrap();
        assert_eq!(doc.value(&addr("B1")), Value::Error(CellError::Value));
        assert_eq!(doc.value(&addr("C1")), Value::Error(CellError::Ref));
        assert_eq!(doc.display(&addr("C1")), "#REF!");
    }

    #[test]
    fn test_commit_with_caller_domain_clips_result() {
        let mut doc = Document::new();
        doc.set_cell_from_input(addr("A1"), "1").unwrap();
        doc.set_cell_from_input(addr("A2"), "2").unwrap();
        let inputs = BTreeSet::from([addr("A1"), addr("A2")]);
        doc.commit_formula_with("=[A1:A2]+1", Range::single(addr("C1")), inputs.clone())
            .unwrap();
        assert_eq!(doc.value(&addr("C1")), Value::real(2.0));
        assert_eq!(doc.value(&addr("C2")), Value::Empty);

        let err = doc
            .commit_formula_with("A1", Range::parse("A1:A3").unwrap(), inputs)
            .unwrap_err();
        assert!(matches!(err, NumgridError::CircularReference { .. }));
    }

    #[test]
    fn test_commit_with_rejects_undeclared_inputs() {
        let mut doc = Document::new();
        doc.set_cell_from_input(addr("B1"), "1").unwrap();
        let before = doc.snapshot();

        let err = doc
            .commit_formula_with("B1+1", Range::single(addr("C1")), BTreeSet::new())
            .unwrap_err();
        assert!(matches!(err, NumgridError::InvalidReference(_)));
        assert_eq!(doc.snapshot(), before);

        doc.commit_formula_with(
            "B1+1",
            Range::single(addr("C1")),
            BTreeSet::from([addr("B1")]),
        )
        .unwrap();
        doc.set_cell_from_input(addr("B1"), "100").unwrap();
        assert_eq!(doc.value(&addr("C1")), Value::real(101.0));
    }

    #[test]
    fn test_column_cap_is_enforced() {
        let mut doc = Document::new();
        let far = Address::new(0, doc.config().max_columns);
        let err = doc.set_cell_from_input(far, "1").unwrap_err();
        assert!(matches!(err, NumgridError::AddressOutOfRange { .. }));
    }

    #[test]
    fn test_matrix_past_the_last_row_is_rejected() {
        let mut doc = Document::new();
        let anchor = Address::parse("A18446744073709551615").unwrap();
        let err = doc.set_cell_from_input(anchor, "=[A1:A3]").unwrap_err();
        assert!(matches!(err, NumgridError::AddressOutOfRange { .. }));
        assert!(doc.graph().is_empty());
    }

    #[test]
    fn test_edits_grow_the_extent() {
        let mut doc = Document::new();
        doc.set_cell_from_input(Address::new(99, 60), "1").unwrap();
        assert_eq!(doc.extent(), (100, 61));
    }

    #[test]
    fn test_styles_do_not_touch_values() {
        let mut doc = Document::new();
        doc.set_cell_from_input(addr("A1"), "1").unwrap();
        let style = CellStyle {
            background: Some("yellow".into()),
            ..CellStyle::default()
        };
        doc.set_style(addr("A1"), style.clone()).unwrap();
        assert_eq!(doc.style(&addr("A1")), style);
        assert_eq!(doc.value(&addr("A1")), Value::real(1.0));
    }
}
