//! Moving and copying rectangular regions.
//!
//! A move carries values and the formulas anchored inside the source region.
//! Formula inputs are never rewritten; a moved formula whose new domain would
//! overlap its own inputs (or close a cycle) loses its formula and lands as a
//! plain value. A copy carries values only.

use numgrid_engine::engine::{Address, Formula, Range, Value};
use std::collections::BTreeSet;

use super::Document;
use super::state::EditIntent;
use crate::error::{NumgridError, Result};

/// What a structural edit did to the formulas it touched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MoveReport {
    /// Formula anchors, `(old, new)`.
    pub moved: Vec<(Address, Address)>,
    /// Old anchors of moved formulas that were turned into plain values.
    pub demoted: Vec<Address>,
    /// Anchors of formulas destroyed because the destination overwrote them.
    pub displaced: Vec<Address>,
    /// Formulas re-evaluated afterwards, in evaluation order.
    pub recalculated: Vec<Address>,
}

impl Document {
    /// Move (or copy) `source` by `(d_row, d_col)`.
    pub fn move_region(
        &mut self,
        source: Range,
        d_row: isize,
        d_col: isize,
        is_copy: bool,
    ) -> Result<MoveReport> {
        let destination = source
            .translate(d_row, d_col)
            .ok_or(NumgridError::AddressOutOfRange {
                row: (source.top_left.row as isize).saturating_add(d_row),
                column: (source.top_left.col as isize).saturating_add(d_col),
            })?;
        self.check_bounds(&destination.bottom_right)?;
        if d_row == 0 && d_col == 0 {
            return Ok(MoveReport::default());
        }

        let values: Vec<Value> = source.cells().map(|cell| self.value(&cell)).collect();
        let mut report = MoveReport::default();
        let mut pending = BTreeSet::new();

        let mut carried: Vec<Formula> = Vec::new();
        if !is_copy {
            let anchors: Vec<Address> = self
                .graph
                .addresses()
                .filter(|a| source.contains(a))
                .collect();
            for anchor in anchors {
                if let Some(formula) = self.graph.remove(&anchor) {
                    pending.extend(formula.subsequent().iter().copied());
                    carried.push(formula);
                }
            }

            // Formulas left behind that cover a cleared cell are recomputed.
            for cell in source.cells() {
                if let Some(owner) = self.graph.covering(&cell).map(Formula::address) {
                    pending.insert(owner);
                }
                self.write_value(cell, Value::Empty, EditIntent::StructuralRecompute, &mut pending);
            }
        }

        for key in self.graph.overlapping(&destination) {
            if self.graph.remove(&key).is_some() {
                pending.remove(&key);
                report.displaced.push(key);
            }
        }

        let mut landed: BTreeSet<Address> = BTreeSet::new();
        for formula in carried {
            let old = formula.address();
            match self.relocate(&formula, d_row, d_col) {
                Ok((new, displaced)) => {
                    for key in displaced {
                        pending.remove(&key);
                        report.displaced.push(key);
                    }
                    landed.insert(new);
                    report.moved.push((old, new));
                }
                Err(err) => {
                    log::warn!("formula moved from {} kept as a value: {}", old, err);
                    report.demoted.push(old);
                }
            }
        }

        for (cell, value) in destination.cells().zip(values) {
            let intent = match self.graph.covering(&cell) {
                Some(owner) if landed.contains(&owner.address()) => EditIntent::StructuralRecompute,
                _ => EditIntent::StructuralErase,
            };
            self.write_value(cell, value, intent, &mut pending);
        }

        // Landed formulas may read cells this edit just cleared or filled,
        // and their domains may reach past the destination.
        for key in &landed {
            if let Some(corner) = self.graph.formula_at(key).map(|f| f.domain().bottom_right) {
                self.extend_to(&corner);
            }
            pending.insert(*key);
        }

        self.extend_to(&destination.bottom_right);
        let recalc = self.recalculate_pending(&pending);
        report.recalculated = recalc.order;
        log::debug!(
            "{} {} by ({}, {}): {} moved, {} demoted, {} displaced",
            if is_copy { "copied" } else { "moved" },
            source,
            d_row,
            d_col,
            report.moved.len(),
            report.demoted.len(),
            report.displaced.len()
        );
        self.record_edit();
        Ok(report)
    }

    /// Reinsert a carried formula at its translated domain. Returns the new
    /// anchor and the anchors of formulas it displaced.
    fn relocate(
        &mut self,
        formula: &Formula,
        d_row: isize,
        d_col: isize,
    ) -> Result<(Address, Vec<Address>)> {
        let moved = formula
            .translated(d_row, d_col)
            .ok_or(NumgridError::AddressOutOfRange {
                row: (formula.address().row as isize).saturating_add(d_row),
                column: (formula.address().col as isize).saturating_add(d_col),
            })??;
        self.check_bounds(&moved.domain().bottom_right)?;
        let anchor = moved.address();
        let displaced = self.graph.insert(moved)?;
        Ok((anchor, displaced.iter().map(Formula::address).collect()))
    }
}
