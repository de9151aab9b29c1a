//! Recalculation scheduling.
//!
//! Given a dirty set, computes one execution order covering the set and every
//! formula downstream of it, then evaluates the batch to completion. The whole
//! order is fixed before any result is written.
//!
//! Error policy: a formula whose evaluation fails writes `#VALUE!` across its
//! domain; a formula reading an error marker writes `#REF!` without calling
//! the evaluator. Either way the rest of the batch continues.

use std::collections::BTreeSet;

use super::address::{Address, Range};
use super::eval::{EvalError, Evaluator, evaluate_source};
use super::graph::DependencyGraph;
use super::value::{CellError, Grid, Outcome, Value, write_cell};

/// Result of one scheduled batch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecalcReport {
    /// Formulas in the order they were evaluated.
    pub order: Vec<Address>,
    pub failed: Vec<(Address, EvalError)>,
}

/// Topological order for `dirty` plus everything reachable through subsequent
/// edges. Every formula appears after all of its precedence formulas that are
/// part of the batch. Keys not present in the graph are ignored.
pub fn execution_order(graph: &DependencyGraph, dirty: &BTreeSet<Address>) -> Vec<Address> {
    let mut visited = BTreeSet::new();
    let mut post_order = Vec::new();

    for start in dirty {
        visit(graph, start, &mut visited, &mut post_order);
    }

    post_order.reverse();
    post_order
}

fn visit(
    graph: &DependencyGraph,
    current: &Address,
    visited: &mut BTreeSet<Address>,
    post_order: &mut Vec<Address>,
) {
    let Some(formula) = graph.formula_at(current) else {
        return;
    };
    if !visited.insert(*current) {
        return;
    }
    for next in formula.subsequent() {
        visit(graph, next, visited, post_order);
    }
    post_order.push(*current);
}

/// Evaluate every formula in the batch and write results into the grid.
pub fn recalculate(
    graph: &mut DependencyGraph,
    grid: &Grid,
    evaluator: &dyn Evaluator,
    dirty: &BTreeSet<Address>,
) -> RecalcReport {
    let order = execution_order(graph, dirty);
    for address in &order {
        graph.set_dirty(address, true);
    }
    log::debug!("recalculating {} formula(s)", order.len());

    let mut report = RecalcReport::default();
    for address in &order {
        let Some(formula) = graph.formula_at(address) else {
            continue;
        };
        let domain = formula.domain();

        match evaluate_source(formula.source(), grid, evaluator) {
            Ok(outcome) => {
                let (rows, columns) = outcome.shape();
                if (rows, columns) != (domain.rows(), domain.columns()) {
                    log::warn!(
                        "formula at {} returned {}x{} for a {}x{} domain",
                        address,
                        rows,
                        columns,
                        domain.rows(),
                        domain.columns()
                    );
                }
                write_outcome(grid, &domain, &outcome);
            }
            Err(err) => {
                let marker = match err {
                    EvalError::ErrorInput { .. } => CellError::Ref,
                    _ => CellError::Value,
                };
                log::warn!("formula at {} failed: {}", address, err);
                fill(grid, &domain, Value::Error(marker));
                report.failed.push((*address, err));
            }
        }

        graph.set_dirty(address, false);
        report.order.push(*address);
    }
    report
}

/// Write an outcome clipped to `domain`; domain cells the result does not
/// reach are cleared.
pub fn write_outcome(grid: &Grid, domain: &Range, outcome: &Outcome) {
    for cell in domain.cells() {
        let value = outcome.value_at(
            cell.row - domain.top_left.row,
            cell.col - domain.top_left.col,
        );
        write_cell(grid, cell, value);
    }
}

fn fill(grid: &Grid, domain: &Range, value: Value) {
    for cell in domain.cells() {
        write_cell(grid, cell, value.clone());
    }
}
