//! Spreadsheet calculation engine API.
//!
//! This module provides the reactive core of the spreadsheet:
//!
//! - [`Address`], [`Range`] - Coordinates, range expansion and column labels
//! - [`Value`], [`Grid`] - Cell values and sparse cell storage
//! - [`extract_references`], [`bind_references`] - Find `A1` / `[A1:B2]` tokens in formula text
//! - [`Formula`] - Source text bound to an output domain and input set
//! - [`DependencyGraph`] - Formula arena with precedence/subsequent adjacency
//! - [`check_candidate`], [`detect_cycle`] - Circular reference detection
//! - [`execution_order`], [`recalculate`] - Topological recalculation
//! - [`Evaluator`], [`RhaiEvaluator`] - Expression evaluation contract
//! - [`format_value`] - Format values for display

mod address;
mod cycle;
mod eval;
mod format;
mod formula;
mod graph;
mod refs;
mod scheduler;
mod value;

pub use address::{Address, Range, column_index, column_label, expand_range};
pub use cycle::{GraphError, Links, check_candidate, detect_cycle};
pub use eval::{
    EvalError, Evaluator, InputValue, ResolvedInputs, RhaiEvaluator, create_engine,
    evaluate_source,
};
pub use format::{FormatOptions, format_complex, format_number, format_value};
pub use formula::Formula;
pub use graph::{DependencyGraph, PersistedFormula};
pub use refs::{
    Binding, BoundSource, Reference, ReferenceError, bind_references, extract_references,
    input_addresses,
};
pub use scheduler::{RecalcReport, execution_order, recalculate, write_outcome};
pub use value::{CellError, Grid, Outcome, Value, parse_complex, read_cell, write_cell};

pub use num_complex::Complex64;
