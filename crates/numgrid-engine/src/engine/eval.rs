//! Evaluator contract and the default Rhai evaluator.
//!
//! The engine never parses arithmetic itself. It rewrites reference tokens
//! into binding names, resolves the bound values from the grid and hands
//! `(source, inputs)` to an [`Evaluator`]. [`RhaiEvaluator`] is the default
//! implementation, with complex numbers and element-wise array arithmetic
//! registered as builtins.

use rhai::{Array, Dynamic, Engine, Scope};
use thiserror::Error;

use super::address::Address;
use super::refs::{Reference, ReferenceError, bind_references};
use super::value::{Grid, Outcome, Value, read_cell};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{0}")]
    Reference(#[from] ReferenceError),

    /// An input cell holds an error marker; the formula is not evaluated.
    #[error("Input {address} holds an error")]
    ErrorInput { address: Address },

    #[error("Evaluation failed: {0}")]
    Failed(String),
}

/// The value bound to a reference token.
#[derive(Clone, Debug, PartialEq)]
pub enum InputValue {
    Scalar(Value),
    /// Row-major values of a range reference.
    Range(Vec<Vec<Value>>),
}

/// Binding name -> resolved value, in order of first appearance in the source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedInputs {
    pub bindings: Vec<(String, InputValue)>,
}

/// Turns formula source text plus resolved inputs into a result.
pub trait Evaluator {
    fn evaluate(&self, source: &str, inputs: &ResolvedInputs) -> Result<Outcome, EvalError>;
}

/// Bind references in `script`, resolve them against `grid` and evaluate.
pub fn evaluate_source(
    script: &str,
    grid: &Grid,
    evaluator: &dyn Evaluator,
) -> Result<Outcome, EvalError> {
    let bound = bind_references(script)?;
    let mut inputs = ResolvedInputs::default();

    for binding in bound.bindings {
        let value = match binding.reference {
            Reference::Cell(address) => InputValue::Scalar(read_input(grid, &address)?),
            Reference::Range(range) => {
                let mut rows = Vec::with_capacity(range.rows());
                for row in range.top_left.row..=range.bottom_right.row {
                    let mut values = Vec::with_capacity(range.columns());
                    for col in range.top_left.col..=range.bottom_right.col {
                        values.push(read_input(grid, &Address::new(row, col))?);
                    }
                    rows.push(values);
                }
                InputValue::Range(rows)
            }
        };
        inputs.bindings.push((binding.name, value));
    }

    evaluator.evaluate(&bound.source, &inputs)
}

fn read_input(grid: &Grid, address: &Address) -> Result<Value, EvalError> {
    let value = read_cell(grid, address);
    if value.as_error().is_some() {
        return Err(EvalError::ErrorInput { address: *address });
    }
    Ok(value)
}

/// Create a Rhai engine with builtins registered.
pub fn create_engine() -> Engine {
    let mut engine = Engine::new();
    crate::builtins::register_builtins(&mut engine);
    engine
}

/// Default evaluator backed by Rhai.
pub struct RhaiEvaluator {
    engine: Engine,
}

impl RhaiEvaluator {
    pub fn new() -> Self {
        RhaiEvaluator {
            engine: create_engine(),
        }
    }
}

impl Default for RhaiEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for RhaiEvaluator {
    fn evaluate(&self, source: &str, inputs: &ResolvedInputs) -> Result<Outcome, EvalError> {
        let mut scope = Scope::new();
        for (name, value) in &inputs.bindings {
            let dynamic = match value {
                InputValue::Scalar(v) => value_to_dynamic(v),
                InputValue::Range(rows) => Dynamic::from_array(
                    rows.iter()
                        .map(|row| Dynamic::from_array(row.iter().map(value_to_dynamic).collect()))
                        .collect(),
                ),
            };
            scope.push_dynamic(name.as_str(), dynamic);
        }

        let result = self
            .engine
            .eval_with_scope::<Dynamic>(&mut scope, source)
            .map_err(|e| EvalError::Failed(e.to_string()))?;
        outcome_from_dynamic(result)
    }
}

fn value_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Empty => Dynamic::from_float(0.0),
        Value::Number(n) => crate::builtins::complex_to_dynamic(*n),
        Value::Text(s) => Dynamic::from(s.clone()),
        Value::Error(e) => Dynamic::from(e.to_string()),
    }
}

fn scalar_from_dynamic(value: Dynamic) -> Result<Value, EvalError> {
    if value.is_unit() {
        return Err(EvalError::Failed("formula produced no value".into()));
    }
    if let Some(n) = crate::builtins::dynamic_to_complex(&value) {
        return Ok(Value::Number(n));
    }
    if let Ok(b) = value.as_bool() {
        return Ok(Value::Text(if b { "TRUE" } else { "FALSE" }.to_string()));
    }
    if value.is_string() {
        return Ok(Value::Text(value.to_string()));
    }
    Err(EvalError::Failed(format!(
        "unsupported result type: {}",
        value.type_name()
    )))
}

/// Convert a Rhai result. A flat array is a column vector; an array of arrays
/// is a row-major matrix.
fn outcome_from_dynamic(value: Dynamic) -> Result<Outcome, EvalError> {
    if !value.is_array() {
        return scalar_from_dynamic(value).map(Outcome::Scalar);
    }
    let items: Array = value
        .into_array()
        .map_err(|t| EvalError::Failed(format!("expected array, got {}", t)))?;
    if items.is_empty() {
        return Err(EvalError::Failed("formula produced an empty array".into()));
    }

    if items.iter().all(Dynamic::is_array) {
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let row: Array = item
                .into_array()
                .map_err(|t| EvalError::Failed(format!("expected array, got {}", t)))?;
            rows.push(
                row.into_iter()
                    .map(scalar_from_dynamic)
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }
        let width = rows[0].len();
        if width == 0 || rows.iter().any(|r| r.len() != width) {
            return Err(EvalError::Failed("result rows have different lengths".into()));
        }
        return Ok(Outcome::Matrix(rows));
    }

    let column = items
        .into_iter()
        .map(|item| scalar_from_dynamic(item).map(|v| vec![v]))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Outcome::Matrix(column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::write_cell;
    use num_complex::Complex64;

    fn real_part(outcome: &Outcome) -> Option<f64> {
        match outcome {
            Outcome::Scalar(Value::Number(n)) => Some(n.re),
            _ => None,
        }
    }

    fn grid_with(cells: &[(&str, Value)]) -> Grid {
        let grid = Grid::new();
        for (name, value) in cells {
            write_cell(&grid, Address::parse(name).unwrap(), value.clone());
        }
        grid
    }

    #[test]
    fn test_scalar_arithmetic() {
        let grid = grid_with(&[("A1", Value::real(2.0)), ("A2", Value::real(3.0))]);
        let outcome = evaluate_source("A1+A2", &grid, &RhaiEvaluator::new()).unwrap();
        assert_eq!(outcome, Outcome::Scalar(Value::real(5.0)));
    }

    #[test]
    fn test_integer_literals_mix_with_inputs() {
        let grid = grid_with(&[("A1", Value::real(2.5))]);
        let outcome = evaluate_source("A1 * 2 + 1", &grid, &RhaiEvaluator::new()).unwrap();
        assert_eq!(real_part(&outcome), Some(6.0));
    }

    #[test]
    fn test_empty_cells_read_as_zero() {
        let grid = Grid::new();
        let outcome = evaluate_source("A1 + 1", &grid, &RhaiEvaluator::new()).unwrap();
        assert_eq!(real_part(&outcome), Some(1.0));
    }

    #[test]
    fn test_range_times_scalar_is_column() {
        let grid = grid_with(&[
            ("C6", Value::real(1.0)),
            ("C7", Value::real(2.0)),
            ("C8", Value::real(3.0)),
        ]);
        let outcome = evaluate_source("[C6:C8]*2", &grid, &RhaiEvaluator::new()).unwrap();
        assert_eq!(
            outcome,
            Outcome::Matrix(vec![
                vec![Value::real(2.0)],
                vec![Value::real(4.0)],
                vec![Value::real(6.0)],
            ])
        );
    }

    #[test]
    fn test_complex_inputs() {
        let grid = grid_with(&[("A1", Value::from_input("1+2j"))]);
        let outcome = evaluate_source("A1 * A1", &grid, &RhaiEvaluator::new()).unwrap();
        assert_eq!(outcome, Outcome::Scalar(Value::Number(Complex64::new(-3.0, 4.0))));
    }

    #[test]
    fn test_error_input_short_circuits() {
        let grid = grid_with(&[("A1", Value::Error(crate::engine::CellError::Value))]);
        let err = evaluate_source("A1 + 1", &grid, &RhaiEvaluator::new()).unwrap_err();
        assert_eq!(err, EvalError::ErrorInput { address: Address::new(0, 0) });
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let grid = Grid::new();
        let err = evaluate_source("1 +* 2", &grid, &RhaiEvaluator::new()).unwrap_err();
        assert!(matches!(err, EvalError::Failed(_)));
    }

    #[test]
    fn test_unit_result_is_error() {
        let grid = Grid::new();
        assert!(evaluate_source("let x = 1;", &grid, &RhaiEvaluator::new()).is_err());
    }
}
