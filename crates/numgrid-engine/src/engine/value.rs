//! Cell values.
//!
//! - [`Value`] - What a cell holds: nothing, text, a complex number or an error marker
//! - [`CellError`] - Error markers written instead of stale results
//! - [`Outcome`] - The shape of an evaluator result (scalar or matrix)
//! - [`Grid`] - Sparse storage for cell values (backed by `DashMap`)

use dashmap::DashMap;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::address::Address;

/// Error markers propagated through dependent formulas.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum CellError {
    /// The evaluator could not produce a value.
    Value,
    /// An input of the formula holds an error marker.
    Ref,
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
        })
    }
}

/// The content of a single cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Empty,
    Text(String),
    Number(Complex64),
    Error(CellError),
}

impl Value {
    pub fn real(n: f64) -> Value {
        Value::Number(Complex64::new(n, 0.0))
    }

    /// Parse user input.
    /// - Empty string or whitespace -> Empty
    /// - Real or complex literal (`2`, `-1.5e3`, `4j`, `1+2j`, `(1-2j)`) -> Number
    /// - Otherwise -> Text (trimmed)
    pub fn from_input(input: &str) -> Value {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Value::Empty;
        }
        match parse_complex(trimmed) {
            Some(n) => Value::Number(n),
            None => Value::Text(trimmed.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Numeric view used when binding evaluator inputs. Empty cells read as zero.
    pub fn as_number(&self) -> Option<Complex64> {
        match self {
            Value::Empty => Some(Complex64::new(0.0, 0.0)),
            Value::Number(n) => Some(*n),
            Value::Text(_) | Value::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<CellError> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }
}

/// Parse a real or complex literal using a trailing `j`/`J` as imaginary unit.
pub fn parse_complex(text: &str) -> Option<Complex64> {
    let text = text.trim();
    let text = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text)
        .trim();
    if text.is_empty() {
        return None;
    }

    let Some(body) = text.strip_suffix(['j', 'J']) else {
        return parse_real(text).map(|re| Complex64::new(re, 0.0));
    };

    // Find the sign separating real and imaginary parts, skipping exponent signs.
    let bytes = body.as_bytes();
    let split = (1..bytes.len())
        .rev()
        .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'));

    let (re, im) = match split {
        Some(i) => (parse_real(&body[..i])?, parse_imaginary(&body[i..])?),
        None => (0.0, parse_imaginary(body)?),
    };
    Some(Complex64::new(re, im))
}

fn parse_imaginary(text: &str) -> Option<f64> {
    match text {
        "" | "+" => Some(1.0),
        "-" => Some(-1.0),
        _ => parse_real(text),
    }
}

fn parse_real(text: &str) -> Option<f64> {
    // `1 + 2j` is text, not a number.
    if text.chars().any(char::is_whitespace) {
        return None;
    }
    text.parse::<f64>().ok()
}

/// A successful evaluation result.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Scalar(Value),
    /// Row-major matrix; every row has the same length.
    Matrix(Vec<Vec<Value>>),
}

impl Outcome {
    /// `(rows, columns)` of the region the result occupies.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Outcome::Scalar(_) => (1, 1),
            Outcome::Matrix(rows) => (
                rows.len().max(1),
                rows.iter().map(Vec::len).max().unwrap_or(0).max(1),
            ),
        }
    }

    /// Value for the cell at `(row, col)` relative to the top-left of the result.
    pub fn value_at(&self, row: usize, col: usize) -> Value {
        match self {
            Outcome::Scalar(v) if row == 0 && col == 0 => v.clone(),
            Outcome::Scalar(_) => Value::Empty,
            Outcome::Matrix(rows) => rows
                .get(row)
                .and_then(|r| r.get(col))
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// Sparse cell storage. Empty cells have no entry.
pub type Grid = DashMap<Address, Value>;

pub fn read_cell(grid: &Grid, address: &Address) -> Value {
    grid.get(address).map(|v| v.clone()).unwrap_or_default()
}

/// Write a value, dropping the entry for `Value::Empty`.
pub fn write_cell(grid: &Grid, address: Address, value: Value) {
    if value.is_empty() {
        grid.remove(&address);
    } else {
        grid.insert(address, value);
    }
}
