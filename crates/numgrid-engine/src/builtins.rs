//! Built-in formula functions and operators (Rust) for the Rhai evaluator.
//!
//! Conventions:
//! - Reductions over ranges are ALL CAPS (`SUM`, `MEAN`, `T`).
//! - Complex helpers are lowercase (`complex`, `re`, `im`, `conj`).
//! - Real results are returned as FLOAT so plain Rhai arithmetic keeps working;
//!   only values with a non-zero imaginary part travel as `Complex`.
//! - `+ - * /` are element-wise whenever an array is involved. Arrays must have
//!   the same length at every nesting level.

use num_complex::Complex64;
use rhai::{Array, Dynamic, Engine, EvalAltResult, Position};

type RhaiResult = Result<Dynamic, Box<EvalAltResult>>;

#[derive(Clone, Copy, Debug)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    fn apply(self, a: Complex64, b: Complex64) -> Result<Complex64, Box<EvalAltResult>> {
        Ok(match self {
            Op::Add => a + b,
            Op::Sub => a - b,
            Op::Mul => a * b,
            Op::Div => {
                if b.re == 0.0 && b.im == 0.0 {
                    return Err(runtime_error("division by zero"));
                }
                a / b
            }
        })
    }
}

fn runtime_error(message: &str) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(message.into(), Position::NONE).into()
}

/// Real values become FLOAT, anything with an imaginary part stays `Complex`.
pub(crate) fn complex_to_dynamic(n: Complex64) -> Dynamic {
    if n.im == 0.0 {
        Dynamic::from_float(n.re)
    } else {
        Dynamic::from(n)
    }
}

pub(crate) fn dynamic_to_complex(value: &Dynamic) -> Option<Complex64> {
    if let Ok(f) = value.as_float() {
        return Some(Complex64::new(f, 0.0));
    }
    if let Ok(i) = value.as_int() {
        return Some(Complex64::new(i as f64, 0.0));
    }
    value.clone().try_cast::<Complex64>()
}

fn expect_number(value: &Dynamic) -> Result<Complex64, Box<EvalAltResult>> {
    dynamic_to_complex(value)
        .ok_or_else(|| runtime_error(&format!("expected a number, got {}", value.type_name())))
}

fn into_array(value: Dynamic) -> Result<Array, Box<EvalAltResult>> {
    value
        .into_array()
        .map_err(|t| runtime_error(&format!("expected an array, got {}", t)))
}

fn binary(op: Op, a: Dynamic, b: Dynamic) -> RhaiResult {
    match (a.is_array(), b.is_array()) {
        (true, true) => {
            let a = into_array(a)?;
            let b = into_array(b)?;
            if a.len() != b.len() {
                return Err(runtime_error(&format!(
                    "shape mismatch: {} vs {} elements",
                    a.len(),
                    b.len()
                )));
            }
            let out = a
                .into_iter()
                .zip(b)
                .map(|(x, y)| binary(op, x, y))
                .collect::<Result<Array, _>>()?;
            Ok(Dynamic::from_array(out))
        }
        (true, false) => {
            let out = into_array(a)?
                .into_iter()
                .map(|x| binary(op, x, b.clone()))
                .collect::<Result<Array, _>>()?;
            Ok(Dynamic::from_array(out))
        }
        (false, true) => {
            let out = into_array(b)?
                .into_iter()
                .map(|y| binary(op, a.clone(), y))
                .collect::<Result<Array, _>>()?;
            Ok(Dynamic::from_array(out))
        }
        (false, false) => {
            let x = expect_number(&a)?;
            let y = expect_number(&b)?;
            Ok(complex_to_dynamic(op.apply(x, y)?))
        }
    }
}

fn negate(value: Dynamic) -> RhaiResult {
    binary(Op::Mul, value, Dynamic::from_float(-1.0))
}

fn sum(value: Dynamic) -> Result<Complex64, Box<EvalAltResult>> {
    if value.is_array() {
        into_array(value)?
            .into_iter()
            .try_fold(Complex64::new(0.0, 0.0), |acc, x| Ok(acc + sum(x)?))
    } else {
        expect_number(&value)
    }
}

fn count(value: &Dynamic) -> usize {
    match value.read_lock::<Array>() {
        Some(items) => items.iter().map(count).sum(),
        None => 1,
    }
}

/// Transpose a matrix (array of row arrays). A flat array becomes one row.
fn transpose(value: Array) -> RhaiResult {
    if !value.iter().all(Dynamic::is_array) {
        return Ok(Dynamic::from_array(vec![Dynamic::from_array(value)]));
    }
    let rows = value
        .into_iter()
        .map(into_array)
        .collect::<Result<Vec<Array>, _>>()?;
    let width = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != width) {
        return Err(runtime_error("cannot transpose rows of different lengths"));
    }
    let out = (0..width)
        .map(|col| Dynamic::from_array(rows.iter().map(|r| r[col].clone()).collect()))
        .collect();
    Ok(Dynamic::from_array(out))
}

macro_rules! register_operator {
    ($engine:expr, $name:literal, $op:expr; $($a:ty, $b:ty);+ $(;)?) => {
        $(
            $engine.register_fn($name, |a: $a, b: $b| -> RhaiResult {
                binary($op, Dynamic::from(a), Dynamic::from(b))
            });
        )+
    };
}

macro_rules! register_arithmetic {
    ($engine:expr, $name:literal, $op:expr) => {
        register_operator!($engine, $name, $op;
            Array, Array;
            Array, f64;
            Array, i64;
            Array, Complex64;
            f64, Array;
            i64, Array;
            Complex64, Array;
            Complex64, Complex64;
            Complex64, f64;
            Complex64, i64;
            f64, Complex64;
            i64, Complex64;
        );
    };
}

/// Register complex arithmetic, element-wise array operators and reductions.
pub fn register_builtins(engine: &mut Engine) {
    engine.register_type_with_name::<Complex64>("Complex");
    engine.register_fn("to_string", |c: &mut Complex64| {
        let sign = if c.im.is_sign_negative() { '-' } else { '+' };
        format!("{}{}{}j", c.re, sign, c.im.abs())
    });

    register_arithmetic!(engine, "+", Op::Add);
    register_arithmetic!(engine, "-", Op::Sub);
    register_arithmetic!(engine, "*", Op::Mul);
    register_arithmetic!(engine, "/", Op::Div);

    engine.register_fn("-", |a: Array| negate(Dynamic::from_array(a)));
    engine.register_fn("-", |a: Complex64| complex_to_dynamic(-a));

    engine.register_fn("complex", |re: f64, im: f64| complex_to_dynamic(Complex64::new(re, im)));
    engine.register_fn("complex", |re: i64, im: i64| {
        complex_to_dynamic(Complex64::new(re as f64, im as f64))
    });
    engine.register_fn("complex", |re: f64, im: i64| {
        complex_to_dynamic(Complex64::new(re, im as f64))
    });
    engine.register_fn("complex", |re: i64, im: f64| {
        complex_to_dynamic(Complex64::new(re as f64, im))
    });

    engine.register_fn("re", |c: Complex64| c.re);
    engine.register_fn("re", |x: f64| x);
    engine.register_fn("re", |x: i64| x as f64);
    engine.register_fn("im", |c: Complex64| c.im);
    engine.register_fn("im", |_: f64| 0.0_f64);
    engine.register_fn("im", |_: i64| 0.0_f64);
    engine.register_fn("conj", |c: Complex64| complex_to_dynamic(c.conj()));
    engine.register_fn("conj", |x: f64| x);
    engine.register_fn("abs", |c: Complex64| c.norm());
    engine.register_fn("arg", |c: Complex64| c.arg());
    engine.register_fn("sqrt", |c: Complex64| complex_to_dynamic(c.sqrt()));
    engine.register_fn("csqrt", |x: f64| complex_to_dynamic(Complex64::new(x, 0.0).sqrt()));
    engine.register_fn("csqrt", |x: i64| {
        complex_to_dynamic(Complex64::new(x as f64, 0.0).sqrt())
    });

    engine.register_fn("SUM", |a: Array| -> RhaiResult {
        Ok(complex_to_dynamic(sum(Dynamic::from_array(a))?))
    });
    engine.register_fn("MEAN", |a: Array| -> RhaiResult {
        let a = Dynamic::from_array(a);
        let n = count(&a);
        if n == 0 {
            return Err(runtime_error("MEAN of an empty array"));
        }
        Ok(complex_to_dynamic(sum(a)? / n as f64))
    });
    engine.register_fn("T", transpose);
}
