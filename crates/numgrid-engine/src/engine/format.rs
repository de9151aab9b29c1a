use num_complex::Complex64;

use super::{CellError, Value};

/// Display options owned by the presentation layer.
#[derive(Clone, Debug, PartialEq)]
pub struct FormatOptions {
    pub thousands_separator: bool,
    pub decimal_places: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            thousands_separator: true,
            decimal_places: 8,
        }
    }
}

/// Format a cell value for display.
pub fn format_value(value: &Value, options: &FormatOptions) -> String {
    match value {
        Value::Empty => String::new(),
        Value::Text(s) => s.clone(),
        Value::Number(n) => format_complex(*n, options),
        Value::Error(e) => format_error(*e),
    }
}

pub fn format_error(error: CellError) -> String {
    error.to_string()
}

/// Format a complex number; purely real numbers print like reals.
pub fn format_complex(n: Complex64, options: &FormatOptions) -> String {
    if n.im == 0.0 {
        return format_number(n.re, options);
    }
    let sign = if n.im.is_sign_negative() { '-' } else { '+' };
    format!("{}{}{}j", trim_float(n.re), sign, trim_float(n.im.abs()))
}

/// Format a real number.
pub fn format_number(n: f64, options: &FormatOptions) -> String {
    if n.is_nan() {
        "#NAN!".to_string()
    } else if n.is_infinite() {
        "#INF!".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        let digits = format!("{:.0}", n.abs());
        let digits = if options.thousands_separator {
            group_thousands(&digits)
        } else {
            digits
        };
        if n < 0.0 { format!("-{}", digits) } else { digits }
    } else {
        let text = format!("{:.*}", options.decimal_places, n.abs());
        let text = match text.split_once('.') {
            Some((int, frac)) if options.thousands_separator => {
                format!("{}.{}", group_thousands(int), frac)
            }
            _ => text,
        };
        if n < 0.0 { format!("-{}", text) } else { text }
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn trim_float(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_integers_with_separator() {
        let options = FormatOptions::default();
        assert_eq!(format_number(1234567.0, &options), "1,234,567");
        assert_eq!(format_number(-1000.0, &options), "-1,000");
        assert_eq!(format_number(999.0, &options), "999");
    }

    #[test]
    fn test_format_without_separator() {
        let options = FormatOptions {
            thousands_separator: false,
            decimal_places: 2,
        };
        assert_eq!(format_number(1234567.0, &options), "1234567");
        assert_eq!(format_number(3.14159, &options), "3.14");
    }

    #[test]
    fn test_format_fraction_uses_decimal_places() {
        let options = FormatOptions::default();
        assert_eq!(format_number(31.0 / 9.0, &options), "3.44444444");
    }

    #[test]
    fn test_format_complex() {
        let options = FormatOptions::default();
        assert_eq!(format_complex(Complex64::new(1.0, 2.0), &options), "1+2j");
        assert_eq!(format_complex(Complex64::new(0.5, -1.0), &options), "0.5-1j");
        assert_eq!(format_value(&Value::real(5.0), &options), "5");
        assert_eq!(format_value(&Value::Error(CellError::Value), &options), "#VALUE!");
    }
}
