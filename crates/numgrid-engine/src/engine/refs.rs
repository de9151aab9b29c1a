//! Reference extraction from formula source text.
//!
//! Finds the two reference shapes a formula may contain and the input
//! addresses they expand to. This drives both the dependency graph (which
//! cells a formula reads) and input binding for the evaluator.
//!
//! Handles:
//! - Range references: `[B2:C5]`
//! - Scalar references: `A1`, `AB12`
//! - Ignores references inside string literals

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use thiserror::Error;

use super::address::{Address, Range, column_index};

const MAX_REFERENCE_RANGE_CELLS: usize = 1_000_000;

/// A reference token found in formula source text.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Reference {
    Cell(Address),
    Range(Range),
}

impl Reference {
    /// Every address this reference reads.
    pub fn addresses(&self) -> Vec<Address> {
        match self {
            Reference::Cell(a) => vec![*a],
            Reference::Range(r) => r.cells().collect(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("Range {range} is too large ({cells} cells, max {max})")]
    RangeTooLarge {
        range: String,
        cells: String,
        max: usize,
    },
    #[error("Invalid reference: {0}")]
    Malformed(String),
}

/// A reference token bound to the identifier that replaced it in the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub reference: Reference,
}

/// Source text with reference tokens replaced by binding identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundSource {
    pub source: String,
    pub bindings: Vec<Binding>,
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([A-Z]{1,3})([0-9]+):([A-Z]{1,3})([0-9]+)\]")
            .expect("range reference regex must compile")
    })
}

fn cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z]{1,3})([0-9]+)\b").expect("cell reference regex must compile")
    })
}

fn address_from_parts(letters: &str, digits: &str) -> Option<Address> {
    let col = column_index(letters)?;
    let row = digits.parse::<usize>().ok()?.checked_sub(1)?;
    Some(Address::new(row, col))
}

/// A reference token and its byte span in the source.
struct Token {
    start: usize,
    end: usize,
    reference: Reference,
}

fn scan(script: &str) -> Result<Vec<Token>, ReferenceError> {
    let mut stripped = strip_string_literals(script);
    let mut tokens = Vec::new();

    for caps in range_re().captures_iter(&stripped) {
        let whole = caps.get(0).expect("group 0 always participates");
        let (Some(start), Some(end)) = (
            address_from_parts(&caps[1], &caps[2]),
            address_from_parts(&caps[3], &caps[4]),
        ) else {
            return Err(ReferenceError::Malformed(whole.as_str().to_string()));
        };
        let range = Range::new(start, end);
        match range.cell_count() {
            Some(n) if n <= MAX_REFERENCE_RANGE_CELLS => {}
            count => {
                return Err(ReferenceError::RangeTooLarge {
                    range: range.to_string(),
                    cells: count.map_or_else(|| "overflow".to_string(), |n| n.to_string()),
                    max: MAX_REFERENCE_RANGE_CELLS,
                });
            }
        }
        tokens.push(Token {
            start: whole.start(),
            end: whole.end(),
            reference: Reference::Range(range),
        });
    }

    // Blank out ranges so their corners are not re-read as scalars.
    for token in &tokens {
        stripped.replace_range(token.start..token.end, &" ".repeat(token.end - token.start));
    }

    for caps in cell_re().captures_iter(&stripped) {
        let whole = caps.get(0).expect("group 0 always participates");
        let Some(address) = address_from_parts(&caps[1], &caps[2]) else {
            return Err(ReferenceError::Malformed(whole.as_str().to_string()));
        };
        tokens.push(Token {
            start: whole.start(),
            end: whole.end(),
            reference: Reference::Cell(address),
        });
    }

    tokens.sort_by_key(|t| t.start);
    Ok(tokens)
}

/// Extract every reference token from formula text, in source order.
pub fn extract_references(script: &str) -> Result<Vec<Reference>, ReferenceError> {
    Ok(scan(script)?.into_iter().map(|t| t.reference).collect())
}

/// Expand a reference list into the set of input addresses.
pub fn input_addresses(references: &[Reference]) -> BTreeSet<Address> {
    references.iter().flat_map(Reference::addresses).collect()
}

/// Replace each reference token with an identifier. Repeated references share
/// one binding.
pub fn bind_references(script: &str) -> Result<BoundSource, ReferenceError> {
    let tokens = scan(script)?;
    let mut source = String::with_capacity(script.len());
    let mut bindings: Vec<Binding> = Vec::new();
    let mut cursor = 0;

    for token in tokens {
        source.push_str(&script[cursor..token.start]);
        let name = match bindings.iter().find(|b| b.reference == token.reference) {
            Some(existing) => existing.name.clone(),
            None => {
                let name = match token.reference {
                    Reference::Cell(_) => format!("__cell{}", bindings.len()),
                    Reference::Range(_) => format!("__range{}", bindings.len()),
                };
                bindings.push(Binding {
                    name: name.clone(),
                    reference: token.reference,
                });
                name
            }
        };
        source.push_str(&name);
        cursor = token.end;
    }
    source.push_str(&script[cursor..]);

    Ok(BoundSource { source, bindings })
}

/// Replace string literal contents with spaces, preserving byte offsets.
fn strip_string_literals(script: &str) -> String {
    let mut out = String::with_capacity(script.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in script.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
                out.push('"');
                continue;
            }
            for _ in 0..ch.len_utf8() {
                out.push(' ');
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_scalars_and_ranges() {
        let refs = extract_references("[C6:C8]*2 + A1").unwrap();
        assert_eq!(
            refs,
            vec![
                Reference::Range(Range::parse("C6:C8").unwrap()),
                Reference::Cell(Address::new(0, 0)),
            ]
        );
        let inputs = input_addresses(&refs);
        assert_eq!(inputs.len(), 4);
        assert!(inputs.contains(&Address::new(6, 2)));
    }

    #[test]
    fn test_ignores_references_in_strings() {
        let refs = extract_references(r#"A1 + len("B2 \" C3")"#).unwrap();
        assert_eq!(refs, vec![Reference::Cell(Address::new(0, 0))]);
    }

    #[test]
    fn test_lowercase_is_not_a_reference() {
        assert!(extract_references("x1 + y2").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_oversized_ranges() {
        let err = extract_references("[A1:A1000001]").unwrap_err();
        assert!(matches!(err, ReferenceError::RangeTooLarge { .. }));
    }

    #[test]
    fn test_bind_references_rewrites_tokens() {
        let bound = bind_references("A1 + A2 * A1 + SUM([B1:B3])").unwrap();
        assert_eq!(bound.source, "__cell0 + __cell1 * __cell0 + SUM(__range2)");
        assert_eq!(bound.bindings.len(), 3);
        assert_eq!(
            bound.bindings[2].reference,
            Reference::Range(Range::parse("B1:B3").unwrap())
        );
    }

    #[test]
    fn test_bind_preserves_multibyte_strings() {
        let bound = bind_references(r#""é A1" + B1"#).unwrap();
        assert_eq!(bound.source, r#""é A1" + __cell0"#);
    }
}
